use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::deprecation::{DeprecationNotice, DeprecationTracker};
use super::detect::detect_schema;
use super::errors::{RecordError, RecordErrorKind};
use super::mapper::{FieldMapper, FieldMapping};
use super::semantics::{AnnotatedRecord, SemanticsTable, annotate};

/// One undecoded record and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub origin: String,
    pub index: usize,
    pub value: Value,
    /// Used when the record carries no `source_id` of its own.
    pub fallback_source_id: Option<String>,
}

impl RawInput {
    /// Source id to report for this record, whether or not it was accepted.
    pub fn reported_source_id(&self) -> Option<String> {
        match self.value.get("source_id") {
            None | Some(Value::Null) => self.fallback_source_id.clone(),
            Some(_) => declared_source_id(&self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSource {
    pub origin: String,
    pub volume: u64,
    pub annotated: AnnotatedRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub origin: String,
    pub index: usize,
    pub source_id: Option<String>,
    pub kind: RecordErrorKind,
    pub message: String,
}

impl RejectedRecord {
    pub fn new(origin: &str, index: usize, source_id: Option<String>, error: &RecordError) -> Self {
        Self {
            origin: origin.to_string(),
            index,
            source_id,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub sources: Vec<NormalizedSource>,
    pub rejected: Vec<RejectedRecord>,
    pub deprecations: Vec<DeprecationNotice>,
}

/// Detects and maps one raw record without annotating it.
pub fn classify(input: &RawInput, mapper: &FieldMapper<'_>) -> Result<FieldMapping, RecordError> {
    let detected = detect_schema(&input.value, input.fallback_source_id.as_deref())?;
    mapper.map(detected)
}

fn declared_source_id(value: &Value) -> Option<String> {
    value
        .get("source_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|source_id| !source_id.is_empty())
        .map(ToOwned::to_owned)
}

/// A failing record is reported in `rejected` and never stops the batch.
pub fn normalize_batch(
    inputs: Vec<RawInput>,
    mapper: &FieldMapper<'_>,
    table: &SemanticsTable,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut tracker = DeprecationTracker::default();
    let mut seen = HashSet::new();

    for input in inputs {
        let mapping = classify(&input, mapper).and_then(|mapping| {
            if seen.insert(mapping.record.source_id.to_ascii_lowercase()) {
                Ok(mapping)
            } else {
                Err(RecordError::DuplicateSource {
                    source_id: mapping.record.source_id,
                })
            }
        });

        match mapping {
            Ok(mapping) => {
                for legacy in &mapping.legacy_inputs {
                    tracker.record(*legacy, &mapping.record.source_id);
                }
                debug!(
                    origin = %input.origin,
                    source_id = %mapping.record.source_id,
                    schema_version = %mapping.record.schema_version,
                    pipeline_type = %mapping.record.pipeline_type,
                    "normalized metrics record"
                );
                outcome.sources.push(NormalizedSource {
                    origin: input.origin,
                    volume: mapping.volume,
                    annotated: annotate(mapping.record, table),
                });
            }
            Err(err) => {
                let source_id = input.reported_source_id();
                warn!(
                    origin = %input.origin,
                    index = input.index,
                    source_id = %source_id.as_deref().unwrap_or_default(),
                    error = %err,
                    "rejected metrics record"
                );
                outcome
                    .rejected
                    .push(RejectedRecord::new(&input.origin, input.index, source_id, &err));
            }
        }
    }

    outcome.deprecations = tracker.into_notices();
    outcome
}
