use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::detect::{DetectedRecord, RawV1, RawV2};
use super::errors::RecordError;
use super::fields::{LegacyField, MetricField, PipelineType, SchemaVersion};
use super::record::MetricsRecord;
use super::registry::SourceRegistry;

/// `{stage}_success_rate` or `{stage}_rate`.
const FIELD_NAME_PATTERN: &str = r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)*_(?:success_)?rate$";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub record: MetricsRecord,
    pub volume: u64,
    pub legacy_inputs: Vec<LegacyField>,
}

pub struct FieldMapper<'a> {
    registry: &'a SourceRegistry,
    field_pattern: Regex,
}

impl<'a> FieldMapper<'a> {
    pub fn new(registry: &'a SourceRegistry) -> Result<Self> {
        let field_pattern =
            Regex::new(FIELD_NAME_PATTERN).context("failed to compile metric field name regex")?;
        Ok(Self {
            registry,
            field_pattern,
        })
    }

    pub fn map(&self, detected: DetectedRecord) -> Result<FieldMapping, RecordError> {
        debug!(
            source_id = detected.source_id(),
            schema_version = %detected.schema_version(),
            volume = detected.volume(),
            "mapping metrics record"
        );
        match detected {
            DetectedRecord::V1(raw) => self.map_v1(raw),
            DetectedRecord::V2(raw) => self.map_v2(raw),
        }
    }

    fn map_v1(&self, raw: RawV1) -> Result<FieldMapping, RecordError> {
        let pipeline_type = self.registry.lookup(&raw.source_id).ok_or_else(|| {
            RecordError::UnknownSource {
                source_id: raw.source_id.clone(),
            }
        })?;

        let mut metrics = BTreeMap::new();
        metrics.insert(
            MetricField::LegacyFetchSuccessRate,
            check_rate(&raw.source_id, LegacyField::SuccessRate.name(), raw.success_rate)?,
        );
        if let Some(quality_pass_rate) = raw.quality_pass_rate {
            metrics.insert(
                MetricField::QualityPassRate,
                check_rate(
                    &raw.source_id,
                    MetricField::QualityPassRate.as_str(),
                    quality_pass_rate,
                )?,
            );
        }

        Ok(FieldMapping {
            record: MetricsRecord {
                source_id: raw.source_id,
                pipeline_type,
                schema_version: SchemaVersion::V1,
                metrics,
                descriptions: BTreeMap::new(),
            },
            volume: raw.volume,
            legacy_inputs: vec![LegacyField::SuccessRate],
        })
    }

    fn map_v2(&self, raw: RawV2) -> Result<FieldMapping, RecordError> {
        let pipeline_type = self.resolve_v2_pipeline_type(&raw)?;

        let mut metrics = BTreeMap::new();
        let mut legacy_fetch = None;
        let mut legacy_inputs = Vec::new();

        for (key, value) in &raw.pipeline_metrics {
            let rate = value.as_f64().ok_or_else(|| {
                RecordError::malformed(format!("metric '{key}' must be a number"))
            })?;

            if key == LegacyField::FetchSuccessRate.name() {
                legacy_fetch = Some(check_rate(&raw.source_id, key, rate)?);
                legacy_inputs.push(LegacyField::FetchSuccessRate);
                continue;
            }

            if !self.field_pattern.is_match(key) {
                return Err(RecordError::malformed(format!(
                    "metric name '{key}' does not follow the {{stage}}_rate convention"
                )));
            }

            let field = MetricField::from_name(key)
                .filter(|field| pipeline_type.allows(*field))
                .ok_or_else(|| RecordError::FieldNotAllowed {
                    source_id: raw.source_id.clone(),
                    field: key.clone(),
                    pipeline_type,
                })?;

            metrics.insert(field, check_rate(&raw.source_id, key, rate)?);
        }

        let alias = metrics
            .get(&pipeline_type.primary_field())
            .copied()
            .or(legacy_fetch)
            .or_else(|| metrics.get(&MetricField::LegacyFetchSuccessRate).copied());
        if let Some(alias) = alias {
            metrics.insert(MetricField::LegacyFetchSuccessRate, alias);
        }

        let descriptions = map_descriptions(&raw.source_id, pipeline_type, &raw.semantics);

        Ok(FieldMapping {
            record: MetricsRecord {
                source_id: raw.source_id,
                pipeline_type,
                schema_version: SchemaVersion::V2,
                metrics,
                descriptions,
            },
            volume: raw.volume,
            legacy_inputs,
        })
    }

    fn resolve_v2_pipeline_type(&self, raw: &RawV2) -> Result<PipelineType, RecordError> {
        let registered = self.registry.lookup(&raw.source_id);

        let Some(declared) = raw.pipeline_type.as_deref() else {
            return registered.ok_or_else(|| RecordError::UnknownSource {
                source_id: raw.source_id.clone(),
            });
        };

        let declared = declared
            .parse::<PipelineType>()
            .map_err(|err| RecordError::malformed(err.to_string()))?;

        if let Some(registered) = registered.filter(|registered| *registered != declared) {
            warn!(
                source_id = %raw.source_id,
                declared = %declared,
                registered = %registered,
                "record pipeline_type disagrees with source registry; using the record's"
            );
        }

        Ok(declared)
    }
}

fn check_rate(source_id: &str, field: &str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(RecordError::RateOutOfRange {
            source_id: source_id.to_string(),
            field: field.to_string(),
            value,
        })
    }
}

fn map_descriptions(
    source_id: &str,
    pipeline_type: PipelineType,
    semantics: &serde_json::Map<String, Value>,
) -> BTreeMap<MetricField, String> {
    let mut descriptions = BTreeMap::new();

    for (key, value) in semantics {
        let field = if key == LegacyField::FetchSuccessRate.name() {
            Some(MetricField::LegacyFetchSuccessRate)
        } else {
            MetricField::from_name(key)
        };

        let field = match field.filter(|field| pipeline_type.allows(*field)) {
            Some(field) => field,
            None => {
                debug!(source_id = %source_id, key = %key, "ignoring description for unknown field");
                continue;
            }
        };

        match value.as_str().map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => {
                descriptions.insert(field, text.to_string());
            }
            None => debug!(source_id = %source_id, key = %key, "ignoring non-text description"),
        }
    }

    descriptions
}
