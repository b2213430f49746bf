use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::fields::{MetricField, PipelineType};
use super::record::MetricsRecord;

const BUILTIN_DESCRIPTIONS: &[(PipelineType, MetricField, &str)] = &[
    (
        PipelineType::WebScraping,
        MetricField::QualityPassRate,
        "Fraction of scraped records that survived post-collection quality filtering.",
    ),
    (
        PipelineType::WebScraping,
        MetricField::HttpRequestSuccessRate,
        "Fraction of HTTP requests that returned a successful response.",
    ),
    (
        PipelineType::WebScraping,
        MetricField::ContentExtractionRate,
        "Fraction of fetched pages from which article content was extracted.",
    ),
    (
        PipelineType::WebScraping,
        MetricField::DuplicateRate,
        "Fraction of extracted items discarded as duplicates of earlier items.",
    ),
    (
        PipelineType::WebScraping,
        MetricField::LegacyFetchSuccessRate,
        "Deprecated alias of http_request_success_rate kept for older dashboards.",
    ),
    (
        PipelineType::FileProcessing,
        MetricField::QualityPassRate,
        "Fraction of extracted records that survived post-collection quality filtering.",
    ),
    (
        PipelineType::FileProcessing,
        MetricField::FileDiscoveryRate,
        "Fraction of expected input files that were found and opened.",
    ),
    (
        PipelineType::FileProcessing,
        MetricField::FileExtractionSuccessRate,
        "Fraction of opened files whose records were extracted without error.",
    ),
    (
        PipelineType::FileProcessing,
        MetricField::ParseSuccessRate,
        "Fraction of extracted records that parsed into the expected structure.",
    ),
    (
        PipelineType::FileProcessing,
        MetricField::LegacyFetchSuccessRate,
        "Deprecated alias of file_extraction_success_rate kept for older dashboards.",
    ),
    (
        PipelineType::StreamProcessing,
        MetricField::QualityPassRate,
        "Fraction of streamed messages that survived post-collection quality filtering.",
    ),
    (
        PipelineType::StreamProcessing,
        MetricField::StreamConnectionSuccessRate,
        "Fraction of stream connection attempts that were established.",
    ),
    (
        PipelineType::StreamProcessing,
        MetricField::MessageDeliveryRate,
        "Fraction of published messages delivered to the consumer.",
    ),
    (
        PipelineType::StreamProcessing,
        MetricField::MessageParseSuccessRate,
        "Fraction of delivered messages that decoded into valid records.",
    ),
    (
        PipelineType::StreamProcessing,
        MetricField::LegacyFetchSuccessRate,
        "Deprecated alias of stream_connection_success_rate kept for older dashboards.",
    ),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticOrigin {
    Record,
    Table,
    AutoGenerated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSemantics {
    pub description: String,
    pub origin: SemanticOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRecord {
    pub record: MetricsRecord,
    pub semantics: BTreeMap<MetricField, FieldSemantics>,
}

#[derive(Debug, Deserialize)]
struct SemanticsFile {
    entries: Vec<SemanticsFileEntry>,
}

#[derive(Debug, Deserialize)]
struct SemanticsFileEntry {
    pipeline_type: String,
    field: String,
    description: String,
}

/// Immutable description lookup keyed by pipeline type and field.
#[derive(Debug, Clone, Default)]
pub struct SemanticsTable {
    entries: HashMap<(PipelineType, MetricField), String>,
}

impl SemanticsTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN_DESCRIPTIONS
            .iter()
            .map(|(pipeline_type, field, text)| ((*pipeline_type, *field), (*text).to_string()))
            .collect();
        Self { entries }
    }

    /// Replaces the builtin table entirely.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file: SemanticsFile = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut entries = HashMap::with_capacity(file.entries.len());
        for entry in file.entries {
            let pipeline_type = entry
                .pipeline_type
                .parse::<PipelineType>()
                .with_context(|| format!("invalid semantics entry in {}", path.display()))?;
            let Some(field) = MetricField::from_name(entry.field.trim()) else {
                bail!(
                    "unknown metric field '{}' in {}",
                    entry.field,
                    path.display()
                );
            };
            entries.insert((pipeline_type, field), entry.description.trim().to_string());
        }

        info!(path = %path.display(), entries = entries.len(), "loaded semantics table");
        Ok(Self { entries })
    }

    pub fn describe(&self, pipeline_type: PipelineType, field: MetricField) -> Option<&str> {
        self.entries
            .get(&(pipeline_type, field))
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn annotate(record: MetricsRecord, table: &SemanticsTable) -> AnnotatedRecord {
    let semantics = record
        .metrics
        .keys()
        .map(|field| {
            let semantics = if let Some(text) = record.descriptions.get(field) {
                FieldSemantics {
                    description: text.clone(),
                    origin: SemanticOrigin::Record,
                }
            } else if let Some(text) = table.describe(record.pipeline_type, *field) {
                FieldSemantics {
                    description: text.to_string(),
                    origin: SemanticOrigin::Table,
                }
            } else {
                FieldSemantics {
                    description: fallback_description(record.pipeline_type, *field),
                    origin: SemanticOrigin::AutoGenerated,
                }
            };
            (*field, semantics)
        })
        .collect();

    AnnotatedRecord { record, semantics }
}

fn fallback_description(pipeline_type: PipelineType, field: MetricField) -> String {
    format!(
        "Reported {} for a {} pipeline; no curated description is available.",
        field.as_str().replace('_', " "),
        pipeline_type
    )
}
