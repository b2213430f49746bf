use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compat::{
    AggregateSummary, DeprecationNotice, FieldSemantics, MetricField, MetricsRecord,
    PipelineType, RejectedRecord, SchemaVersion,
};

pub const ARTIFACT_VERSION: u32 = 1;
pub const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFile {
    pub path: String,
    pub sha256: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub source_id: String,
    pub pipeline_type: PipelineType,
    pub input_schema_version: SchemaVersion,
    pub origin: String,
    pub volume: u64,
    pub metrics: BTreeMap<MetricField, f64>,
    #[serde(rename = "_metric_semantics", default)]
    pub metric_semantics: BTreeMap<MetricField, FieldSemantics>,
}

impl SourceMetrics {
    pub fn to_record(&self) -> MetricsRecord {
        MetricsRecord {
            source_id: self.source_id.clone(),
            pipeline_type: self.pipeline_type,
            schema_version: self.input_schema_version,
            metrics: self.metrics.clone(),
            descriptions: BTreeMap::new(),
        }
    }
}

/// Artifact handed to the dashboard renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub artifact_version: u32,
    pub schema_version: SchemaVersion,
    pub generated_at: String,
    pub inputs: Vec<InputFile>,
    pub sources: Vec<SourceMetrics>,
    pub summary: AggregateSummary,
    #[serde(default)]
    pub rejected: Vec<RejectedRecord>,
    #[serde(default)]
    pub deprecations: Vec<DeprecationNotice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub check_id: String,
    pub name: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub report_version: u32,
    pub generated_at: String,
    pub artifact_path: String,
    pub status: String,
    pub source_count: usize,
    pub rejected_count: usize,
    pub checks: Vec<QualityCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectEntry {
    pub origin: String,
    pub index: usize,
    pub source_id: Option<String>,
    pub schema_version: Option<SchemaVersion>,
    pub pipeline_type: Option<PipelineType>,
    pub volume: Option<u64>,
    pub fields: Vec<MetricField>,
    pub legacy_fields: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub generated_at: String,
    pub record_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub entries: Vec<InspectEntry>,
}
