use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fields::{MetricField, PipelineType, SchemaVersion};

/// Canonical per-source metrics, whatever schema the producer used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub source_id: String,
    pub pipeline_type: PipelineType,
    pub schema_version: SchemaVersion,
    pub metrics: BTreeMap<MetricField, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptions: BTreeMap<MetricField, String>,
}

impl MetricsRecord {
    pub fn rate(&self, field: MetricField) -> Option<f64> {
        self.metrics.get(&field).copied()
    }

    pub fn quality_pass_rate(&self) -> Option<f64> {
        self.rate(MetricField::QualityPassRate)
    }

    pub fn legacy_fetch_success_rate(&self) -> Option<f64> {
        self.rate(MetricField::LegacyFetchSuccessRate)
    }

    /// Every populated field except the legacy aliases.
    pub fn pipeline_fields(&self) -> BTreeMap<MetricField, f64> {
        self.metrics
            .iter()
            .filter(|(field, _)| !field.is_legacy_alias())
            .map(|(field, rate)| (*field, *rate))
            .collect()
    }

    pub fn disallowed_fields(&self) -> Vec<MetricField> {
        self.metrics
            .keys()
            .copied()
            .filter(|field| !self.pipeline_type.allows(*field))
            .collect()
    }
}
