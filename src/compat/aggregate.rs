use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fields::{MetricField, PipelineType};
use super::record::MetricsRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuality {
    pub source_id: String,
    pub pipeline_type: PipelineType,
    pub volume: u64,
    pub quality_pass_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAverage {
    pub field: MetricField,
    pub sources: usize,
    pub volume: u64,
    pub weighted_rate: Option<f64>,
}

/// Same-field averages over sources of one pipeline type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineBreakdown {
    pub pipeline_type: PipelineType,
    pub sources: usize,
    pub total_volume: u64,
    pub fields: Vec<FieldAverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub sources: Vec<SourceQuality>,
    pub total_volume: u64,
    /// Volume of sources that reported a quality pass rate.
    pub weighted_volume: u64,
    pub quality_pass_rate: Option<f64>,
    pub by_pipeline_type: Vec<PipelineBreakdown>,
}

/// Volume-weighted mean. Zero-volume samples contribute nothing. The reported
/// volume saturates at `u64::MAX`; the mean divides by the unclamped weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedMean {
    numerator: f64,
    weight: f64,
    volume: u64,
    contributors: usize,
    last_rate: f64,
}

impl WeightedMean {
    pub fn add(&mut self, rate: f64, volume: u64) {
        if volume == 0 {
            return;
        }
        self.numerator += rate * volume as f64;
        self.weight += volume as f64;
        self.volume = self.volume.saturating_add(volume);
        self.contributors += 1;
        self.last_rate = rate;
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn value(&self) -> Option<f64> {
        match self.contributors {
            0 => None,
            1 => Some(self.last_rate),
            _ => Some(self.numerator / self.weight),
        }
    }
}

#[derive(Default)]
struct FieldAccumulator {
    sources: usize,
    volume: u64,
    mean: WeightedMean,
}

#[derive(Default)]
struct BreakdownAccumulator {
    sources: usize,
    total_volume: u64,
    fields: BTreeMap<MetricField, FieldAccumulator>,
}

impl BreakdownAccumulator {
    fn add_field(&mut self, field: MetricField, sources: usize, volume: u64, rate: Option<f64>) {
        let entry = self.fields.entry(field).or_default();
        entry.sources += sources;
        entry.volume = entry.volume.saturating_add(volume);
        if let Some(rate) = rate {
            entry.mean.add(rate, volume);
        }
    }

    fn finish(self, pipeline_type: PipelineType) -> PipelineBreakdown {
        PipelineBreakdown {
            pipeline_type,
            sources: self.sources,
            total_volume: self.total_volume,
            fields: self
                .fields
                .into_iter()
                .map(|(field, acc)| FieldAverage {
                    field,
                    sources: acc.sources,
                    volume: acc.volume,
                    weighted_rate: acc.mean.value(),
                })
                .collect(),
        }
    }
}

/// Only `quality_pass_rate` feeds the overall figure; other fields are averaged
/// per pipeline type and only with themselves.
pub fn aggregate<'a, I>(inputs: I) -> AggregateSummary
where
    I: IntoIterator<Item = (&'a MetricsRecord, u64)>,
{
    let mut sources = Vec::new();
    let mut total_volume = 0_u64;
    let mut overall = WeightedMean::default();
    let mut breakdowns: BTreeMap<PipelineType, BreakdownAccumulator> = BTreeMap::new();

    for (record, volume) in inputs {
        let quality_pass_rate = record.quality_pass_rate();
        total_volume = total_volume.saturating_add(volume);
        if let Some(rate) = quality_pass_rate {
            overall.add(rate, volume);
        }

        let breakdown = breakdowns.entry(record.pipeline_type).or_default();
        breakdown.sources += 1;
        breakdown.total_volume = breakdown.total_volume.saturating_add(volume);
        for (field, rate) in &record.metrics {
            breakdown.add_field(*field, 1, volume, Some(*rate));
        }

        sources.push(SourceQuality {
            source_id: record.source_id.clone(),
            pipeline_type: record.pipeline_type,
            volume,
            quality_pass_rate,
        });
    }

    AggregateSummary {
        sources,
        total_volume,
        weighted_volume: overall.volume(),
        quality_pass_rate: overall.value(),
        by_pipeline_type: breakdowns
            .into_iter()
            .map(|(pipeline_type, acc)| acc.finish(pipeline_type))
            .collect(),
    }
}

/// Re-aggregates already aggregated summaries, weighting each by the volume
/// that produced its figures.
pub fn merge_summaries(summaries: &[AggregateSummary]) -> AggregateSummary {
    let mut sources = Vec::new();
    let mut total_volume = 0_u64;
    let mut overall = WeightedMean::default();
    let mut breakdowns: BTreeMap<PipelineType, BreakdownAccumulator> = BTreeMap::new();

    for summary in summaries {
        sources.extend(summary.sources.iter().cloned());
        total_volume = total_volume.saturating_add(summary.total_volume);
        if let Some(rate) = summary.quality_pass_rate {
            overall.add(rate, summary.weighted_volume);
        }

        for breakdown in &summary.by_pipeline_type {
            let acc = breakdowns.entry(breakdown.pipeline_type).or_default();
            acc.sources += breakdown.sources;
            acc.total_volume = acc.total_volume.saturating_add(breakdown.total_volume);
            for field in &breakdown.fields {
                acc.add_field(field.field, field.sources, field.volume, field.weighted_rate);
            }
        }
    }

    AggregateSummary {
        sources,
        total_volume,
        weighted_volume: overall.volume(),
        quality_pass_rate: overall.value(),
        by_pipeline_type: breakdowns
            .into_iter()
            .map(|(pipeline_type, acc)| acc.finish(pipeline_type))
            .collect(),
    }
}
