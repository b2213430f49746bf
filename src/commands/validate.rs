use std::collections::HashSet;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::compat::{MetricField, aggregate};
use crate::model::{DashboardMetrics, QualityCheck, REPORT_VERSION, ValidationReport};
use crate::util::{now_utc_string, read_json, write_json_pretty};

const RATE_TOLERANCE: f64 = 1e-9;

pub fn run(args: ValidateArgs) -> Result<()> {
    let artifact_path = args
        .artifact_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("dashboard_metrics.json"));
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("validation_report.json"));

    let artifact: DashboardMetrics = read_json(&artifact_path)?;
    let checks = build_quality_checks(&artifact);
    let failed = checks.iter().filter(|check| check.result == "failed").count();

    for check in checks.iter().filter(|check| check.result == "failed") {
        warn!(
            check_id = %check.check_id,
            name = %check.name,
            details = %check.details.join("; "),
            "validation check failed"
        );
    }

    let report = ValidationReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        artifact_path: artifact_path.display().to_string(),
        status: if failed == 0 { "pass" } else { "failed" }.to_string(),
        source_count: artifact.sources.len(),
        rejected_count: artifact.rejected.len(),
        checks,
    };

    write_json_pretty(&report_path, &report)?;
    info!(path = %report_path.display(), status = %report.status, "wrote validation report");

    if failed > 0 {
        bail!("{failed} validation check(s) failed for {}", artifact_path.display());
    }

    Ok(())
}

pub fn build_quality_checks(artifact: &DashboardMetrics) -> Vec<QualityCheck> {
    let has_sources = !artifact.sources.is_empty();
    let mut checks = Vec::new();

    let mut details = Vec::new();
    for source in &artifact.sources {
        for (field, rate) in &source.metrics {
            if !rate.is_finite() || !(0.0..=1.0).contains(rate) {
                details.push(format!("{}: {field} = {rate}", source.source_id));
            }
        }
    }
    if let Some(rate) = artifact.summary.quality_pass_rate {
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            details.push(format!("summary: quality_pass_rate = {rate}"));
        }
    }
    checks.push(check("V-001", "Metric rates within [0, 1]", has_sources, details));

    let mut details = Vec::new();
    for source in &artifact.sources {
        for field in source.to_record().disallowed_fields() {
            details.push(format!(
                "{}: {field} is not valid for {}",
                source.source_id, source.pipeline_type
            ));
        }
    }
    checks.push(check(
        "V-002",
        "Populated fields valid for pipeline type",
        has_sources,
        details,
    ));

    let mut details = Vec::new();
    let mut alias_candidates = 0;
    for source in &artifact.sources {
        let record = source.to_record();
        let primary = source.pipeline_type.primary_field();
        let Some(primary_rate) = record.rate(primary) else {
            continue;
        };
        alias_candidates += 1;
        match record.legacy_fetch_success_rate() {
            Some(alias) if alias == primary_rate => {}
            Some(alias) => details.push(format!(
                "{}: legacy_fetch_success_rate {alias} != {primary} {primary_rate}",
                source.source_id
            )),
            None => details.push(format!(
                "{}: legacy_fetch_success_rate missing",
                source.source_id
            )),
        }
    }
    checks.push(check(
        "V-003",
        "Legacy fetch alias mirrors the primary field",
        alias_candidates > 0,
        details,
    ));

    let mut details = Vec::new();
    for source in &artifact.sources {
        for field in source.metrics.keys() {
            let described = source
                .metric_semantics
                .get(field)
                .is_some_and(|semantics| !semantics.description.trim().is_empty());
            if !described {
                details.push(format!("{}: {field} has no description", source.source_id));
            }
        }
    }
    checks.push(check(
        "V-004",
        "Semantics cover every populated field",
        has_sources,
        details,
    ));

    let records = artifact
        .sources
        .iter()
        .map(|source| (source.to_record(), source.volume))
        .collect::<Vec<_>>();
    let recomputed = aggregate(records.iter().map(|(record, volume)| (record, *volume)));
    let mut details = Vec::new();
    if !rates_match(recomputed.quality_pass_rate, artifact.summary.quality_pass_rate) {
        details.push(format!(
            "quality_pass_rate recomputes to {:?}, artifact has {:?}",
            recomputed.quality_pass_rate, artifact.summary.quality_pass_rate
        ));
    }
    if recomputed.total_volume != artifact.summary.total_volume {
        details.push(format!(
            "total_volume recomputes to {}, artifact has {}",
            recomputed.total_volume, artifact.summary.total_volume
        ));
    }
    if recomputed.weighted_volume != artifact.summary.weighted_volume {
        details.push(format!(
            "weighted_volume recomputes to {}, artifact has {}",
            recomputed.weighted_volume, artifact.summary.weighted_volume
        ));
    }
    checks.push(check(
        "V-005",
        "Overall quality pass rate recomputes volume-weighted",
        has_sources,
        details,
    ));

    let mut details = Vec::new();
    if artifact.summary.sources.len() != artifact.sources.len() {
        details.push(format!(
            "summary lists {} sources, artifact has {}",
            artifact.summary.sources.len(),
            artifact.sources.len()
        ));
    }
    for (entry, source) in artifact.summary.sources.iter().zip(&artifact.sources) {
        let expected = source.metrics.get(&MetricField::QualityPassRate).copied();
        if entry.source_id != source.source_id
            || entry.volume != source.volume
            || !rates_match(entry.quality_pass_rate, expected)
        {
            details.push(format!(
                "{}: summary entry does not match its quality_pass_rate/volume",
                source.source_id
            ));
        }
    }
    checks.push(check(
        "V-006",
        "Summary uses only per-source quality pass rates",
        has_sources,
        details,
    ));

    let mut details = Vec::new();
    let mut seen = HashSet::new();
    for source in &artifact.sources {
        if !seen.insert(source.source_id.to_ascii_lowercase()) {
            details.push(format!("{}: duplicate source id", source.source_id));
        }
    }
    checks.push(check("V-007", "Source ids unique", has_sources, details));

    let mut details = Vec::new();
    for breakdown in &artifact.summary.by_pipeline_type {
        for average in &breakdown.fields {
            if !breakdown.pipeline_type.allows(average.field) {
                details.push(format!(
                    "{} breakdown averages foreign field {}",
                    breakdown.pipeline_type, average.field
                ));
            }
        }
    }
    checks.push(check(
        "V-008",
        "Pipeline breakdowns never mix field semantics",
        !artifact.summary.by_pipeline_type.is_empty(),
        details,
    ));

    checks
}

fn check(check_id: &str, name: &str, applicable: bool, details: Vec<String>) -> QualityCheck {
    let result = if !applicable {
        "pending"
    } else if details.is_empty() {
        "pass"
    } else {
        "failed"
    };

    QualityCheck {
        check_id: check_id.to_string(),
        name: name.to_string(),
        result: result.to_string(),
        details,
    }
}

fn rates_match(left: Option<f64>, right: Option<f64>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => (left - right).abs() <= RATE_TOLERANCE,
        _ => false,
    }
}
