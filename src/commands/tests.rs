use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use super::*;
use super::build::build_artifact;
use super::input::{load_inputs, resolve_input_paths, split_document};
use super::inspect::inspect_inputs;
use super::merge::merge_artifacts;
use super::validate::build_quality_checks;
use crate::cli::{BuildArgs, ValidateArgs};
use crate::compat::{
    AggregateSummary, FieldMapper, MetricField, PipelineType, SemanticsTable, SourceRegistry,
    aggregate,
};
use crate::model::{DashboardMetrics, ValidationReport};
use crate::util::{read_json, sha256_bytes, write_json_pretty};

fn write_value(path: &Path, value: &Value) {
    write_json_pretty(path, value).expect("fixture should be written");
}

/// Cache root with three valid sources, one malformed record and a registry.
fn write_fixture(root: &Path) -> PathBuf {
    let inputs = root.join("inputs");
    write_value(
        &inputs.join("bbc.json"),
        &json!({
            "source_id": "bbc",
            "schema_version": "2.0",
            "pipeline_type": "web-scraping",
            "volume": 1000,
            "pipeline_metrics": {
                "http_request_success_rate": 0.65,
                "content_extraction_rate": 0.81,
                "quality_pass_rate": 0.92
            }
        }),
    );
    write_value(
        &inputs.join("wikipedia.json"),
        &json!({
            "source_id": "wikipedia",
            "pipeline_type": "file-processing",
            "volume": 500,
            "pipeline_metrics": {
                "file_extraction_success_rate": 1.0,
                "quality_pass_rate": 0.98
            }
        }),
    );
    write_value(
        &inputs.join("legacy.json"),
        &json!([
            {"source_id": "reuters", "success_rate": 0.7, "volume": 200},
            {"source_id": "orphan", "fetched": 12}
        ]),
    );
    write_value(
        &root.join("source_registry.json"),
        &json!({"sources": {"reuters": "web-scraping", "wikipedia": "file-processing"}}),
    );
    inputs
}

fn build_fixture_artifact(root: &Path) -> DashboardMetrics {
    let inputs = write_fixture(root);
    let registry =
        SourceRegistry::load(&root.join("source_registry.json")).expect("registry should load");
    let mapper = FieldMapper::new(&registry).expect("field regex should compile");
    let loaded = load_inputs(&[inputs]).expect("inputs should load");
    build_artifact(loaded, &mapper, &SemanticsTable::builtin())
}

fn summarize(artifact: &DashboardMetrics) -> AggregateSummary {
    let records = artifact
        .sources
        .iter()
        .map(|source| (source.to_record(), source.volume))
        .collect::<Vec<_>>();
    aggregate(records.iter().map(|(record, volume)| (record, *volume)))
}

fn build_args(root: &Path) -> BuildArgs {
    BuildArgs {
        cache_root: root.to_path_buf(),
        inputs: Vec::new(),
        source_registry_path: None,
        semantics_path: None,
        output_path: None,
        dry_run: false,
        strict: false,
    }
}

#[test]
fn split_document_accepts_single_array_and_source_list_shapes() {
    assert_eq!(split_document(json!({"source_id": "a", "success_rate": 0.5})).len(), 1);
    assert_eq!(split_document(json!([{"source_id": "a"}, {"source_id": "b"}])).len(), 2);
    assert_eq!(
        split_document(json!({"sources": [{"source_id": "a"}, {"source_id": "b"}, {}]})).len(),
        3
    );
    assert_eq!(
        split_document(json!({"source_id": "a", "sources": ["nested"]})).len(),
        1
    );
}

#[test]
fn load_inputs_discovers_sorted_json_files_and_reports_invalid_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_fixture(dir.path());
    fs::write(inputs.join("broken.json"), b"{not json").expect("write broken file");
    fs::write(inputs.join("notes.txt"), b"ignored").expect("write notes");

    let loaded = load_inputs(&[inputs]).expect("inputs should load");

    let names = loaded
        .files
        .iter()
        .map(|file| {
            Path::new(&file.path)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["bbc.json", "broken.json", "legacy.json", "wikipedia.json"]);
    assert_eq!(loaded.records.len(), 4);
    assert_eq!(loaded.unreadable.len(), 1);
    assert!(loaded.unreadable[0].message.contains("invalid JSON"));
    assert!(loaded.files.iter().all(|file| file.sha256.len() == 64));
    assert_eq!(loaded.files[2].record_count, 2);
}

#[test]
fn load_inputs_fails_for_missing_or_empty_locations() {
    let dir = tempfile::tempdir().expect("tempdir");

    let missing = load_inputs(&[dir.path().join("nope")]).expect_err("missing path should fail");
    assert!(missing.to_string().contains("does not exist"));

    let empty = load_inputs(&[dir.path().to_path_buf()]).expect_err("empty dir should fail");
    assert!(empty.to_string().contains("no metrics inputs"));
}

#[test]
fn load_inputs_names_single_record_files_after_their_stem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reuters = dir.path().join("reuters.json");
    let bundle = dir.path().join("bundle.json");
    let listed = dir.path().join("listed.json");
    write_value(&reuters, &json!({"success_rate": 0.9}));
    write_value(&bundle, &json!([{"pipeline_metrics": {"quality_pass_rate": 0.9}}]));
    write_value(&listed, &json!({"sources": [{"success_rate": 0.4}]}));

    let loaded = load_inputs(&[reuters.clone(), bundle, listed]).expect("inputs should load");
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.records[0].fallback_source_id.as_deref(), Some("reuters"));
    assert_eq!(loaded.records[1].fallback_source_id, None);
    assert_eq!(loaded.records[2].fallback_source_id, None);

    let raw = fs::read(&reuters).expect("read reuters input");
    assert_eq!(loaded.files[0].sha256, sha256_bytes(&raw));

    let registry = SourceRegistry::from_entries([("reuters", PipelineType::WebScraping)]);
    let mapper = FieldMapper::new(&registry).expect("field regex should compile");
    let report = inspect_inputs(&loaded, &mapper);
    assert_eq!(report.accepted_count, 1);
    assert_eq!(report.entries[0].source_id.as_deref(), Some("reuters"));
    assert!(report.entries[0].error.is_none());
    assert!(report.entries[1].error.is_some());
    assert!(report.entries[2].error.is_some());
}

#[test]
fn resolve_input_paths_defaults_to_cache_inputs_directory() {
    let root = Path::new("/tmp/metrics-cache");
    assert_eq!(resolve_input_paths(root, &[]), vec![root.join("inputs")]);

    let explicit = vec![PathBuf::from("a.json")];
    assert_eq!(resolve_input_paths(root, &explicit), explicit);
}

#[test]
fn build_artifact_normalizes_aggregates_and_keeps_rejections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = build_fixture_artifact(dir.path());

    let ids = artifact
        .sources
        .iter()
        .map(|source| source.source_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["bbc", "reuters", "wikipedia"]);

    assert_eq!(artifact.rejected.len(), 1);
    assert_eq!(artifact.rejected[0].source_id.as_deref(), Some("orphan"));
    assert_eq!(artifact.rejected[0].index, 1);

    let reuters = &artifact.sources[1];
    assert_eq!(reuters.pipeline_type, PipelineType::WebScraping);
    assert_eq!(reuters.metrics[&MetricField::LegacyFetchSuccessRate], 0.7);
    assert!(reuters.metric_semantics.contains_key(&MetricField::LegacyFetchSuccessRate));

    assert_eq!(artifact.summary.total_volume, 1700);
    assert_eq!(artifact.summary.weighted_volume, 1500);
    let rate = artifact.summary.quality_pass_rate.expect("rate should be defined");
    assert!((rate - 0.94).abs() < 1e-12, "got {rate}");

    assert_eq!(artifact.deprecations.len(), 1);
    assert_eq!(artifact.deprecations[0].field, "success_rate");
    assert_eq!(artifact.inputs.len(), 3);
}

#[test]
fn artifact_json_exposes_semantics_under_metric_semantics_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = build_fixture_artifact(dir.path());

    let value = serde_json::to_value(&artifact).expect("artifact should serialize");
    assert_eq!(value["schema_version"], "2.0");
    let bbc = &value["sources"][0];
    assert_eq!(bbc["metrics"]["legacy_fetch_success_rate"], 0.65);
    assert_eq!(
        bbc["_metric_semantics"]["http_request_success_rate"]["origin"],
        "table"
    );
}

#[test]
fn built_artifact_passes_every_quality_check() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = build_fixture_artifact(dir.path());

    let path = dir.path().join("dashboard_metrics.json");
    write_json_pretty(&path, &artifact).expect("artifact should be written");
    let reloaded: DashboardMetrics = read_json(&path).expect("artifact should reload");

    let checks = build_quality_checks(&reloaded);
    assert_eq!(checks.len(), 8);
    for check in &checks {
        assert_eq!(check.result, "pass", "{} {:?}", check.check_id, check.details);
    }
}

#[test]
fn quality_checks_flag_tampered_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut artifact = build_fixture_artifact(dir.path());

    artifact.summary.quality_pass_rate = Some(0.5);
    artifact.sources[0]
        .metrics
        .insert(MetricField::FileExtractionSuccessRate, 1.0);
    artifact.sources[2]
        .metric_semantics
        .remove(&MetricField::QualityPassRate);

    let checks = build_quality_checks(&artifact);
    let failed = checks
        .iter()
        .filter(|check| check.result == "failed")
        .map(|check| check.check_id.as_str())
        .collect::<Vec<_>>();

    assert!(failed.contains(&"V-002"));
    assert!(failed.contains(&"V-004"));
    assert!(failed.contains(&"V-005"));
    assert!(!failed.contains(&"V-001"));
}

#[test]
fn quality_checks_are_pending_for_empty_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut artifact = build_fixture_artifact(dir.path());
    artifact.sources.clear();
    artifact.summary = aggregate(std::iter::empty());

    let checks = build_quality_checks(&artifact);
    assert!(checks.iter().all(|check| check.result == "pending"));
}

#[test]
fn build_run_writes_artifact_and_strict_mode_fails_on_rejections() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture(dir.path());

    build::run(build_args(dir.path())).expect("lenient build should succeed");
    let artifact: DashboardMetrics =
        read_json(&dir.path().join("dashboard_metrics.json")).expect("artifact should exist");
    assert_eq!(artifact.sources.len(), 3);

    let mut strict = build_args(dir.path());
    strict.strict = true;
    strict.output_path = Some(dir.path().join("strict.json"));
    let error = build::run(strict).expect_err("strict build should fail");
    assert!(error.to_string().contains("rejected"));
    assert!(dir.path().join("strict.json").exists());

    let mut dry_run = build_args(dir.path());
    dry_run.dry_run = true;
    dry_run.output_path = Some(dir.path().join("dry.json"));
    build::run(dry_run).expect("dry run should succeed");
    assert!(!dir.path().join("dry.json").exists());
}

#[test]
fn validate_run_writes_report_for_built_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture(dir.path());
    build::run(build_args(dir.path())).expect("build should succeed");

    validate::run(ValidateArgs {
        cache_root: dir.path().to_path_buf(),
        artifact_path: None,
        report_path: None,
    })
    .expect("validation should pass");

    let report: ValidationReport =
        read_json(&dir.path().join("validation_report.json")).expect("report should exist");
    assert_eq!(report.status, "pass");
    assert_eq!(report.source_count, 3);
    assert_eq!(report.rejected_count, 1);
}

#[test]
fn inspect_reports_schema_and_rejections_per_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = write_fixture(dir.path());
    let registry =
        SourceRegistry::load(&dir.path().join("source_registry.json")).expect("registry");
    let mapper = FieldMapper::new(&registry).expect("field regex should compile");
    let loaded = load_inputs(&[inputs]).expect("inputs should load");

    let report = inspect_inputs(&loaded, &mapper);
    assert_eq!(report.record_count, 4);
    assert_eq!(report.accepted_count, 3);
    assert_eq!(report.rejected_count, 1);

    let reuters = report
        .entries
        .iter()
        .find(|entry| entry.source_id.as_deref() == Some("reuters"))
        .expect("reuters entry");
    assert_eq!(reuters.legacy_fields, vec!["success_rate".to_string()]);
    assert!(reuters.error.is_none());
}

#[test]
fn merge_combines_disjoint_artifacts_and_rejects_overlap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = build_fixture_artifact(dir.path());

    let mut first = artifact.clone();
    let mut second = artifact.clone();
    first.sources.retain(|source| source.source_id == "bbc");
    first.summary = summarize(&first);
    second.sources.retain(|source| source.source_id != "bbc");
    second.summary = summarize(&second);

    let merged = merge_artifacts(vec![first, second]).expect("disjoint merge should succeed");
    assert_eq!(merged.sources.len(), 3);
    assert_eq!(merged.summary.total_volume, 1700);
    let rate = merged.summary.quality_pass_rate.expect("rate should be defined");
    assert!((rate - 0.94).abs() < 1e-12, "got {rate}");
    assert_eq!(merged.deprecations.len(), 1);
    assert_eq!(merged.deprecations[0].occurrences, 2);

    let error = merge_artifacts(vec![artifact.clone(), artifact])
        .expect_err("overlapping sources should fail");
    assert!(error.to_string().contains("disjoint"));
}
