use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::BuildArgs;
use crate::commands::input::{LoadedInputs, load_inputs, resolve_input_paths};
use crate::compat::{
    FieldMapper, SchemaVersion, SemanticsTable, SourceRegistry, aggregate, normalize_batch,
};
use crate::model::{ARTIFACT_VERSION, DashboardMetrics, SourceMetrics};
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: BuildArgs) -> Result<()> {
    let registry_path = args
        .source_registry_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("source_registry.json"));
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("dashboard_metrics.json"));

    let registry = SourceRegistry::load_or_default(&registry_path)?;
    let table = match &args.semantics_path {
        Some(path) => SemanticsTable::load(path)?,
        None => SemanticsTable::builtin(),
    };
    let mapper = FieldMapper::new(&registry)?;

    let loaded = load_inputs(&resolve_input_paths(&args.cache_root, &args.inputs))?;
    let artifact = build_artifact(loaded, &mapper, &table);

    info!(
        sources = artifact.sources.len(),
        rejected = artifact.rejected.len(),
        deprecations = artifact.deprecations.len(),
        total_volume = artifact.summary.total_volume,
        quality_pass_rate = ?artifact.summary.quality_pass_rate,
        "dashboard metrics aggregated"
    );

    if args.dry_run {
        info!(path = %output_path.display(), "build dry-run complete");
    } else {
        write_json_pretty(&output_path, &artifact)?;
        info!(path = %output_path.display(), "wrote dashboard metrics");
    }

    if !artifact.rejected.is_empty() {
        if args.strict {
            bail!(
                "{} metrics record(s) rejected in strict mode",
                artifact.rejected.len()
            );
        }
        warn!(
            rejected = artifact.rejected.len(),
            "some metrics records were rejected; see the artifact's rejected list"
        );
    }

    Ok(())
}

pub fn build_artifact(
    loaded: LoadedInputs,
    mapper: &FieldMapper<'_>,
    table: &SemanticsTable,
) -> DashboardMetrics {
    let LoadedInputs {
        records,
        files,
        unreadable,
    } = loaded;

    let outcome = normalize_batch(records, mapper, table);
    let summary = aggregate(
        outcome
            .sources
            .iter()
            .map(|source| (&source.annotated.record, source.volume)),
    );

    let mut rejected = unreadable;
    rejected.extend(outcome.rejected);
    rejected.sort_by(|a, b| a.origin.cmp(&b.origin).then(a.index.cmp(&b.index)));

    let sources = outcome
        .sources
        .into_iter()
        .map(|source| SourceMetrics {
            source_id: source.annotated.record.source_id,
            pipeline_type: source.annotated.record.pipeline_type,
            input_schema_version: source.annotated.record.schema_version,
            origin: source.origin,
            volume: source.volume,
            metrics: source.annotated.record.metrics,
            metric_semantics: source.annotated.semantics,
        })
        .collect();

    DashboardMetrics {
        artifact_version: ARTIFACT_VERSION,
        schema_version: SchemaVersion::V2,
        generated_at: now_utc_string(),
        inputs: files,
        sources,
        summary,
        rejected,
        deprecations: outcome.deprecations,
    }
}
