use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use tracing::info;

use crate::cli::MergeArgs;
use crate::compat::{DeprecationNotice, SchemaVersion, merge_summaries};
use crate::model::{ARTIFACT_VERSION, DashboardMetrics};
use crate::util::{now_utc_string, read_json, write_json_pretty};

pub fn run(args: MergeArgs) -> Result<()> {
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("dashboard_metrics.merged.json"));

    let mut artifacts = Vec::with_capacity(args.artifacts.len());
    for path in &args.artifacts {
        let artifact: DashboardMetrics = read_json(path)?;
        info!(path = %path.display(), sources = artifact.sources.len(), "loaded artifact");
        artifacts.push(artifact);
    }

    let merged = merge_artifacts(artifacts)?;
    write_json_pretty(&output_path, &merged)?;
    info!(
        path = %output_path.display(),
        sources = merged.sources.len(),
        quality_pass_rate = ?merged.summary.quality_pass_rate,
        "wrote merged dashboard metrics"
    );

    Ok(())
}

/// Combines artifacts built from disjoint source sets without re-reading raw inputs.
pub fn merge_artifacts(artifacts: Vec<DashboardMetrics>) -> Result<DashboardMetrics> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (position, artifact) in artifacts.iter().enumerate() {
        for source in &artifact.sources {
            if let Some(previous) = seen.insert(source.source_id.to_ascii_lowercase(), position) {
                if previous != position {
                    bail!(
                        "source '{}' appears in artifacts {} and {}; merge expects disjoint sources",
                        source.source_id,
                        previous,
                        position
                    );
                }
            }
        }
    }

    let summaries = artifacts
        .iter()
        .map(|artifact| artifact.summary.clone())
        .collect::<Vec<_>>();
    let summary = merge_summaries(&summaries);

    let mut inputs = Vec::new();
    let mut sources = Vec::new();
    let mut rejected = Vec::new();
    let mut deprecations: BTreeMap<String, DeprecationNotice> = BTreeMap::new();

    for artifact in artifacts {
        inputs.extend(artifact.inputs);
        sources.extend(artifact.sources);
        rejected.extend(artifact.rejected);
        for notice in artifact.deprecations {
            let occurrences = notice.occurrences;
            deprecations
                .entry(notice.field.clone())
                .and_modify(|existing| existing.occurrences += occurrences)
                .or_insert(notice);
        }
    }

    Ok(DashboardMetrics {
        artifact_version: ARTIFACT_VERSION,
        schema_version: SchemaVersion::V2,
        generated_at: now_utc_string(),
        inputs,
        sources,
        summary,
        rejected,
        deprecations: deprecations.into_values().collect(),
    })
}
