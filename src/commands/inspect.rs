use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::commands::input::{LoadedInputs, load_inputs, resolve_input_paths};
use crate::compat::{FieldMapper, SourceRegistry, classify};
use crate::model::{InspectEntry, InspectReport};
use crate::util::now_utc_string;

pub fn run(args: InspectArgs) -> Result<()> {
    let registry_path = args
        .source_registry_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("source_registry.json"));

    let registry = SourceRegistry::load_or_default(&registry_path)?;
    let mapper = FieldMapper::new(&registry)?;
    let loaded = load_inputs(&resolve_input_paths(&args.cache_root, &args.inputs))?;

    let report = inspect_inputs(&loaded, &mapper);

    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize inspect json output")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    for entry in &report.entries {
        match &entry.error {
            None => info!(
                origin = %entry.origin,
                index = entry.index,
                source_id = %entry.source_id.as_deref().unwrap_or_default(),
                schema_version = %entry.schema_version.map(|v| v.as_str()).unwrap_or_default(),
                pipeline_type = %entry.pipeline_type.map(|t| t.as_str()).unwrap_or_default(),
                volume = entry.volume.unwrap_or_default(),
                fields = entry.fields.len(),
                legacy_fields = %entry.legacy_fields.join(","),
                "record accepted"
            ),
            Some(error) => warn!(
                origin = %entry.origin,
                index = entry.index,
                source_id = %entry.source_id.as_deref().unwrap_or_default(),
                error = %error,
                "record rejected"
            ),
        }
    }

    info!(
        records = report.record_count,
        accepted = report.accepted_count,
        rejected = report.rejected_count,
        "inspect completed"
    );

    Ok(())
}

pub fn inspect_inputs(loaded: &LoadedInputs, mapper: &FieldMapper<'_>) -> InspectReport {
    let mut entries = Vec::with_capacity(loaded.records.len() + loaded.unreadable.len());

    for rejected in &loaded.unreadable {
        entries.push(InspectEntry {
            origin: rejected.origin.clone(),
            index: rejected.index,
            source_id: None,
            schema_version: None,
            pipeline_type: None,
            volume: None,
            fields: Vec::new(),
            legacy_fields: Vec::new(),
            error: Some(rejected.message.clone()),
        });
    }

    for input in &loaded.records {
        let entry = match classify(input, mapper) {
            Ok(mapping) => InspectEntry {
                origin: input.origin.clone(),
                index: input.index,
                schema_version: Some(mapping.record.schema_version),
                pipeline_type: Some(mapping.record.pipeline_type),
                volume: Some(mapping.volume),
                fields: mapping.record.metrics.keys().copied().collect(),
                legacy_fields: mapping
                    .legacy_inputs
                    .iter()
                    .map(|field| field.name().to_string())
                    .collect(),
                source_id: Some(mapping.record.source_id),
                error: None,
            },
            Err(err) => InspectEntry {
                origin: input.origin.clone(),
                index: input.index,
                source_id: input.reported_source_id(),
                schema_version: None,
                pipeline_type: None,
                volume: None,
                fields: Vec::new(),
                legacy_fields: Vec::new(),
                error: Some(err.to_string()),
            },
        };
        entries.push(entry);
    }

    let rejected_count = entries.iter().filter(|entry| entry.error.is_some()).count();
    InspectReport {
        generated_at: now_utc_string(),
        record_count: entries.len(),
        accepted_count: entries.len() - rejected_count,
        rejected_count,
        entries,
    }
}
