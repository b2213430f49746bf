use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::compat::{RawInput, RecordError, RejectedRecord};
use crate::model::InputFile;
use crate::util::sha256_bytes;

#[derive(Debug, Default)]
pub struct LoadedInputs {
    pub records: Vec<RawInput>,
    pub files: Vec<InputFile>,
    /// Files that were not valid JSON, reported like any other rejected record.
    pub unreadable: Vec<RejectedRecord>,
}

pub fn resolve_input_paths(cache_root: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    if inputs.is_empty() {
        vec![cache_root.join("inputs")]
    } else {
        inputs.to_vec()
    }
}

pub fn load_inputs(paths: &[PathBuf]) -> Result<LoadedInputs> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_json_files(path)?);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("input path does not exist: {}", path.display());
        }
    }

    if files.is_empty() {
        bail!(
            "no metrics inputs found in {}",
            paths
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<String>>()
                .join(", ")
        );
    }

    let mut loaded = LoadedInputs::default();
    for path in files {
        let origin = path.display().to_string();
        let raw = fs::read(&path).with_context(|| format!("failed to read {origin}"))?;
        let sha256 = sha256_bytes(&raw);

        let record_count = match serde_json::from_slice::<Value>(&raw) {
            Ok(document) => {
                let single_record = document.is_object() && !is_source_list(&document);
                let values = split_document(document);
                let count = values.len();
                let fallback_source_id = if single_record {
                    file_stem(&path)
                } else {
                    None
                };
                loaded
                    .records
                    .extend(values.into_iter().enumerate().map(|(index, value)| RawInput {
                        origin: origin.clone(),
                        index,
                        value,
                        fallback_source_id: fallback_source_id.clone(),
                    }));
                count
            }
            Err(err) => {
                warn!(path = %origin, error = %err, "metrics input is not valid JSON");
                let error = RecordError::malformed(format!("invalid JSON: {err}"));
                loaded
                    .unreadable
                    .push(RejectedRecord::new(&origin, 0, None, &error));
                0
            }
        };

        loaded.files.push(InputFile {
            path: origin,
            sha256,
            record_count,
        });
    }

    info!(
        files = loaded.files.len(),
        records = loaded.records.len(),
        unreadable = loaded.unreadable.len(),
        "loaded metrics inputs"
    );

    Ok(loaded)
}

/// A document holds one record, an array of records, or `{"sources": [...]}`.
pub fn split_document(document: Value) -> Vec<Value> {
    match document {
        Value::Array(values) => values,
        Value::Object(mut object) if is_source_list_object(&object) => {
            match object.remove("sources") {
                Some(Value::Array(values)) => values,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

fn is_source_list(document: &Value) -> bool {
    document.as_object().is_some_and(is_source_list_object)
}

fn is_source_list_object(object: &Map<String, Value>) -> bool {
    !object.contains_key("source_id") && object.get("sources").is_some_and(Value::is_array)
}

/// A single-record file is named after its source when the record omits `source_id`.
fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .map(ToOwned::to_owned)
}

fn discover_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
