use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use super::fields::PipelineType;

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    sources: BTreeMap<String, String>,
}

/// Source name to pipeline type lookup, supplied by the collectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRegistry {
    sources: BTreeMap<String, PipelineType>,
}

impl SourceRegistry {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PipelineType)>,
        S: AsRef<str>,
    {
        let sources = entries
            .into_iter()
            .map(|(source_id, pipeline_type)| (normalize_source_id(source_id.as_ref()), pipeline_type))
            .collect();
        Self { sources }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file: RegistryFile = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut entries = Vec::with_capacity(file.sources.len());
        for (source_id, pipeline_type) in file.sources {
            let pipeline_type = pipeline_type.parse::<PipelineType>().with_context(|| {
                format!(
                    "invalid pipeline type for source '{source_id}' in {}",
                    path.display()
                )
            })?;
            entries.push((source_id, pipeline_type));
        }

        let registry = Self::from_entries(entries);
        info!(path = %path.display(), sources = registry.len(), "loaded source registry");
        Ok(registry)
    }

    /// A missing registry is not fatal: schema 2.0 records usually carry their own type.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "source registry missing; records without a pipeline type will be rejected");
            Ok(Self::default())
        }
    }

    pub fn lookup(&self, source_id: &str) -> Option<PipelineType> {
        self.sources.get(&normalize_source_id(source_id)).copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

fn normalize_source_id(source_id: &str) -> String {
    source_id.trim().to_ascii_lowercase()
}
