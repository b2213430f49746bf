use serde_json::{Map, Value};
use tracing::debug;

use super::errors::RecordError;
use super::fields::SchemaVersion;

pub const PIPELINE_METRICS_KEY: &str = "pipeline_metrics";
pub const METRIC_SEMANTICS_KEY: &str = "_metric_semantics";

/// Flat schema 1.0 record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawV1 {
    pub source_id: String,
    pub volume: u64,
    pub success_rate: f64,
    pub quality_pass_rate: Option<f64>,
}

/// Pipeline-typed schema 2.0 record. Metric values are still unvalidated here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawV2 {
    pub source_id: String,
    pub volume: u64,
    pub pipeline_type: Option<String>,
    pub pipeline_metrics: Map<String, Value>,
    pub semantics: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectedRecord {
    V1(RawV1),
    V2(RawV2),
}

impl DetectedRecord {
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            Self::V1(_) => SchemaVersion::V1,
            Self::V2(_) => SchemaVersion::V2,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::V1(raw) => &raw.source_id,
            Self::V2(raw) => &raw.source_id,
        }
    }

    pub fn volume(&self) -> u64 {
        match self {
            Self::V1(raw) => raw.volume,
            Self::V2(raw) => raw.volume,
        }
    }
}

/// `fallback_source_id` identifies records that do not name their source,
/// e.g. a single-record file named after the source.
pub fn detect_schema(
    value: &Value,
    fallback_source_id: Option<&str>,
) -> Result<DetectedRecord, RecordError> {
    let object = value
        .as_object()
        .ok_or_else(|| RecordError::malformed("record is not a JSON object"))?;

    let declared = declared_schema_version(object)?;
    let source_id = read_source_id(object, fallback_source_id)?;
    let volume = read_volume(object)?;

    let detected = if let Some(pipeline_metrics) = object.get(PIPELINE_METRICS_KEY) {
        let metrics = pipeline_metrics.as_object().ok_or_else(|| {
            RecordError::malformed(format!("'{PIPELINE_METRICS_KEY}' must be an object"))
        })?;
        detect_v2(object, metrics, source_id, volume)?
    } else if let Some(success_rate) = object.get("success_rate") {
        let success_rate = success_rate
            .as_f64()
            .ok_or_else(|| RecordError::malformed("'success_rate' must be a number"))?;
        let quality_pass_rate = match object.get("quality_pass_rate") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_f64().ok_or_else(|| {
                RecordError::malformed("'quality_pass_rate' must be a number")
            })?),
        };
        DetectedRecord::V1(RawV1 {
            source_id,
            volume,
            success_rate,
            quality_pass_rate,
        })
    } else {
        return Err(RecordError::malformed(format!(
            "record has neither '{PIPELINE_METRICS_KEY}' nor 'success_rate'"
        )));
    };

    if let Some(declared) = declared.filter(|version| *version != detected.schema_version()) {
        return Err(RecordError::malformed(format!(
            "declared schema_version {declared} does not match detected shape {}",
            detected.schema_version()
        )));
    }

    Ok(detected)
}

fn detect_v2(
    object: &Map<String, Value>,
    metrics: &Map<String, Value>,
    source_id: String,
    volume: u64,
) -> Result<DetectedRecord, RecordError> {
    let pipeline_type = match object.get("pipeline_type") {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => return Err(RecordError::malformed("'pipeline_type' must be a string")),
    };

    let mut semantics = Map::new();
    if let Some(value) = object.get(METRIC_SEMANTICS_KEY) {
        collect_semantics(&source_id, value, &mut semantics);
    }

    let mut pipeline_metrics = Map::new();
    for (key, value) in metrics {
        if key == METRIC_SEMANTICS_KEY {
            collect_semantics(&source_id, value, &mut semantics);
        } else if key.starts_with('_') {
            debug!(source_id = %source_id, key = %key, "ignoring metadata key in pipeline_metrics");
        } else {
            pipeline_metrics.insert(key.clone(), value.clone());
        }
    }

    Ok(DetectedRecord::V2(RawV2 {
        source_id,
        volume,
        pipeline_type,
        pipeline_metrics,
        semantics,
    }))
}

fn collect_semantics(source_id: &str, value: &Value, into: &mut Map<String, Value>) {
    match value.as_object() {
        Some(entries) => {
            for (key, value) in entries {
                into.insert(key.clone(), value.clone());
            }
        }
        None => debug!(source_id = %source_id, "ignoring non-object _metric_semantics"),
    }
}

fn declared_schema_version(object: &Map<String, Value>) -> Result<Option<SchemaVersion>, RecordError> {
    let Some(value) = object.get("schema_version") else {
        return Ok(None);
    };

    let version = match value {
        Value::Null => return Ok(None),
        Value::String(text) => match text.trim() {
            "1" | "1.0" => SchemaVersion::V1,
            "2" | "2.0" => SchemaVersion::V2,
            other => {
                return Err(RecordError::malformed(format!(
                    "unsupported schema_version '{other}'"
                )));
            }
        },
        Value::Number(number) => match number.as_f64() {
            Some(v) if v == 1.0 => SchemaVersion::V1,
            Some(v) if v == 2.0 => SchemaVersion::V2,
            _ => {
                return Err(RecordError::malformed(format!(
                    "unsupported schema_version {number}"
                )));
            }
        },
        _ => return Err(RecordError::malformed("'schema_version' must be a string or number")),
    };

    Ok(Some(version))
}

fn read_source_id(
    object: &Map<String, Value>,
    fallback: Option<&str>,
) -> Result<String, RecordError> {
    let source_id = match object.get("source_id") {
        None | Some(Value::Null) => fallback.map(str::trim).unwrap_or_default(),
        Some(value) => value.as_str().map(str::trim).unwrap_or_default(),
    };

    if source_id.is_empty() {
        return Err(RecordError::malformed("missing or empty 'source_id'"));
    }

    Ok(source_id.to_string())
}

fn read_volume(object: &Map<String, Value>) -> Result<u64, RecordError> {
    match object.get("volume") {
        None | Some(Value::Null) => Ok(0),
        Some(value) => {
            if let Some(volume) = value.as_u64() {
                return Ok(volume);
            }
            match value.as_f64() {
                Some(v) if v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 => Ok(v as u64),
                _ => Err(RecordError::malformed(
                    "'volume' must be a non-negative integer",
                )),
            }
        }
    }
}
