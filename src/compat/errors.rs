use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fields::PipelineType;

/// Reasons a single record is left out of a batch. None of these abort the batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("malformed metrics record: {reason}")]
    MalformedRecord { reason: String },
    #[error("source '{source_id}' has no registered pipeline type")]
    UnknownSource { source_id: String },
    #[error("field '{field}' is not valid for {pipeline_type} pipelines (source '{source_id}')")]
    FieldNotAllowed {
        source_id: String,
        field: String,
        pipeline_type: PipelineType,
    },
    #[error("rate '{field}' = {value} for source '{source_id}' is outside [0, 1]")]
    RateOutOfRange {
        source_id: String,
        field: String,
        value: f64,
    },
    #[error("source '{source_id}' already appeared earlier in the batch")]
    DuplicateSource { source_id: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordErrorKind {
    MalformedRecord,
    UnknownSource,
    FieldNotAllowed,
    RateOutOfRange,
    DuplicateSource,
}

impl RecordError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> RecordErrorKind {
        match self {
            Self::MalformedRecord { .. } => RecordErrorKind::MalformedRecord,
            Self::UnknownSource { .. } => RecordErrorKind::UnknownSource,
            Self::FieldNotAllowed { .. } => RecordErrorKind::FieldNotAllowed,
            Self::RateOutOfRange { .. } => RecordErrorKind::RateOutOfRange,
            Self::DuplicateSource { .. } => RecordErrorKind::DuplicateSource,
        }
    }
}
