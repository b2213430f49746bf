use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collection method a metrics record was produced by.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineType {
    WebScraping,
    FileProcessing,
    StreamProcessing,
}

const WEB_SCRAPING_FIELDS: &[MetricField] = &[
    MetricField::QualityPassRate,
    MetricField::HttpRequestSuccessRate,
    MetricField::ContentExtractionRate,
    MetricField::DuplicateRate,
];

const FILE_PROCESSING_FIELDS: &[MetricField] = &[
    MetricField::QualityPassRate,
    MetricField::FileDiscoveryRate,
    MetricField::FileExtractionSuccessRate,
    MetricField::ParseSuccessRate,
];

const STREAM_PROCESSING_FIELDS: &[MetricField] = &[
    MetricField::QualityPassRate,
    MetricField::StreamConnectionSuccessRate,
    MetricField::MessageDeliveryRate,
    MetricField::MessageParseSuccessRate,
];

impl PipelineType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebScraping => "web-scraping",
            Self::FileProcessing => "file-processing",
            Self::StreamProcessing => "stream-processing",
        }
    }

    /// Pipeline-specific fields, legacy aliases excluded.
    pub fn valid_fields(self) -> &'static [MetricField] {
        match self {
            Self::WebScraping => WEB_SCRAPING_FIELDS,
            Self::FileProcessing => FILE_PROCESSING_FIELDS,
            Self::StreamProcessing => STREAM_PROCESSING_FIELDS,
        }
    }

    /// Field that backs `legacy_fetch_success_rate` for this pipeline type.
    pub fn primary_field(self) -> MetricField {
        match self {
            Self::WebScraping => MetricField::HttpRequestSuccessRate,
            Self::FileProcessing => MetricField::FileExtractionSuccessRate,
            Self::StreamProcessing => MetricField::StreamConnectionSuccessRate,
        }
    }

    pub fn allows(self, field: MetricField) -> bool {
        field.is_legacy_alias() || self.valid_fields().contains(&field)
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown pipeline type '{0}'")]
pub struct UnknownPipelineType(pub String);

impl FromStr for PipelineType {
    type Err = UnknownPipelineType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "web-scraping" | "scraping" | "web" => Ok(Self::WebScraping),
            "file-processing" | "file" => Ok(Self::FileProcessing),
            "stream-processing" | "stream" => Ok(Self::StreamProcessing),
            _ => Err(UnknownPipelineType(value.to_string())),
        }
    }
}

/// Canonical metric field names, snake_case on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    QualityPassRate,
    HttpRequestSuccessRate,
    ContentExtractionRate,
    DuplicateRate,
    FileDiscoveryRate,
    FileExtractionSuccessRate,
    ParseSuccessRate,
    StreamConnectionSuccessRate,
    MessageDeliveryRate,
    MessageParseSuccessRate,
    LegacyFetchSuccessRate,
}

impl MetricField {
    pub const ALL: [MetricField; 11] = [
        MetricField::QualityPassRate,
        MetricField::HttpRequestSuccessRate,
        MetricField::ContentExtractionRate,
        MetricField::DuplicateRate,
        MetricField::FileDiscoveryRate,
        MetricField::FileExtractionSuccessRate,
        MetricField::ParseSuccessRate,
        MetricField::StreamConnectionSuccessRate,
        MetricField::MessageDeliveryRate,
        MetricField::MessageParseSuccessRate,
        MetricField::LegacyFetchSuccessRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::QualityPassRate => "quality_pass_rate",
            Self::HttpRequestSuccessRate => "http_request_success_rate",
            Self::ContentExtractionRate => "content_extraction_rate",
            Self::DuplicateRate => "duplicate_rate",
            Self::FileDiscoveryRate => "file_discovery_rate",
            Self::FileExtractionSuccessRate => "file_extraction_success_rate",
            Self::ParseSuccessRate => "parse_success_rate",
            Self::StreamConnectionSuccessRate => "stream_connection_success_rate",
            Self::MessageDeliveryRate => "message_delivery_rate",
            Self::MessageParseSuccessRate => "message_parse_success_rate",
            Self::LegacyFetchSuccessRate => "legacy_fetch_success_rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    pub fn is_legacy_alias(self) -> bool {
        matches!(self, Self::LegacyFetchSuccessRate)
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field names from older producers that still map onto canonical fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LegacyField {
    /// Schema 1.0 `success_rate`.
    SuccessRate,
    /// Generic `fetch_success_rate` some 2.0 producers still emit.
    FetchSuccessRate,
}

impl LegacyField {
    pub fn name(self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::FetchSuccessRate => "fetch_success_rate",
        }
    }

    pub fn replacement(self) -> MetricField {
        MetricField::LegacyFetchSuccessRate
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.0")]
    V1,
    #[serde(rename = "2.0")]
    V2,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
