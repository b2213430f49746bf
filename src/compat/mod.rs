mod aggregate;
mod batch;
mod deprecation;
mod detect;
mod errors;
mod fields;
mod mapper;
mod record;
mod registry;
mod semantics;

pub use aggregate::{AggregateSummary, aggregate, merge_summaries};
pub use batch::{RawInput, RejectedRecord, classify, normalize_batch};
pub use deprecation::DeprecationNotice;
pub use errors::RecordError;
pub use fields::{MetricField, PipelineType, SchemaVersion};
pub use mapper::FieldMapper;
pub use record::MetricsRecord;
pub use registry::SourceRegistry;
pub use semantics::{FieldSemantics, SemanticsTable};
