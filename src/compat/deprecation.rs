use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fields::LegacyField;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationNotice {
    pub field: String,
    pub replacement: String,
    pub first_source: String,
    pub occurrences: usize,
}

/// Warns once per legacy field name and counts every later occurrence.
#[derive(Debug, Default)]
pub struct DeprecationTracker {
    notices: BTreeMap<LegacyField, DeprecationNotice>,
}

impl DeprecationTracker {
    /// Returns true the first time `field` is seen.
    pub fn record(&mut self, field: LegacyField, source_id: &str) -> bool {
        if let Some(notice) = self.notices.get_mut(&field) {
            notice.occurrences += 1;
            return false;
        }

        warn!(
            field = field.name(),
            replacement = field.replacement().as_str(),
            source_id = %source_id,
            "legacy metric field is deprecated"
        );
        self.notices.insert(
            field,
            DeprecationNotice {
                field: field.name().to_string(),
                replacement: field.replacement().as_str().to_string(),
                first_source: source_id.to_string(),
                occurrences: 1,
            },
        );
        true
    }

    pub fn into_notices(self) -> Vec<DeprecationNotice> {
        self.notices.into_values().collect()
    }
}
