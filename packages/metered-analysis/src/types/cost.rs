//! Cost catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current credit price of a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Unique operation key, e.g. `document_analysis`.
    pub action_key: String,
    pub cost: i64,
    /// Inactive entries are excluded from lookups.
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl CostEntry {
    pub fn new(action_key: impl Into<String>, cost: i64) -> Self {
        Self {
            action_key: action_key.into(),
            cost,
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
