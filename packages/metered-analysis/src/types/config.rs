//! Configuration types for the analysis pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactPolicy;

/// Action key charged for a document analysis.
pub const DEFAULT_ACTION_KEY: &str = "document_analysis";

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cost catalog key charged per attempt.
    pub action_key: String,

    /// Price used when the catalog has no active entry for `action_key`.
    pub fallback_price: i64,

    /// Ledger description for the debit.
    pub charge_description: String,

    /// Extracted text must be longer than this many characters.
    ///
    /// Default: 50.
    pub min_text_chars: usize,

    /// Extracted text longer than this is rejected as too large.
    ///
    /// Bounds remote analysis cost and latency. Default: 100 000.
    pub max_text_chars: usize,

    /// How long a cached result stays reusable. Default: 7 days.
    pub result_freshness: Duration,

    /// How long catalog prices are served without refetching. Default: 5 minutes.
    pub price_ttl: Duration,

    /// Deadline for the remote analysis call. Default: 90 seconds.
    pub remote_timeout: Duration,

    /// Upload validation policy.
    pub artifact_policy: ArtifactPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            action_key: DEFAULT_ACTION_KEY.to_string(),
            fallback_price: 500,
            charge_description: "Document Analysis".to_string(),
            min_text_chars: 50,
            max_text_chars: 100_000,
            result_freshness: Duration::from_secs(7 * 24 * 60 * 60),
            price_ttl: Duration::from_secs(5 * 60),
            remote_timeout: Duration::from_secs(90),
            artifact_policy: ArtifactPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the charged action key and its fallback price.
    pub fn with_action(mut self, action_key: impl Into<String>, fallback_price: i64) -> Self {
        self.action_key = action_key.into();
        self.fallback_price = fallback_price;
        self
    }

    /// Set extraction length bounds.
    pub fn with_text_bounds(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_text_chars = min_chars;
        self.max_text_chars = max_chars;
        self
    }

    /// Set the remote analysis deadline.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Set the result cache freshness window.
    pub fn with_result_freshness(mut self, freshness: Duration) -> Self {
        self.result_freshness = freshness;
        self
    }

    /// Set the catalog price TTL.
    pub fn with_price_ttl(mut self, ttl: Duration) -> Self {
        self.price_ttl = ttl;
        self
    }

    /// Set the upload policy.
    pub fn with_artifact_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.artifact_policy = policy;
        self
    }
}
