//! Result persistence backend for the fingerprint-keyed cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::analysis::{AnalysisResult, CachedResult};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a result. Duplicate fingerprints may coexist.
    async fn insert(
        &self,
        fingerprint: &str,
        result: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Newest result for `fingerprint` created at or after `not_before`.
    async fn query_by_fingerprint(
        &self,
        fingerprint: &str,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<CachedResult>>;
}
