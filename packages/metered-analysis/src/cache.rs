//! Content-addressed cache of successful analysis results.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::result_store::ResultStore;
use crate::types::analysis::{AnalysisResult, CachedResult};

/// Fingerprint of extracted text for result reuse.
///
/// SHA-256 of the normalized text: lowercased, everything but alphanumerics
/// and whitespace removed, whitespace runs collapsed. Re-exports of the same
/// document with different spacing or punctuation share a fingerprint.
pub fn fingerprint(text: &str) -> String {
    let normalized = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reuses results for identical content within a freshness window.
pub struct ResultCache {
    store: Arc<dyn ResultStore>,
    freshness: chrono::Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn ResultStore>, freshness: Duration) -> Self {
        // Out-of-range windows clamp to a century, i.e. never expire.
        let freshness =
            chrono::Duration::from_std(freshness).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self { store, freshness }
    }

    /// Newest result for `fingerprint` younger than the freshness window.
    pub async fn get(&self, fingerprint: &str) -> StoreResult<Option<CachedResult>> {
        let not_before = Utc::now() - self.freshness;
        let hit = self.store.query_by_fingerprint(fingerprint, not_before).await?;
        debug!(fingerprint = %fingerprint, hit = hit.is_some(), "Result cache lookup");
        Ok(hit)
    }

    /// Record a fresh result. Callers treat failure as non-fatal.
    pub async fn put(&self, fingerprint: &str, result: &AnalysisResult) -> StoreResult<()> {
        self.store.insert(fingerprint, result, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use serde_json::json;

    fn result(score: u8) -> AnalysisResult {
        AnalysisResult::from_payload(json!({
            "matchScore": score,
            "findings": [],
            "sources": [],
        }))
        .unwrap()
    }

    fn cache() -> (ResultCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(store.clone(), Duration::from_secs(7 * 24 * 60 * 60));
        (cache, store)
    }

    #[test]
    fn fingerprint_ignores_case_and_punctuation() {
        assert_eq!(
            fingerprint("Senior Rust Engineer, Berlin!"),
            fingerprint("senior rust engineer berlin")
        );
    }

    #[test]
    fn fingerprint_collapses_whitespace() {
        assert_eq!(
            fingerprint("  Senior   Rust\n\nEngineer\t"),
            fingerprint("Senior Rust Engineer")
        );
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = fingerprint("anything");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_content_different_fingerprint() {
        assert_ne!(fingerprint("Rust engineer"), fingerprint("Go engineer"));
    }

    #[tokio::test]
    async fn six_day_old_result_is_a_hit() {
        let (cache, store) = cache();
        let fp = fingerprint("resume text");
        store
            .insert(&fp, &result(72), Utc::now() - chrono::Duration::days(6))
            .await
            .unwrap();

        let hit = cache.get(&fp).await.unwrap().unwrap();
        assert_eq!(hit.result.match_score, 72);
    }

    #[tokio::test]
    async fn eight_day_old_result_is_a_miss() {
        let (cache, store) = cache();
        let fp = fingerprint("resume text");
        store
            .insert(&fp, &result(72), Utc::now() - chrono::Duration::days(8))
            .await
            .unwrap();

        assert!(cache.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_returns_newest() {
        let (cache, _) = cache();
        let fp = fingerprint("resume text");

        cache.put(&fp, &result(40)).await.unwrap();
        cache.put(&fp, &result(80)).await.unwrap();

        let hit = cache.get(&fp).await.unwrap().unwrap();
        assert_eq!(hit.result.match_score, 80);
    }
}
