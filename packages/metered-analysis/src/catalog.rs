//! Action prices with a short-lived in-process cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::traits::catalog::CostBackend;

/// How long a failed refresh keeps serving the previous prices.
const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound on a single cost lookup.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct PriceCache {
    prices: HashMap<String, i64>,
    refresh_at: Option<Instant>,
}

impl PriceCache {
    fn is_fresh(&self) -> bool {
        self.refresh_at.is_some_and(|at| Instant::now() < at)
    }

    fn price(&self, action_key: &str, fallback: i64) -> i64 {
        self.prices.get(action_key).copied().unwrap_or(fallback)
    }
}

/// Resolves the credit price of an action key.
///
/// Every refetch replaces the whole cache with all active prices. When the
/// backend is down or slow the previous prices keep being served (or the
/// caller's fallback if nothing was ever loaded), and the next refetch waits
/// out a short backoff.
pub struct CostCatalog {
    backend: Arc<dyn CostBackend>,
    ttl: Duration,
    cache: RwLock<PriceCache>,
}

impl CostCatalog {
    pub fn new(backend: Arc<dyn CostBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            cache: RwLock::new(PriceCache::default()),
        }
    }

    /// Price for `action_key`, or `fallback` if it has no active entry.
    pub async fn resolve_price(&self, action_key: &str, fallback: i64) -> i64 {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh() {
                return cache.price(action_key, fallback);
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if cache.is_fresh() {
            return cache.price(action_key, fallback);
        }

        let fetched = tokio::time::timeout(FETCH_TIMEOUT, self.backend.list_active_costs()).await;
        match fetched {
            Ok(Ok(entries)) => {
                cache.prices = entries
                    .into_iter()
                    .map(|entry| (entry.action_key, entry.cost))
                    .collect();
                cache.refresh_at = Some(Instant::now() + self.ttl);
                debug!(count = cache.prices.len(), "Refreshed cost catalog");
            }
            Ok(Err(e)) => {
                cache.refresh_at = Some(Instant::now() + self.ttl.min(FAILURE_BACKOFF));
                warn!(
                    action_key = %action_key,
                    error = %e,
                    cached = cache.prices.len(),
                    "Cost lookup failed, serving cached prices"
                );
            }
            Err(_) => {
                cache.refresh_at = Some(Instant::now() + self.ttl.min(FAILURE_BACKOFF));
                warn!(
                    action_key = %action_key,
                    timeout = ?FETCH_TIMEOUT,
                    cached = cache.prices.len(),
                    "Cost lookup timed out, serving cached prices"
                );
            }
        }

        cache.price(action_key, fallback)
    }

    /// Force the next lookup to refetch.
    pub async fn invalidate(&self) {
        self.cache.write().await.refresh_at = None;
    }
}
