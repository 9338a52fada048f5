//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the analysis pipeline
//! without a database, a PDF parser, or a live analysis service.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{
    CatalogError, LedgerError, LedgerResult, RemoteAnalysisError, StoreError, StoreResult,
    StrategyError,
};
use crate::stores::MemoryStore;
use crate::traits::{
    analyzer::RemoteAnalyzer,
    catalog::CostBackend,
    extractor::Extractor,
    ledger::LedgerBackend,
    parser::{DocumentParser, ParserAssets},
    result_store::ResultStore,
};
use crate::types::{
    analysis::{AnalysisRequest, AnalysisResult, CachedResult},
    artifact::Artifact,
    cost::CostEntry,
    ledger::{LedgerEntry, SpendOutcome, Transaction, Wallet},
};

/// What the mock analyzer does on each call.
#[derive(Debug, Clone)]
enum MockReply {
    Payload(Value),
    QuotaExceeded,
    Unavailable(String),
    Panic,
}

/// A mock remote analyzer.
///
/// Returns a fixed payload (or error) and records every request.
pub struct MockAnalyzer {
    reply: Arc<RwLock<MockReply>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<AnalysisRequest>>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    /// Create a mock returning a well-formed result with `matchScore` 72.
    pub fn new() -> Self {
        Self {
            reply: Arc::new(RwLock::new(MockReply::Payload(json!({
                "matchScore": 72,
                "confidence": 80,
                "summary": "Solid match for the role",
                "findings": ["rust", "distributed systems"],
                "sources": ["upload"],
            })))),
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Return this payload, unvalidated.
    pub fn with_payload(self, payload: Value) -> Self {
        *self.reply.write().unwrap() = MockReply::Payload(payload);
        self
    }

    /// Fail every call with a quota error.
    pub fn with_quota_exceeded(self) -> Self {
        *self.reply.write().unwrap() = MockReply::QuotaExceeded;
        self
    }

    /// Fail every call as unavailable.
    pub fn with_unavailable(self, reason: impl Into<String>) -> Self {
        *self.reply.write().unwrap() = MockReply::Unavailable(reason.into());
        self
    }

    /// Panic inside the call, like a client with a bug.
    pub fn with_panic(self) -> Self {
        *self.reply.write().unwrap() = MockReply::Panic;
        self
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all requests made to this mock.
    pub fn calls(&self) -> Vec<AnalysisRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl RemoteAnalyzer for MockAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, RemoteAnalysisError> {
        self.calls.write().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.reply.read().unwrap().clone();
        match reply {
            MockReply::Payload(payload) => Ok(payload),
            MockReply::QuotaExceeded => Err(RemoteAnalysisError::QuotaExceeded),
            MockReply::Unavailable(reason) => Err(RemoteAnalysisError::Unavailable(reason)),
            MockReply::Panic => panic!("analysis client bug"),
        }
    }
}

/// Extractor that always returns the same text.
pub struct StaticExtractor {
    name: &'static str,
    text: String,
}

impl StaticExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            name: "static",
            text: text.into(),
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(&self, _artifact: &Artifact) -> Result<String, StrategyError> {
        Ok(self.text.clone())
    }
}

/// Extractor that always fails.
pub struct FailingExtractor {
    name: &'static str,
}

impl FailingExtractor {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Extractor for FailingExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(&self, _artifact: &Artifact) -> Result<String, StrategyError> {
        Err(StrategyError::Failed(format!("{} cannot read this document", self.name)))
    }
}

/// Extractor that panics instead of returning.
pub struct PanickingExtractor {
    name: &'static str,
}

impl PanickingExtractor {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Extractor for PanickingExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(&self, _artifact: &Artifact) -> Result<String, StrategyError> {
        panic!("{} hit an unreachable page layout", self.name)
    }
}

/// A mock document parser that records the assets it was given.
#[derive(Default)]
pub struct MockParser {
    text: Option<String>,
    fail_with_assets: bool,
    calls: Arc<RwLock<Vec<Option<ParserAssets>>>>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text returned on success.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Fail full-fidelity runs while degraded runs still succeed.
    pub fn failing_with_assets(mut self) -> Self {
        self.fail_with_assets = true;
        self
    }

    /// Assets passed on each call, in order.
    pub fn calls(&self) -> Vec<Option<ParserAssets>> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DocumentParser for MockParser {
    async fn parse(
        &self,
        _bytes: Bytes,
        assets: Option<ParserAssets>,
    ) -> Result<String, StrategyError> {
        let with_assets = assets.is_some();
        self.calls.write().unwrap().push(assets);

        if with_assets && self.fail_with_assets {
            return Err(StrategyError::Failed("malformed page tree".into()));
        }
        self.text
            .clone()
            .ok_or_else(|| StrategyError::Failed("no text layer".into()))
    }
}

/// A memory store with switchable faults.
///
/// Every backend call is delegated to the wrapped [`MemoryStore`] unless the
/// matching fault is switched on, in which case it fails with a storage
/// error and writes nothing.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_spend: AtomicBool,
    fail_add: AtomicBool,
    fail_costs: AtomicBool,
    fail_results: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for seeding and inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_spend(&self, fail: bool) {
        self.fail_spend.store(fail, Ordering::SeqCst);
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_costs(&self, fail: bool) {
        self.fail_costs.store(fail, Ordering::SeqCst);
    }

    pub fn fail_results(&self, fail: bool) {
        self.fail_results.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerBackend for FaultyStore {
    async fn find_wallet(&self, organization_id: Uuid) -> LedgerResult<Option<Wallet>> {
        self.inner.find_wallet(organization_id).await
    }

    async fn create_wallet(&self, organization_id: Uuid) -> LedgerResult<Wallet> {
        self.inner.create_wallet(organization_id).await
    }

    async fn spend(&self, entry: &LedgerEntry) -> LedgerResult<SpendOutcome> {
        if self.fail_spend.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("ledger unreachable"));
        }
        self.inner.spend(entry).await
    }

    async fn add(&self, entry: &LedgerEntry) -> LedgerResult<Transaction> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("ledger unreachable"));
        }
        self.inner.add(entry).await
    }

    async fn transactions(&self, organization_id: Uuid) -> LedgerResult<Vec<Transaction>> {
        self.inner.transactions(organization_id).await
    }
}

#[async_trait]
impl CostBackend for FaultyStore {
    async fn list_active_costs(&self) -> Result<Vec<CostEntry>, CatalogError> {
        if self.fail_costs.load(Ordering::SeqCst) {
            return Err(CatalogError::Storage("cost table unreachable".into()));
        }
        self.inner.list_active_costs().await
    }
}

#[async_trait]
impl ResultStore for FaultyStore {
    async fn insert(
        &self,
        fingerprint: &str,
        result: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if self.fail_results.load(Ordering::SeqCst) {
            return Err(StoreError::storage("result store unreachable"));
        }
        self.inner.insert(fingerprint, result, created_at).await
    }

    async fn query_by_fingerprint(
        &self,
        fingerprint: &str,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<CachedResult>> {
        if self.fail_results.load(Ordering::SeqCst) {
            return Err(StoreError::storage("result store unreachable"));
        }
        self.inner.query_by_fingerprint(fingerprint, not_before).await
    }
}

/// Plausible resume text long enough to pass extraction bounds.
pub fn sample_text(chars: usize) -> String {
    const SENTENCE: &str = "Senior engineer with eight years building payment systems in Rust. ";
    SENTENCE.chars().cycle().take(chars).collect()
}
