//! The analysis state machine.
//!
//! validating → charging → extracting → remote_analyzing → persisting →
//! completed, with `error` reachable from every non-terminal stage. Stages
//! run strictly in sequence inside one task per attempt; the ledger's atomic
//! spend is the only serialization point between attempts.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{fingerprint, ResultCache};
use crate::catalog::CostCatalog;
use crate::error::{panic_message, AnalysisError, LedgerResult, RemoteAnalysisError};
use crate::extractors::ExtractionChain;
use crate::ledger::CreditLedger;
use crate::pipeline::compensation::{ChargeReceipt, CompensationHandler, PostChargeFailure};
use crate::status::{StatusBus, StatusStream};
use crate::traits::{
    analyzer::RemoteAnalyzer, catalog::CostBackend, ledger::LedgerBackend,
    result_store::ResultStore,
};
use crate::types::{
    analysis::{AnalysisRequest, AnalysisResult},
    artifact::Artifact,
    attempt::{AnalysisAttempt, Stage},
    config::PipelineConfig,
    status::StatusEvent,
};

/// Terminal success of an attempt.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub attempt: AnalysisAttempt,
    pub result: AnalysisResult,
    /// Debit recorded for this attempt.
    pub charge_id: Uuid,
    /// The result came from the cache instead of the remote backend.
    pub from_cache: bool,
}

/// Price and balance shown in a confirmation step.
///
/// `sufficient` is a hint only. The charge itself can still be rejected if
/// another attempt spends first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub price: i64,
    pub balance: i64,
    pub sufficient: bool,
}

impl Quote {
    /// Price `action_key` and compare it with the organization's balance.
    pub async fn resolve(
        catalog: &CostCatalog,
        ledger: &CreditLedger,
        organization_id: Uuid,
        action_key: &str,
        fallback_price: i64,
    ) -> LedgerResult<Self> {
        let price = catalog.resolve_price(action_key, fallback_price).await;
        let balance = ledger.get_balance(organization_id).await?;
        Ok(Self {
            price,
            balance,
            sufficient: balance >= price,
        })
    }
}

/// What the post-charge stages produced.
struct Analyzed {
    result: AnalysisResult,
    fingerprint: String,
    from_cache: bool,
}

/// Drives analysis attempts through the pipeline.
pub struct AnalysisOrchestrator {
    ledger: CreditLedger,
    catalog: CostCatalog,
    extraction: ExtractionChain,
    analyzer: Arc<dyn RemoteAnalyzer>,
    cache: ResultCache,
    compensation: CompensationHandler,
    config: PipelineConfig,
}

impl AnalysisOrchestrator {
    /// The chain's text bounds are taken from `config`.
    pub fn new(
        ledger: CreditLedger,
        catalog: CostCatalog,
        extraction: ExtractionChain,
        analyzer: Arc<dyn RemoteAnalyzer>,
        cache: ResultCache,
        config: PipelineConfig,
    ) -> Self {
        Self {
            compensation: CompensationHandler::new(ledger.clone()),
            ledger,
            catalog,
            extraction: extraction.with_config(&config),
            analyzer,
            cache,
            config,
        }
    }

    /// Wire every component to one store that backs ledger, costs and results.
    pub fn from_store<S>(
        store: Arc<S>,
        extraction: ExtractionChain,
        analyzer: Arc<dyn RemoteAnalyzer>,
        config: PipelineConfig,
    ) -> Self
    where
        S: LedgerBackend + CostBackend + ResultStore + 'static,
    {
        let ledger = CreditLedger::new(store.clone());
        let catalog = CostCatalog::new(store.clone(), config.price_ttl);
        let cache = ResultCache::new(store, config.result_freshness);
        Self::new(ledger, catalog, extraction, analyzer, cache, config)
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn catalog(&self) -> &CostCatalog {
        &self.catalog
    }

    pub fn compensation(&self) -> &CompensationHandler {
        &self.compensation
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current price and balance for a confirmation prompt.
    pub async fn quote(&self, organization_id: Uuid, action_key: &str) -> LedgerResult<Quote> {
        Quote::resolve(
            &self.catalog,
            &self.ledger,
            organization_id,
            action_key,
            self.config.fallback_price,
        )
        .await
    }

    /// Start an attempt on its own task and return its progress stream.
    pub fn run_analysis(
        self: &Arc<Self>,
        organization_id: Uuid,
        artifact: Artifact,
        user_id: Uuid,
    ) -> StatusStream {
        self.run_analysis_with_cancel(organization_id, artifact, user_id, CancellationToken::new())
    }

    /// Like [`run_analysis`](Self::run_analysis), stopping early when `cancel` fires.
    pub fn run_analysis_with_cancel(
        self: &Arc<Self>,
        organization_id: Uuid,
        artifact: Artifact,
        user_id: Uuid,
        cancel: CancellationToken,
    ) -> StatusStream {
        let (bus, stream) = StatusBus::channel();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            // Outcome is reported on the bus; nothing else to do with it here.
            let _ = this
                .analyze(organization_id, artifact, user_id, &bus, &cancel)
                .await;
        });

        stream
    }

    /// Run one attempt, emitting progress onto `bus`.
    ///
    /// Everything from the charge onward runs on a spawned task. If the
    /// caller drops this future after the charge, the attempt still runs to
    /// completion or refund; only the returned value is lost.
    pub async fn analyze(
        self: &Arc<Self>,
        organization_id: Uuid,
        artifact: Artifact,
        user_id: Uuid,
        bus: &StatusBus,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let mut attempt = AnalysisAttempt::new(organization_id, user_id);
        let attempt_id = attempt.id;
        info!(
            attempt_id = %attempt_id,
            organization_id = %organization_id,
            file = %artifact.file_name,
            bytes = artifact.len(),
            "Analysis attempt started"
        );

        self.advance(&mut attempt, Stage::Validating, "Validating upload", bus);
        if let Err(reason) = self.config.artifact_policy.check(&artifact) {
            return Err(self.fail(&mut attempt, AnalysisError::Validation(reason), bus));
        }
        if cancel.is_cancelled() {
            return Err(self.fail(&mut attempt, AnalysisError::Cancelled { refunded: false }, bus));
        }

        self.advance(&mut attempt, Stage::Charging, "Charging credits", bus);
        let price = self
            .catalog
            .resolve_price(&self.config.action_key, self.config.fallback_price)
            .await;

        let this = Arc::clone(self);
        let (bus, cancel) = (bus.clone(), cancel.clone());
        let charged = tokio::spawn(async move {
            this.charge_and_settle(attempt, artifact, price, &bus, &cancel)
                .await
        });

        match charged.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(
                    target: "billing.reconciliation",
                    attempt_id = %attempt_id,
                    amount = price,
                    error = %e,
                    "Charged attempt aborted before settling, manual reconciliation required"
                );
                Err(AnalysisError::Cancelled { refunded: false })
            }
        }
    }

    /// Charge, then either complete the attempt or compensate it.
    async fn charge_and_settle(
        &self,
        mut attempt: AnalysisAttempt,
        artifact: Artifact,
        price: i64,
        bus: &StatusBus,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if cancel.is_cancelled() {
            return Err(self.fail(&mut attempt, AnalysisError::Cancelled { refunded: false }, bus));
        }

        let (organization_id, user_id) = (attempt.organization_id, attempt.user_id);
        let charge = match self
            .ledger
            .spend_with_reference(
                organization_id,
                price,
                &self.config.charge_description,
                user_id,
                Some(attempt.reference()),
            )
            .await
        {
            Ok(transaction) => transaction,
            Err(e) => return Err(self.fail(&mut attempt, e.into(), bus)),
        };
        attempt.charged_amount = price;
        let receipt = ChargeReceipt::new(attempt.id, organization_id, user_id, price, charge.id);
        info!(attempt_id = %attempt.id, amount = price, charge_id = %charge.id, "Attempt charged");

        let charged = AssertUnwindSafe(self.analyze_charged(&mut attempt, &artifact, bus, cancel))
            .catch_unwind()
            .await;
        let failure = match charged {
            Ok(Ok(analyzed)) => return Ok(self.complete(attempt, analyzed, charge.id, bus).await),
            Ok(Err(failure)) => failure,
            Err(panic) => PostChargeFailure::from(RemoteAnalysisError::Unavailable(format!(
                "internal failure while {}: {}",
                attempt.stage,
                panic_message(&*panic)
            ))),
        };

        let err = self.compensation.compensate(receipt, failure).await;
        attempt.refunded = err.refunded();
        Err(self.fail(&mut attempt, err, bus))
    }

    /// Persist (best effort) and emit the terminal success event.
    async fn complete(
        &self,
        mut attempt: AnalysisAttempt,
        analyzed: Analyzed,
        charge_id: Uuid,
        bus: &StatusBus,
    ) -> AnalysisOutcome {
        self.advance(&mut attempt, Stage::Persisting, "Saving results", bus);
        if !analyzed.from_cache {
            if let Err(e) = self.cache.put(&analyzed.fingerprint, &analyzed.result).await {
                warn!(
                    attempt_id = %attempt.id,
                    fingerprint = %analyzed.fingerprint,
                    error = %e,
                    "PersistenceWarning: analysis result not cached"
                );
            }
        }

        attempt.stage = Stage::Completed;
        attempt.result = Some(analyzed.result.clone());
        bus.emit(StatusEvent::completed(attempt.id, analyzed.result.clone()));
        info!(
            attempt_id = %attempt.id,
            match_score = analyzed.result.match_score,
            from_cache = analyzed.from_cache,
            "Analysis completed"
        );

        AnalysisOutcome {
            attempt,
            result: analyzed.result,
            charge_id,
            from_cache: analyzed.from_cache,
        }
    }

    /// Extraction and remote analysis. Every error here is post-charge.
    async fn analyze_charged(
        &self,
        attempt: &mut AnalysisAttempt,
        artifact: &Artifact,
        bus: &StatusBus,
        cancel: &CancellationToken,
    ) -> Result<Analyzed, PostChargeFailure> {
        self.advance(attempt, Stage::Extracting, "Extracting document text", bus);
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PostChargeFailure::Cancelled),
            text = self.extraction.extract(artifact) => text?,
        };
        let fingerprint = fingerprint(&text);
        attempt.artifact_fingerprint = Some(fingerprint.clone());

        match self.cache.get(&fingerprint).await {
            Ok(Some(cached)) => {
                self.advance(attempt, Stage::RemoteAnalyzing, "Reusing recent analysis", bus);
                debug!(attempt_id = %attempt.id, cached_at = %cached.created_at, "Result cache hit");
                return Ok(Analyzed {
                    result: cached.result,
                    fingerprint,
                    from_cache: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(attempt_id = %attempt.id, error = %e, "Result cache lookup failed, analyzing");
            }
        }

        self.advance(attempt, Stage::RemoteAnalyzing, "Analyzing document", bus);
        let request = AnalysisRequest::new(text)
            .with_metadata("attemptId", attempt.id.to_string())
            .with_metadata("organizationId", attempt.organization_id.to_string())
            .with_metadata("fileName", artifact.file_name.clone());

        let deadline = self.config.remote_timeout;
        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PostChargeFailure::Cancelled),
            reply = tokio::time::timeout(deadline, self.analyzer.analyze(&request)) => {
                reply.map_err(|_| RemoteAnalysisError::Timeout(deadline))??
            }
        };
        let result = AnalysisResult::from_payload(payload)?;

        Ok(Analyzed {
            result,
            fingerprint,
            from_cache: false,
        })
    }

    fn advance(&self, attempt: &mut AnalysisAttempt, next: Stage, message: &str, bus: &StatusBus) {
        // Validating is the entry stage and is "advanced to" from itself.
        debug_assert!(
            attempt.stage == next || attempt.stage.can_advance_to(next),
            "illegal transition {} -> {}",
            attempt.stage,
            next
        );
        attempt.stage = next;
        debug!(attempt_id = %attempt.id, stage = %next, "Stage entered");
        bus.emit(StatusEvent::stage(attempt.id, next, message));
    }

    fn fail(&self, attempt: &mut AnalysisAttempt, err: AnalysisError, bus: &StatusBus) -> AnalysisError {
        let kind = err.kind();
        warn!(
            attempt_id = %attempt.id,
            stage = %attempt.stage,
            kind = ?kind,
            refunded = err.refunded(),
            error = %err,
            "Analysis attempt failed"
        );
        attempt.stage = Stage::Error;
        attempt.error = Some(kind);
        bus.emit(StatusEvent::failed(attempt.id, kind, err.user_message(), err.refunded()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{sample_text, MockAnalyzer, StaticExtractor};
    use crate::types::cost::CostEntry;
    use futures::StreamExt;
    use std::time::Duration;

    fn orchestrator(store: Arc<MemoryStore>, analyzer: Arc<MockAnalyzer>) -> Arc<AnalysisOrchestrator> {
        let extraction = ExtractionChain::new(vec![Box::new(StaticExtractor::new(sample_text(2_000)))]);
        Arc::new(AnalysisOrchestrator::from_store(
            store,
            extraction,
            analyzer,
            PipelineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn stream_reports_every_stage_in_order() {
        let store = Arc::new(MemoryStore::new());
        store.set_cost(CostEntry::new("document_analysis", 500));
        let orchestrator = orchestrator(store, Arc::new(MockAnalyzer::new()));
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        orchestrator.ledger().add(org, 1000, "Top-up", user).await.unwrap();

        let events: Vec<StatusEvent> = orchestrator
            .run_analysis(org, Artifact::pdf("cv.pdf", "%PDF-1.7"), user)
            .collect()
            .await;

        let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Validating,
                Stage::Charging,
                Stage::Extracting,
                Stage::RemoteAnalyzing,
                Stage::Persisting,
                Stage::Completed,
            ]
        );
        let progress: Vec<Option<u8>> = events.iter().map(|e| e.progress).collect();
        assert_eq!(
            progress,
            vec![Some(5), Some(15), Some(30), Some(60), Some(90), Some(100)]
        );
        assert_eq!(events.last().unwrap().result.as_ref().unwrap().match_score, 72);
    }

    #[tokio::test]
    async fn quote_reports_price_and_hint() {
        let store = Arc::new(MemoryStore::new());
        store.set_cost(CostEntry::new("document_analysis", 500));
        let orchestrator = orchestrator(store, Arc::new(MockAnalyzer::new()));
        let org = Uuid::new_v4();
        orchestrator.ledger().add(org, 400, "Top-up", Uuid::new_v4()).await.unwrap();

        let quote = orchestrator.quote(org, "document_analysis").await.unwrap();

        assert_eq!(
            quote,
            Quote {
                price: 500,
                balance: 400,
                sufficient: false
            }
        );
    }

    #[tokio::test]
    async fn quote_resolves_without_an_orchestrator() {
        let store = Arc::new(MemoryStore::new());
        store.set_cost(CostEntry::new("export", 50));
        let catalog = CostCatalog::new(store.clone(), Duration::from_secs(60));
        let ledger = CreditLedger::new(store);
        let org = Uuid::new_v4();
        ledger.add(org, 75, "Top-up", Uuid::new_v4()).await.unwrap();

        let quote = Quote::resolve(&catalog, &ledger, org, "export", 500).await.unwrap();

        assert_eq!(quote.price, 50);
        assert!(quote.sufficient);
    }

    #[tokio::test]
    async fn text_bounds_come_from_pipeline_config() {
        let store = Arc::new(MemoryStore::new());
        store.set_cost(CostEntry::new("document_analysis", 500));
        let analyzer = Arc::new(MockAnalyzer::new());
        // Chain built with default bounds; the config narrows the ceiling.
        let extraction = ExtractionChain::new(vec![Box::new(StaticExtractor::new(sample_text(2_000)))]);
        let orchestrator = Arc::new(AnalysisOrchestrator::from_store(
            store,
            extraction,
            analyzer.clone(),
            PipelineConfig::default().with_text_bounds(50, 1_000),
        ));
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        orchestrator.ledger().add(org, 1000, "Top-up", user).await.unwrap();

        let (bus, _stream) = StatusBus::channel();
        let err = orchestrator
            .analyze(org, Artifact::pdf("cv.pdf", "%PDF-1.7"), user, &bus, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Extraction {
                source: crate::error::ExtractionError::TooLarge { limit: 1_000, .. },
                refunded: true,
            }
        ));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_charge_touches_nothing() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = Arc::new(MockAnalyzer::new());
        let orchestrator = orchestrator(store, analyzer.clone());
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        orchestrator.ledger().add(org, 1000, "Top-up", user).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (bus, _stream) = StatusBus::channel();
        let err = orchestrator
            .analyze(org, Artifact::pdf("cv.pdf", "%PDF-1.7"), user, &bus, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Cancelled { refunded: false }));
        assert_eq!(orchestrator.ledger().transactions(org).await.unwrap().len(), 1);
        assert_eq!(analyzer.call_count(), 0);
    }
}
