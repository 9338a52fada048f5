//! Credit-Metered Document Analysis
//!
//! Organizations hold a prepaid credit wallet. Each document analysis is
//! priced from a cost catalog, charged atomically before any expensive work,
//! and refunded if anything fails after the charge.
//!
//! # Design Philosophy
//!
//! **"Never lose a credit, never overdraw"**
//!
//! - The ledger backend is the only place a balance is decided
//! - Charge first, then extract and analyze
//! - Every post-charge failure is compensated exactly once
//! - Results are reused by content fingerprint, not by upload
//!
//! # Usage
//!
//! ```rust,ignore
//! use metered_analysis::{AnalysisOrchestrator, Artifact, ExtractionChain, MemoryStore, PipelineConfig};
//! use metered_analysis::testing::MockAnalyzer;
//!
//! let store = Arc::new(MemoryStore::new());
//! let orchestrator = Arc::new(AnalysisOrchestrator::from_store(
//!     store,
//!     ExtractionChain::standard(parser, resolver),
//!     Arc::new(MockAnalyzer::new()),
//!     PipelineConfig::default(),
//! ));
//!
//! let mut events = orchestrator.run_analysis(org_id, Artifact::pdf("cv.pdf", bytes), user_id);
//! while let Some(event) = events.next().await {
//!     println!("{} {:?}", event.stage, event.progress);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Backend abstractions (ledger, costs, results, extraction, analysis)
//! - [`types`] - Wallets, transactions, attempts, status events, config
//! - [`ledger`] - Credit ledger service
//! - [`catalog`] - Cached action prices
//! - [`extractors`] - Extraction chain and strategies
//! - [`analyzers`] - Remote analysis clients
//! - [`cache`] - Fingerprinted result cache
//! - [`status`] - Per-attempt progress stream
//! - [`pipeline`] - Orchestrator and compensation
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Mock implementations for testing

pub mod analyzers;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod extractors;
pub mod ledger;
pub mod pipeline;
pub mod status;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    AnalysisError, CatalogError, ErrorKind, ExtractionError, LedgerError, RefundError,
    RemoteAnalysisError, StoreError, StrategyError,
};
pub use traits::{
    analyzer::RemoteAnalyzer,
    catalog::CostBackend,
    extractor::Extractor,
    ledger::LedgerBackend,
    parser::{AssetResolver, DocumentParser, ParserAssets},
    result_store::ResultStore,
};
pub use types::{
    analysis::{AnalysisRequest, AnalysisResult, CachedResult},
    artifact::{Artifact, ArtifactPolicy},
    attempt::{AnalysisAttempt, Stage},
    config::{PipelineConfig, DEFAULT_ACTION_KEY},
    cost::CostEntry,
    ledger::{Transaction, TransactionKind, Wallet},
    status::StatusEvent,
};

// Re-export services
pub use cache::{fingerprint, ResultCache};
pub use catalog::CostCatalog;
pub use ledger::CreditLedger;
pub use status::{StatusBus, StatusStream};

// Re-export pipeline components
pub use pipeline::{
    AnalysisOrchestrator, AnalysisOutcome, ChargeReceipt, CompensationHandler, PostChargeFailure,
    Quote, RefundOutcome,
};

// Re-export extractors and analyzers
pub use analyzers::HttpAnalyzer;
pub use extractors::{ExtractionChain, ParserExtractor, RawScanExtractor, StaticAssets};

#[cfg(feature = "pdf")]
pub use extractors::LopdfParser;

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Re-export testing utilities
pub use testing::{FaultyStore, MockAnalyzer};
