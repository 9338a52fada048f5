//! Analysis pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Upload validation
//! - Charging through the credit ledger (atomic spend)
//! - Extraction with fallback strategies
//! - Result reuse by content fingerprint
//! - Remote analysis with a deadline and payload validation
//! - Compensation for every failure after the charge

pub mod compensation;
pub mod orchestrator;

pub use compensation::{ChargeReceipt, CompensationHandler, PostChargeFailure, RefundOutcome};
pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome, Quote};
