//! Refunds for failures that happen after a successful charge.
//!
//! A [`PostChargeFailure`] can only become an [`AnalysisError`] through
//! [`CompensationHandler::compensate`], which consumes the attempt's
//! [`ChargeReceipt`]. There is no other conversion, so a post-charge error
//! cannot reach the caller without the refund having been attempted.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AnalysisError, ExtractionError, RefundError, RemoteAnalysisError};
use crate::ledger::CreditLedger;
use crate::types::attempt::attempt_reference;
use crate::types::ledger::Transaction;

/// Proof that an attempt was charged. Not `Clone`: one receipt, one
/// compensation.
#[derive(Debug)]
#[must_use = "a charged attempt must either complete or be compensated"]
pub struct ChargeReceipt {
    attempt_id: Uuid,
    organization_id: Uuid,
    user_id: Uuid,
    amount: i64,
    transaction_id: Uuid,
}

impl ChargeReceipt {
    pub(crate) fn new(
        attempt_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        amount: i64,
        transaction_id: Uuid,
    ) -> Self {
        Self {
            attempt_id,
            organization_id,
            user_id,
            amount,
            transaction_id,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }
}

/// A failure after the charge went through.
#[derive(Debug, Error)]
pub enum PostChargeFailure {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("remote analysis failed: {0}")]
    Remote(#[from] RemoteAnalysisError),

    #[error("cancelled after charge")]
    Cancelled,
}

impl PostChargeFailure {
    /// Refund reason recorded in the ledger description.
    fn reason(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "Extraction Failed",
            Self::Remote(_) => "Analysis Failed",
            Self::Cancelled => "Analysis Cancelled",
        }
    }

    fn into_error(self, refunded: bool) -> AnalysisError {
        match self {
            Self::Extraction(source) => AnalysisError::Extraction { source, refunded },
            Self::Remote(source) => AnalysisError::RemoteAnalysis { source, refunded },
            Self::Cancelled => AnalysisError::Cancelled { refunded },
        }
    }
}

/// Result of a refund request.
#[derive(Debug, Clone)]
pub enum RefundOutcome {
    /// The compensating credit was recorded by this call.
    Refunded(Transaction),

    /// This attempt was already refunded (or a refund is in flight).
    AlreadyRefunded,
}

/// How long a recorded refund is remembered in-process. Older duplicates
/// are absorbed by the backend's reference dedupe instead.
const REFUNDED_RETENTION: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefundState {
    InFlight,
    Refunded(Instant),
    Failed,
}

/// Issues at most one compensating credit per attempt.
///
/// The in-process guard catches duplicate triggers within this process; the
/// credit reference `attempt:<id>` makes the backend reject a second credit
/// even across processes. Refunded entries are evicted after
/// `REFUNDED_RETENTION`; failed ones stay until the process exits.
pub struct CompensationHandler {
    ledger: CreditLedger,
    states: DashMap<Uuid, RefundState>,
}

impl CompensationHandler {
    pub fn new(ledger: CreditLedger) -> Self {
        Self {
            ledger,
            states: DashMap::new(),
        }
    }

    /// Credit `amount` back to the organization for `attempt_id`.
    ///
    /// Never retried automatically. A failed refund stays failed for this
    /// process and is surfaced on the `billing.reconciliation` log target.
    pub async fn refund(
        &self,
        organization_id: Uuid,
        amount: i64,
        reason: &str,
        attempt_id: Uuid,
        user_id: Uuid,
    ) -> Result<RefundOutcome, RefundError> {
        self.evict_settled();

        match self.states.entry(attempt_id) {
            Entry::Occupied(entry) => {
                return match *entry.get() {
                    RefundState::InFlight | RefundState::Refunded(_) => {
                        warn!(attempt_id = %attempt_id, "Duplicate refund request ignored");
                        Ok(RefundOutcome::AlreadyRefunded)
                    }
                    RefundState::Failed => Err(RefundError::PreviouslyFailed(attempt_id)),
                };
            }
            Entry::Vacant(entry) => {
                entry.insert(RefundState::InFlight);
            }
        }

        let description = format!("Refund - {reason}");
        let result = self
            .ledger
            .add_with_reference(
                organization_id,
                amount,
                &description,
                user_id,
                Some(attempt_reference(attempt_id)),
            )
            .await;

        match result {
            Ok(transaction) => {
                self.states
                    .insert(attempt_id, RefundState::Refunded(Instant::now()));
                info!(
                    attempt_id = %attempt_id,
                    organization_id = %organization_id,
                    amount,
                    transaction_id = %transaction.id,
                    "Refund recorded"
                );
                Ok(RefundOutcome::Refunded(transaction))
            }
            Err(source) => {
                self.states.insert(attempt_id, RefundState::Failed);
                error!(
                    target: "billing.reconciliation",
                    attempt_id = %attempt_id,
                    organization_id = %organization_id,
                    amount,
                    reason,
                    error = %source,
                    "RefundFailed: compensating credit not recorded, manual reconciliation required"
                );
                Err(RefundError::Failed {
                    attempt_id,
                    amount,
                    source,
                })
            }
        }
    }

    /// Refund a charged attempt and turn the failure into its terminal error.
    pub async fn compensate(
        &self,
        receipt: ChargeReceipt,
        failure: PostChargeFailure,
    ) -> AnalysisError {
        warn!(
            attempt_id = %receipt.attempt_id,
            charge_id = %receipt.transaction_id,
            error = %failure,
            "Post-charge failure, refunding"
        );

        match self
            .refund(
                receipt.organization_id,
                receipt.amount,
                failure.reason(),
                receipt.attempt_id,
                receipt.user_id,
            )
            .await
        {
            Ok(_) => failure.into_error(true),
            Err(source) => AnalysisError::RefundFailed {
                cause: failure.to_string(),
                source,
            },
        }
    }

    /// Whether this process recorded a refund for the attempt recently.
    pub fn is_refunded(&self, attempt_id: Uuid) -> bool {
        self.states
            .get(&attempt_id)
            .is_some_and(|s| matches!(*s, RefundState::Refunded(_)))
    }

    /// Number of attempts currently held by the in-process guard.
    pub fn tracked_attempts(&self) -> usize {
        self.states.len()
    }

    fn evict_settled(&self) {
        self.states.retain(|_, state| match state {
            RefundState::Refunded(at) => at.elapsed() < REFUNDED_RETENTION,
            RefundState::InFlight | RefundState::Failed => true,
        });
    }
}
