//! Typed errors for the metered analysis pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Each layer has its own enum;
//! [`AnalysisError`] is the terminal taxonomy reported to callers.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the credit ledger and its backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Balance is lower than the requested debit.
    #[error("insufficient credit: balance {balance}, required {required}")]
    InsufficientCredit { balance: i64, required: i64 },

    /// Amount must be a positive integer.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Backend failure (connection, lost create race, constraint violation).
    #[error("ledger storage error: {0}")]
    Storage(#[source] BoxError),
}

impl LedgerError {
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }
}

/// Errors from the cost lookup backend.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cost lookup failed: {0}")]
    Storage(#[source] BoxError),
}

/// Errors from result persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl StoreError {
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }
}

/// Failure of a single extraction strategy. Never fatal to the chain.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Strategy cannot run at all (library missing, assets unresolvable).
    #[error("strategy unavailable: {0}")]
    Unavailable(String),

    /// Strategy ran and failed on this artifact.
    #[error("strategy failed: {0}")]
    Failed(String),
}

/// Outcome of one strategy inside a failed chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub outcome: String,
}

/// Errors from the extraction chain.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Every strategy failed or produced too little text.
    #[error("document could not be read ({} strategies tried)", attempts.len())]
    Unreadable { attempts: Vec<StrategyAttempt> },

    /// Extracted text exceeds the analysis size ceiling.
    #[error("document too large: {chars} characters (limit {limit})")]
    TooLarge { chars: usize, limit: usize },
}

/// Errors from the remote analysis backend.
#[derive(Debug, Error)]
pub enum RemoteAnalysisError {
    #[error("analysis quota exceeded")]
    QuotaExceeded,

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("analysis service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from issuing a compensating credit.
#[derive(Debug, Error)]
pub enum RefundError {
    /// The ledger rejected or never received the credit.
    #[error("refund of {amount} for attempt {attempt_id} failed: {source}")]
    Failed {
        attempt_id: Uuid,
        amount: i64,
        #[source]
        source: LedgerError,
    },

    /// An earlier refund for this attempt failed; it needs manual reconciliation.
    #[error("refund for attempt {0} previously failed and will not be retried")]
    PreviouslyFailed(Uuid),
}

/// Machine-readable kind of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InsufficientCredit,
    Storage,
    ExtractionFailed,
    QuotaExceeded,
    RemoteTimeout,
    MalformedResponse,
    RemoteUnavailable,
    RefundFailed,
    Cancelled,
}

impl ErrorKind {
    /// True for every remote-analysis sub-kind.
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded | Self::RemoteTimeout | Self::MalformedResponse | Self::RemoteUnavailable
        )
    }
}

/// Terminal failure of an analysis attempt.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Bad input, rejected before charging.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough credit, rejected by the atomic spend.
    #[error("insufficient credit: balance {balance}, required {required}")]
    InsufficientCredit { balance: i64, required: i64 },

    /// Ledger unavailable while charging. Nothing was charged.
    #[error("ledger error: {0}")]
    Ledger(#[source] LedgerError),

    /// Extraction failed after charging; `refunded` is always true here.
    #[error("extraction failed: {source}")]
    Extraction {
        #[source]
        source: ExtractionError,
        refunded: bool,
    },

    /// Remote analysis failed after charging; `refunded` is always true here.
    #[error("remote analysis failed: {source}")]
    RemoteAnalysis {
        #[source]
        source: RemoteAnalysisError,
        refunded: bool,
    },

    /// The compensating credit could not be recorded. Needs manual reconciliation.
    #[error("refund failed after {cause}: {source}")]
    RefundFailed {
        cause: String,
        #[source]
        source: RefundError,
    },

    /// Attempt cancelled by the caller.
    #[error("analysis cancelled")]
    Cancelled { refunded: bool },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            Self::Ledger(_) => ErrorKind::Storage,
            Self::Extraction { .. } => ErrorKind::ExtractionFailed,
            Self::RemoteAnalysis { source, .. } => match source {
                RemoteAnalysisError::QuotaExceeded => ErrorKind::QuotaExceeded,
                RemoteAnalysisError::Timeout(_) => ErrorKind::RemoteTimeout,
                RemoteAnalysisError::MalformedResponse(_) => ErrorKind::MalformedResponse,
                RemoteAnalysisError::Unavailable(_) => ErrorKind::RemoteUnavailable,
            },
            Self::RefundFailed { .. } => ErrorKind::RefundFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a compensating credit was recorded for this failure.
    pub fn refunded(&self) -> bool {
        match self {
            Self::Extraction { refunded, .. }
            | Self::RemoteAnalysis { refunded, .. }
            | Self::Cancelled { refunded } => *refunded,
            _ => false,
        }
    }

    /// Human-readable message whose wording maps to the caller's remediation:
    /// re-upload, retry later, or top up.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => format!("The uploaded file was rejected: {reason}"),
            Self::InsufficientCredit { balance, required } => format!(
                "Insufficient credit: this analysis costs {required} credits and your balance is {balance}. Please top up."
            ),
            Self::Ledger(_) => {
                "Your credit balance could not be checked right now. You have not been charged; please try again later.".to_string()
            }
            Self::Extraction { source, .. } => match source {
                ExtractionError::TooLarge { .. } => {
                    "Your document is too large to analyze. Your credits have been refunded; please upload a shorter document.".to_string()
                }
                ExtractionError::Unreadable { .. } => {
                    "Your document could not be read. Your credits have been refunded; please re-upload a text-based document.".to_string()
                }
            },
            Self::RemoteAnalysis { .. } => {
                "The analysis service is unavailable. Your credits have been refunded; please try again later.".to_string()
            }
            Self::RefundFailed { .. } => {
                "The analysis failed and the automatic refund could not be completed. Support has been notified and will restore your credits.".to_string()
            }
            Self::Cancelled { refunded: true } => {
                "The analysis was cancelled. Your credits have been refunded.".to_string()
            }
            Self::Cancelled { refunded: false } => "The analysis was cancelled.".to_string(),
        }
    }
}

impl From<LedgerError> for AnalysisError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredit { balance, required } => {
                Self::InsufficientCredit { balance, required }
            }
            other => Self::Ledger(other),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Result type alias for persistence operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_sub_kinds_map_to_distinct_kinds() {
        let err = AnalysisError::RemoteAnalysis {
            source: RemoteAnalysisError::Timeout(Duration::from_secs(30)),
            refunded: true,
        };
        assert_eq!(err.kind(), ErrorKind::RemoteTimeout);
        assert!(err.kind().is_remote());
        assert!(err.refunded());
    }

    #[test]
    fn ledger_insufficient_credit_is_lifted() {
        let err: AnalysisError = LedgerError::InsufficientCredit {
            balance: 100,
            required: 500,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientCredit);
        assert!(!err.refunded());
    }

    #[test]
    fn user_messages_distinguish_remediations() {
        let unreadable = AnalysisError::Extraction {
            source: ExtractionError::Unreadable { attempts: vec![] },
            refunded: true,
        };
        let remote = AnalysisError::RemoteAnalysis {
            source: RemoteAnalysisError::QuotaExceeded,
            refunded: true,
        };
        let credit = AnalysisError::InsufficientCredit {
            balance: 1,
            required: 2,
        };

        assert!(unreadable.user_message().contains("could not be read"));
        assert!(remote.user_message().contains("unavailable"));
        assert!(credit.user_message().contains("top up"));
    }
}
