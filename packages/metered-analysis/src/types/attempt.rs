//! Pipeline stages and the per-run attempt record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;
use crate::error::ErrorKind;

/// Stage of an analysis attempt.
///
/// Forward order: validating, charging, extracting, remote_analyzing,
/// persisting, completed. `Error` is reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Charging,
    Extracting,
    RemoteAnalyzing,
    Persisting,
    Completed,
    Error,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Stages after a successful spend; failures here must be compensated.
    pub fn is_post_charge(self) -> bool {
        matches!(self, Self::Extracting | Self::RemoteAnalyzing | Self::Persisting)
    }

    /// Nominal progress percentage reported when entering the stage.
    pub fn progress(self) -> Option<u8> {
        match self {
            Self::Validating => Some(5),
            Self::Charging => Some(15),
            Self::Extracting => Some(30),
            Self::RemoteAnalyzing => Some(60),
            Self::Persisting => Some(90),
            Self::Completed => Some(100),
            Self::Error => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Validating => 0,
            Self::Charging => 1,
            Self::Extracting => 2,
            Self::RemoteAnalyzing => 3,
            Self::Persisting => 4,
            Self::Completed => 5,
            Self::Error => u8::MAX,
        }
    }

    /// Whether `next` is a legal transition from `self`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Error || next.rank() == self.rank() + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Charging => "charging",
            Self::Extracting => "extracting",
            Self::RemoteAnalyzing => "remote_analyzing",
            Self::Persisting => "persisting",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of the pipeline for one artifact. In-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisAttempt {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    /// Set once extraction succeeds.
    pub artifact_fingerprint: Option<String>,
    pub stage: Stage,
    /// Zero until the charge succeeds.
    pub charged_amount: i64,
    /// Idempotency guard for compensation.
    pub refunded: bool,
    pub result: Option<AnalysisResult>,
    pub error: Option<ErrorKind>,
}

impl AnalysisAttempt {
    pub fn new(organization_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            artifact_fingerprint: None,
            stage: Stage::Validating,
            charged_amount: 0,
            refunded: false,
            result: None,
            error: None,
        }
    }

    /// Ledger reference used to correlate this attempt's transactions.
    pub fn reference(&self) -> String {
        attempt_reference(self.id)
    }
}

/// Ledger reference for an attempt id.
pub fn attempt_reference(attempt_id: Uuid) -> String {
    format!("attempt:{attempt_id}")
}
