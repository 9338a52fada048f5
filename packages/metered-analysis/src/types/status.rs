//! Progress events emitted once per stage transition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{analysis::AnalysisResult, attempt::Stage};
use crate::error::ErrorKind;

/// A single stage-transition notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub attempt_id: Uuid,
    pub stage: Stage,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub is_error: bool,
    /// Set on error events when a compensating credit was recorded.
    /// Informational only, never a retry signal.
    #[serde(default)]
    pub refunded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
}

impl StatusEvent {
    /// Progress event for entering a non-terminal stage.
    pub fn stage(attempt_id: Uuid, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            attempt_id,
            stage,
            message: message.into(),
            progress: stage.progress(),
            is_error: false,
            refunded: false,
            error_kind: None,
            result: None,
        }
    }

    /// Terminal success event carrying the result payload.
    pub fn completed(attempt_id: Uuid, result: AnalysisResult) -> Self {
        Self {
            result: Some(result),
            ..Self::stage(attempt_id, Stage::Completed, "Analysis complete")
        }
    }

    /// Terminal failure event.
    pub fn failed(
        attempt_id: Uuid,
        kind: ErrorKind,
        message: impl Into<String>,
        refunded: bool,
    ) -> Self {
        Self {
            attempt_id,
            stage: Stage::Error,
            message: message.into(),
            progress: None,
            is_error: true,
            refunded,
            error_kind: Some(kind),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
