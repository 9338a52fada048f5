//! Remote analysis backend.
//!
//! Treated as untrusted and potentially slow or rate limited. The returned
//! payload is raw JSON; the orchestrator validates it before accepting it.

use async_trait::async_trait;

use crate::error::RemoteAnalysisError;
use crate::types::analysis::AnalysisRequest;

#[async_trait]
pub trait RemoteAnalyzer: Send + Sync {
    /// Analyze extracted content, returning the unvalidated payload.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<serde_json::Value, RemoteAnalysisError>;
}
