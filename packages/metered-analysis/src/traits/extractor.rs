//! Content extraction strategy.
//!
//! One capability, many implementations: the extraction chain iterates an
//! ordered list of extractors and stops at the first acceptable output.

use async_trait::async_trait;

use crate::error::StrategyError;
use crate::types::artifact::Artifact;

/// A single strategy for turning an artifact into plain text.
///
/// Implementations receive the full artifact and must not share mutable
/// state with other strategies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short stable name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Extract text from the artifact.
    async fn extract(&self, artifact: &Artifact) -> Result<String, StrategyError>;
}
