//! Structured document parsing.
//!
//! A `DocumentParser` understands the document format (page tree, content
//! streams). It can run with support assets resolved at call time, or
//! without them in a degraded mode.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StrategyError;

/// Support assets handed to a parser for a full-fidelity run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserAssets {
    /// Stop after this many pages. `None` parses the whole document.
    pub max_pages: Option<usize>,
}

#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse the document into plain text.
    ///
    /// With `assets` the parser should do a full-fidelity run and fail
    /// outright on malformed input. Without them it should recover what it
    /// can (skip unreadable pages).
    async fn parse(&self, bytes: Bytes, assets: Option<ParserAssets>)
        -> Result<String, StrategyError>;
}

/// Resolves parser assets at call time.
///
/// Failure makes the with-assets strategy unavailable for this artifact; the
/// chain moves on to the degraded strategy.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self) -> Result<ParserAssets, StrategyError>;
}
