//! Parser-backed extraction strategies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StrategyError;
use crate::traits::extractor::Extractor;
use crate::traits::parser::{AssetResolver, DocumentParser, ParserAssets};
use crate::types::artifact::Artifact;

/// Runs a [`DocumentParser`] either with resolved assets or degraded.
pub struct ParserExtractor {
    parser: Arc<dyn DocumentParser>,
    resolver: Option<Arc<dyn AssetResolver>>,
}

impl ParserExtractor {
    /// Full-fidelity strategy. Assets are resolved on every call.
    pub fn with_assets(parser: Arc<dyn DocumentParser>, resolver: Arc<dyn AssetResolver>) -> Self {
        Self {
            parser,
            resolver: Some(resolver),
        }
    }

    /// Same parser without support assets.
    pub fn degraded(parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            parser,
            resolver: None,
        }
    }
}

#[async_trait]
impl Extractor for ParserExtractor {
    fn name(&self) -> &'static str {
        if self.resolver.is_some() {
            "parser_with_assets"
        } else {
            "parser_degraded"
        }
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StrategyError> {
        let assets = match &self.resolver {
            Some(resolver) => {
                let assets = resolver.resolve().await.map_err(|e| match e {
                    StrategyError::Unavailable(msg) => StrategyError::Unavailable(msg),
                    StrategyError::Failed(msg) => {
                        StrategyError::Unavailable(format!("asset resolution failed: {msg}"))
                    }
                })?;
                debug!(file = %artifact.file_name, ?assets, "Resolved parser assets");
                Some(assets)
            }
            None => None,
        };

        self.parser.parse(artifact.bytes.clone(), assets).await
    }
}

/// Resolver that always returns the same assets.
#[derive(Debug, Clone, Default)]
pub struct StaticAssets(pub ParserAssets);

#[async_trait]
impl AssetResolver for StaticAssets {
    async fn resolve(&self) -> Result<ParserAssets, StrategyError> {
        Ok(self.0.clone())
    }
}
