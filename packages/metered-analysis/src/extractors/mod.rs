//! Text extraction with ordered fallback strategies.
//!
//! # Available Extractors
//!
//! - `ParserExtractor` - Structured parser, with or without support assets
//! - `RawScanExtractor` - Byte scanner, no parser required
//! - `LopdfParser` - `DocumentParser` over `lopdf` (requires `pdf` feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use metered_analysis::extractors::{ExtractionChain, LopdfParser, StaticAssets};
//!
//! let chain = ExtractionChain::standard(Arc::new(LopdfParser::new()), Arc::new(StaticAssets::default()));
//! let text = chain.extract(&artifact).await?;
//! ```

mod parser;
mod raw_scan;

#[cfg(feature = "pdf")]
mod pdf;

pub use parser::{ParserExtractor, StaticAssets};
pub use raw_scan::RawScanExtractor;

#[cfg(feature = "pdf")]
pub use pdf::LopdfParser;

// Re-export from traits for convenience
pub use crate::traits::extractor::Extractor;
pub use crate::traits::parser::{AssetResolver, DocumentParser, ParserAssets};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::error::{panic_message, ExtractionError, StrategyAttempt, StrategyError};
use crate::types::artifact::Artifact;
use crate::types::config::PipelineConfig;

/// Tries each strategy in order until one yields usable text.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn Extractor>>,
    min_chars: usize,
    max_chars: usize,
}

impl ExtractionChain {
    /// Chain over `strategies` with the default text bounds.
    pub fn new(strategies: Vec<Box<dyn Extractor>>) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            strategies,
            min_chars: defaults.min_text_chars,
            max_chars: defaults.max_text_chars,
        }
    }

    /// The three built-in strategies: parser with assets, degraded parser,
    /// raw byte scan.
    pub fn standard(parser: Arc<dyn DocumentParser>, resolver: Arc<dyn AssetResolver>) -> Self {
        Self::new(vec![
            Box::new(ParserExtractor::with_assets(parser.clone(), resolver)),
            Box::new(ParserExtractor::degraded(parser)),
            Box::new(RawScanExtractor::new()),
        ])
    }

    /// Override the acceptance bounds.
    pub fn with_bounds(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_chars = min_chars;
        self.max_chars = max_chars;
        self
    }

    /// Take the acceptance bounds from a pipeline config.
    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_bounds(config.min_text_chars, config.max_text_chars)
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract text from the artifact.
    ///
    /// Output is accepted when its trimmed length is strictly greater than
    /// `min_chars`. Accepted output longer than `max_chars` ends the chain
    /// with `TooLarge`. A strategy that panics counts as a failed strategy.
    pub async fn extract(&self, artifact: &Artifact) -> Result<String, ExtractionError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let name = strategy.name();
            let outcome = AssertUnwindSafe(async { strategy.extract(artifact).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(StrategyError::Failed(format!(
                        "strategy panicked: {}",
                        panic_message(&*panic)
                    )))
                });

            match outcome {
                Ok(text) => {
                    let text = text.trim();
                    let chars = text.chars().count();

                    if chars <= self.min_chars {
                        debug!(strategy = name, chars, min = self.min_chars, "Extraction too short, trying next strategy");
                        attempts.push(StrategyAttempt {
                            strategy: name,
                            outcome: format!("too short ({chars} chars)"),
                        });
                        continue;
                    }

                    if chars > self.max_chars {
                        warn!(strategy = name, chars, limit = self.max_chars, "Extracted text exceeds limit");
                        return Err(ExtractionError::TooLarge {
                            chars,
                            limit: self.max_chars,
                        });
                    }

                    info!(strategy = name, chars, file = %artifact.file_name, "Extraction succeeded");
                    return Ok(text.to_string());
                }
                Err(e) => {
                    warn!(strategy = name, file = %artifact.file_name, error = %e, "Extraction strategy failed");
                    attempts.push(StrategyAttempt {
                        strategy: name,
                        outcome: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractionError::Unreadable { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::extractor::MockExtractor;

    fn text(len: usize) -> String {
        "a".repeat(len)
    }

    fn ok(name: &'static str, output: String) -> MockExtractor {
        let mut mock = MockExtractor::new();
        mock.expect_name().return_const(name);
        mock.expect_extract()
            .times(1)
            .returning(move |_| Ok(output.clone()));
        mock
    }

    fn failing(name: &'static str) -> MockExtractor {
        let mut mock = MockExtractor::new();
        mock.expect_name().return_const(name);
        mock.expect_extract()
            .times(1)
            .returning(|_| Err(StrategyError::Failed("corrupt xref table".into())));
        mock
    }

    fn panicking(name: &'static str) -> MockExtractor {
        let mut mock = MockExtractor::new();
        mock.expect_name().return_const(name);
        mock.expect_extract()
            .times(1)
            .returning(|_| panic!("page tree recursion"));
        mock
    }

    fn untouched(name: &'static str) -> MockExtractor {
        let mut mock = MockExtractor::new();
        mock.expect_name().return_const(name);
        mock.expect_extract().never();
        mock
    }

    fn artifact() -> Artifact {
        Artifact::pdf("cv.pdf", "%PDF-1.4")
    }

    #[tokio::test]
    async fn second_strategy_used_when_first_fails() {
        let chain = ExtractionChain::new(vec![
            Box::new(failing("first")),
            Box::new(ok("second", text(200))),
            Box::new(untouched("third")),
        ]);

        let out = chain.extract(&artifact()).await.unwrap();
        assert_eq!(out.len(), 200);
    }

    #[tokio::test]
    async fn panicking_strategy_falls_through_to_next() {
        let chain = ExtractionChain::new(vec![
            Box::new(panicking("first")),
            Box::new(ok("second", text(120))),
        ]);

        let out = chain.extract(&artifact()).await.unwrap();
        assert_eq!(out.len(), 120);
    }

    #[tokio::test]
    async fn only_panicking_strategies_is_unreadable() {
        let chain = ExtractionChain::new(vec![Box::new(panicking("first"))]);

        match chain.extract(&artifact()).await.unwrap_err() {
            ExtractionError::Unreadable { attempts } => {
                assert_eq!(attempts.len(), 1);
                assert!(attempts[0].outcome.contains("page tree recursion"));
            }
            other => panic!("expected unreadable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn third_strategy_used_when_second_is_too_short() {
        let chain = ExtractionChain::new(vec![
            Box::new(failing("first")),
            Box::new(ok("second", text(10))),
            Box::new(ok("third", text(60))),
        ]);

        let out = chain.extract(&artifact()).await.unwrap();
        assert_eq!(out.len(), 60);
    }

    #[tokio::test]
    async fn exactly_min_chars_is_not_enough() {
        let chain = ExtractionChain::new(vec![
            Box::new(ok("first", text(50))),
            Box::new(ok("second", text(51))),
        ]);

        let out = chain.extract(&artifact()).await.unwrap();
        assert_eq!(out.len(), 51);
    }

    #[tokio::test]
    async fn whitespace_does_not_count() {
        let padded = format!("   {}\n\n\t   ", text(30));
        let chain = ExtractionChain::new(vec![Box::new(ok("first", padded))]);

        let err = chain.extract(&artifact()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn exhaustion_records_every_attempt() {
        let chain = ExtractionChain::new(vec![
            Box::new(failing("first")),
            Box::new(ok("second", text(5))),
            Box::new(failing("third")),
        ]);

        match chain.extract(&artifact()).await.unwrap_err() {
            ExtractionError::Unreadable { attempts } => {
                let names: Vec<_> = attempts.iter().map(|a| a.strategy).collect();
                assert_eq!(names, vec!["first", "second", "third"]);
                assert!(attempts[1].outcome.contains("too short"));
            }
            other => panic!("expected unreadable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_text_is_terminal() {
        let chain = ExtractionChain::new(vec![
            Box::new(ok("first", text(1_000))),
            Box::new(untouched("second")),
        ])
        .with_bounds(50, 500);

        let err = chain.extract(&artifact()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::TooLarge {
                chars: 1_000,
                limit: 500
            }
        ));
    }

    #[tokio::test]
    async fn standard_chain_order() {
        let parser = Arc::new(crate::testing::MockParser::new().with_text("x"));
        let chain = ExtractionChain::standard(parser, Arc::new(StaticAssets::default()));

        assert_eq!(
            chain.strategy_names(),
            vec!["parser_with_assets", "parser_degraded", "raw_scan"]
        );
    }
}
