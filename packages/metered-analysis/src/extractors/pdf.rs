//! `lopdf`-backed document parser.

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::Document;
use tracing::debug;

use crate::error::StrategyError;
use crate::traits::parser::{DocumentParser, ParserAssets};

/// Parses PDFs with `lopdf`. Parsing runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfParser;

impl LopdfParser {
    pub fn new() -> Self {
        Self
    }
}

fn parse_blocking(bytes: &[u8], assets: Option<ParserAssets>) -> Result<String, StrategyError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| StrategyError::Failed(format!("failed to load document: {e}")))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(StrategyError::Failed("document has no pages".into()));
    }

    match assets {
        Some(assets) => {
            if let Some(max) = assets.max_pages {
                pages.truncate(max);
            }
            doc.extract_text(&pages)
                .map_err(|e| StrategyError::Failed(format!("text extraction failed: {e}")))
        }
        None => {
            let mut text = String::new();
            let mut skipped = 0usize;
            for page in &pages {
                match doc.extract_text(&[*page]) {
                    Ok(page_text) => {
                        text.push_str(&page_text);
                        text.push('\n');
                    }
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                debug!(skipped, total = pages.len(), "Skipped unreadable pages");
            }
            if skipped == pages.len() {
                return Err(StrategyError::Failed("no page could be read".into()));
            }
            Ok(text)
        }
    }
}

#[async_trait]
impl DocumentParser for LopdfParser {
    async fn parse(
        &self,
        bytes: Bytes,
        assets: Option<ParserAssets>,
    ) -> Result<String, StrategyError> {
        tokio::task::spawn_blocking(move || parse_blocking(&bytes, assets))
            .await
            .map_err(|e| StrategyError::Failed(format!("parser task failed: {e}")))?
    }
}
