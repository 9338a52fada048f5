//! Last-resort byte scanner.
//!
//! Needs no parser at all: pulls PDF literal strings `( ... )` out of the raw
//! bytes, and if there are none falls back to runs of printable ASCII with
//! PDF syntax keywords dropped. Only works for uncompressed content streams,
//! which is exactly the case the parser strategies tend to choke on.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::StrategyError;
use crate::traits::extractor::Extractor;
use crate::types::artifact::Artifact;

lazy_static! {
    // Balanced-free literal string with backslash escapes
    static ref LITERAL_REGEX: Regex = Regex::new(r"(?s-u)\(((?:[^()\\]|\\.){2,})\)").unwrap();

    // Printable ASCII runs
    static ref PRINTABLE_REGEX: Regex = Regex::new(r"(?-u)[\x20-\x7E]{4,}").unwrap();
}

const PDF_KEYWORDS: &[&str] = &[
    "obj", "endobj", "stream", "endstream", "xref", "trailer", "startxref", "null", "true",
    "false", "BT", "ET", "Tf", "Td", "TD", "Tj", "TJ", "Tm", "Tc", "Tw", "Tz", "TL", "cm", "re",
    "Do", "BI", "ID", "EI", "q", "Q", "R", "f", "n", "PDF",
];

/// Scans raw artifact bytes for text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawScanExtractor;

impl RawScanExtractor {
    pub fn new() -> Self {
        Self
    }

    fn scan(bytes: &[u8]) -> Result<String, StrategyError> {
        let literals = Self::literal_strings(bytes);
        if !literals.is_empty() {
            return Ok(literals.join(" "));
        }

        let words = Self::printable_words(bytes);
        if words.is_empty() {
            return Err(StrategyError::Failed("no printable text found".into()));
        }
        Ok(words.join(" "))
    }

    fn literal_strings(bytes: &[u8]) -> Vec<String> {
        LITERAL_REGEX
            .captures_iter(bytes)
            .filter_map(|caps| caps.get(1))
            .map(|m| unescape(m.as_bytes()))
            .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
            .collect()
    }

    fn printable_words(bytes: &[u8]) -> Vec<String> {
        PRINTABLE_REGEX
            .find_iter(bytes)
            .flat_map(|m| {
                String::from_utf8_lossy(m.as_bytes())
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|word| is_prose_word(word))
            .collect()
    }
}

fn is_prose_word(word: &str) -> bool {
    if word.starts_with('/') || word.starts_with('<') || word.starts_with('%') {
        return false;
    }
    if PDF_KEYWORDS.contains(&word) {
        return false;
    }
    // Object numbers, offsets and operand soup
    word.chars().any(|c| c.is_alphabetic())
        && word
            .chars()
            .all(|c| c.is_alphanumeric() || ".,;:!?'\"-()@&".contains(c))
}

fn unescape(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'b') | Some(b'f') => {}
            Some(d @ b'0'..=b'7') => {
                let mut value = (d - b'0') as u32;
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + (n - b'0') as u32;
                            iter.next();
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    String::from_utf8_lossy(&out)
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}

#[async_trait]
impl Extractor for RawScanExtractor {
    fn name(&self) -> &'static str {
        "raw_scan"
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StrategyError> {
        // Regex passes over a full upload are CPU-bound; keep them off the executor.
        let bytes = artifact.bytes.clone();
        tokio::task::spawn_blocking(move || Self::scan(&bytes))
            .await
            .map_err(|e| StrategyError::Failed(format!("scan task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pulls_literal_strings_from_content_stream() {
        let raw = b"%PDF-1.4\n1 0 obj\n<< /Length 44 >>\nstream\nBT /F1 12 Tf 72 712 Td (Senior Rust Engineer) Tj (Berlin \\(remote\\)) Tj ET\nendstream\nendobj\n";
        let artifact = Artifact::pdf("cv.pdf", raw.to_vec());

        let text = RawScanExtractor::new().extract(&artifact).await.unwrap();

        assert_eq!(text, "Senior Rust Engineer Berlin (remote)");
    }

    #[tokio::test]
    async fn falls_back_to_printable_words_without_literals() {
        let mut raw = b"%PDF-1.4\n2 0 obj\n<< /Type /Page >>\nendobj\n".to_vec();
        raw.extend_from_slice(&[0x00, 0xFF, 0x13]);
        raw.extend_from_slice(b"\nExperienced engineer building payment systems\n");
        let artifact = Artifact::pdf("cv.pdf", raw);

        let text = RawScanExtractor::new().extract(&artifact).await.unwrap();

        assert!(text.contains("Experienced engineer building payment systems"));
        assert!(!text.contains("endobj"));
        assert!(!text.contains("/Type"));
    }

    #[tokio::test]
    async fn binary_noise_fails() {
        let artifact = Artifact::pdf("cv.pdf", vec![0u8, 1, 2, 0xFE, 0xFF, 3]);

        let err = RawScanExtractor::new().extract(&artifact).await.unwrap_err();
        assert!(matches!(err, StrategyError::Failed(_)));
    }

    #[tokio::test]
    async fn large_upload_scans_on_blocking_pool() {
        let mut raw = b"%PDF-1.4\nBT (Staff engineer, payments platform) Tj ET\n".to_vec();
        raw.resize(10 * 1024 * 1024, 0u8);
        let artifact = Artifact::pdf("big.pdf", raw);

        let text = RawScanExtractor::new().extract(&artifact).await.unwrap();

        assert_eq!(text, "Staff engineer, payments platform");
    }

    #[test]
    fn octal_escapes_are_decoded() {
        assert_eq!(unescape(b"caf\\351"), "caf\u{FFFD}");
        assert_eq!(unescape(b"A\\102C"), "ABC");
    }
}
