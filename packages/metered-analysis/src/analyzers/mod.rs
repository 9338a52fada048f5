//! Remote analyzer implementations.
//!
//! # Available Analyzers
//!
//! - `HttpAnalyzer` - JSON over HTTP with bearer auth
//! - `MockAnalyzer` - For testing (in [`crate::testing`])

mod http;

pub use http::HttpAnalyzer;

// Re-export from traits for convenience
pub use crate::traits::analyzer::RemoteAnalyzer;
