//! Core trait abstractions for the analysis pipeline.
//!
//! These traits define the interfaces that applications implement
//! to provide the ledger, cost lookup, extraction, remote analysis and
//! result persistence backends.

pub mod analyzer;
pub mod catalog;
pub mod extractor;
pub mod ledger;
pub mod parser;
pub mod result_store;
