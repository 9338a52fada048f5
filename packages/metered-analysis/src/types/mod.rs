//! Data types for the metered analysis pipeline.

pub mod analysis;
pub mod artifact;
pub mod attempt;
pub mod config;
pub mod cost;
pub mod ledger;
pub mod status;
