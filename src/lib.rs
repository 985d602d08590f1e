//! Token Risk Engine Library
//!
//! Scores Solana tokens for rug-pull and scam risk from heterogeneous,
//! partially available source data and an optional transaction history.

pub mod cache;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod error;
pub mod flags;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod token;

// Re-export commonly used types
pub use cache::{CacheKey, ReportCache};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{AnalysisRun, AnalysisStage, Pipeline, RiskEngine};
pub use report::{Report, RiskLevel};
pub use scoring::ReportKind;
pub use token::TokenId;
