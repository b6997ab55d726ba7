//! Error taxonomy for the analysis pipeline
//!
//! Cancellation is a distinguished variant, never folded into generic
//! failures, so callers can tell "stopped intentionally" from "broke".
//! Engine errors are isolated per recognition attempt by the orchestrator
//! and only surface here when the whole operation cannot proceed.

use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors produced by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Image bytes could not be parsed into a raster buffer.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Fetching a remote image source failed.
    #[error("failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The operation was cancelled via its cancellation token.
    #[error("analysis cancelled")]
    Cancelled,

    /// The external recognition engine failed outside of a single attempt
    /// (startup, teardown, or the engine binary is missing entirely).
    #[error("recognition engine error: {0}")]
    Engine(String),

    /// Invalid settings, rejected before any engine work begins.
    #[error("invalid settings: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// True when the error is the distinguished cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}
