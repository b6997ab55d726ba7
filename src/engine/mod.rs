//! Recognition engine contract
//!
//! The pipeline consumes OCR through this trait and never assumes a
//! particular engine. Engines are stateful and not safely concurrent, so a
//! handle is owned by exactly one [`crate::pipeline::Analyzer`] and attempts
//! run strictly sequentially against it. Disposal is ownership: dropping the
//! engine releases its resources.

pub mod tesseract_cli;

pub use tesseract_cli::TesseractCli;

use crate::error::Result;
use crate::raster::RasterBuffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Expected text layout, passed through to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// One row of text (buttons, headlines).
    SingleLine,
    /// A general block of text.
    #[default]
    Block,
}

impl PageSegMode {
    /// Derive the layout hint from a region's aspect ratio (h/w).
    pub fn for_aspect(aspect: f32) -> Self {
        if aspect <= crate::preprocess::LINE_ASPECT {
            PageSegMode::SingleLine
        } else {
            PageSegMode::Block
        }
    }
}

/// Engine configuration for one attempt.
///
/// The orchestrator tracks the last-applied value and only calls
/// [`RecognitionEngine::set_parameters`] when it changes, since engine
/// reconfiguration can be expensive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pub page_seg_mode: PageSegMode,
    /// Restrict recognition to these characters, if set.
    pub char_whitelist: Option<String>,
}

/// One recognized line with the engine's confidence for it, 0-100.
#[derive(Debug, Clone)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f32,
}

/// Raw engine output for one attempt.
#[derive(Debug, Clone, Default)]
pub struct RecognitionOutcome {
    /// Full recognized text, newline separated.
    pub text: String,
    /// Mean confidence over the whole attempt, 0-100.
    pub overall_confidence: f32,
    /// Per-line detail. May be empty when the engine cannot provide
    /// line-level confidence; callers then fall back to `text` unfiltered.
    pub lines: Vec<RecognizedLine>,
}

/// A pluggable OCR engine.
///
/// Construction is the `initialize` step (idempotent per handle); `Drop` is
/// disposal. Implementations may be remote, subprocess-based or in-process,
/// but must tolerate `recognize` being called repeatedly on one handle.
#[async_trait]
pub trait RecognitionEngine: Send {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Apply attempt parameters. Called only when they differ from the
    /// previously applied set.
    async fn set_parameters(&mut self, params: &EngineParams) -> Result<()>;

    /// Recognize text in the buffer under the current parameters.
    async fn recognize(&mut self, buffer: &RasterBuffer) -> Result<RecognitionOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_seg_mode_from_aspect() {
        assert_eq!(PageSegMode::for_aspect(0.1), PageSegMode::SingleLine);
        assert_eq!(PageSegMode::for_aspect(0.18), PageSegMode::SingleLine);
        assert_eq!(PageSegMode::for_aspect(0.5), PageSegMode::Block);
    }

    #[test]
    fn test_engine_params_equality_drives_reconfiguration() {
        let a = EngineParams {
            page_seg_mode: PageSegMode::Block,
            char_whitelist: None,
        };
        let b = a.clone();
        assert_eq!(a, b);

        let c = EngineParams {
            page_seg_mode: PageSegMode::SingleLine,
            char_whitelist: None,
        };
        assert_ne!(a, c);
    }
}
