//! bannerlens - Banner image text analysis
//!
//! Takes a raster image (marketing banner, email block graphic), decides
//! whether it likely contains readable text, isolates candidate regions,
//! preprocesses them, drives an external OCR engine across multiple attempts,
//! cleans the noisy output and derives ranked alt-text / call-to-action /
//! filename suggestions.
//!
//! The recognition engine itself is external: anything implementing
//! [`engine::RecognitionEngine`] can be plugged into the [`pipeline::Analyzer`].
//! A subprocess-based tesseract engine ships with the crate.

pub mod cache;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod raster;
pub mod suggest;
pub mod textproc;

pub use cache::AnalysisCache;
pub use config::{AnalysisSettings, RegionMode};
pub use engine::{EngineParams, PageSegMode, RecognitionEngine, RecognitionOutcome};
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisResult, AnalyzeOptions, Analyzer, ImageSource, SkipReason};
pub use raster::{FractionalRegion, RasterBuffer};
