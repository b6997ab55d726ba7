//! Analysis settings
//!
//! A flat settings object stored in TOML format. Every field participates in
//! the cache fingerprint, so changing any tunable automatically invalidates
//! stale cache entries. The fingerprint also embeds a pipeline version that
//! is bumped whenever the pipeline's output semantics change.

use crate::engine::PageSegMode;
use crate::error::{AnalysisError, Result};
use crate::raster::FractionalRegion;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Bump when pipeline semantics change in a way that stales cached results.
pub const PIPELINE_VERSION: u32 = 1;

/// How regions of interest are resolved before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMode {
    /// Analyze the whole image as a single region.
    Full,
    /// Detect candidate regions via edge-density clustering.
    #[default]
    Auto,
    /// Analyze a single caller-specified fractional region.
    Manual,
}

/// Flat configuration for one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Region resolution strategy.
    pub region_mode: RegionMode,
    /// Region used when `region_mode` is `Manual`.
    pub manual_region: Option<FractionalRegion>,

    /// Lower bound on the working resolution width.
    pub min_width: u32,
    /// Upper bound on the working resolution width.
    pub max_width: u32,
    /// Extra scale applied to the working resolution, clamped to 1.0-3.0.
    pub scale_factor: f32,

    /// Override the per-region page segmentation mode.
    pub psm_override: Option<PageSegMode>,
    /// Restrict recognition to these characters, if set.
    pub char_whitelist: Option<String>,

    /// Master toggle for preprocessing passes (false = raw pass only).
    pub preprocess: bool,
    /// Produce hard-binarized (Otsu) passes in addition to soft ones.
    pub hard_threshold: bool,
    /// Sharpen before thresholding hard passes.
    pub sharpen: bool,
    /// 3x3 box blur repetitions before thresholding (0-3).
    pub blur_radius: u8,
    /// Contrast factor for soft passes (1.0 = unchanged).
    pub contrast: f32,
    /// Brightness offset for soft passes (-255 to 255).
    pub brightness: i16,
    /// Schedule the extra hard-thresholded pass when picking attempts.
    pub aggressive: bool,

    /// Run the banner-vocabulary spell corrector over recognized lines.
    pub spell_correct: bool,

    /// Skip recognition entirely when the image looks text-free.
    pub smart_precheck: bool,
    /// Likelihood below which the precheck short-circuits.
    pub text_likelihood_threshold: f32,

    /// Luma gradient magnitude that counts as an edge (0-255).
    pub edge_threshold: u8,
    /// Maximum detected regions (auto mode caps total regions at 4).
    pub max_regions: usize,

    // Empirically tuned line-admission confidences (see DESIGN.md). Kept
    // configurable rather than hardcoded so they can be recalibrated
    // against a labeled corpus.
    /// Minimum confidence for general lines in block mode.
    pub conf_general_block: f32,
    /// Minimum confidence for general lines in single-line mode.
    pub conf_general_line: f32,
    /// Minimum confidence for "important" lines in block mode.
    pub conf_important_block: f32,
    /// Minimum confidence for "important" lines in single-line mode.
    pub conf_important_line: f32,
    /// Minimum confidence for very short lines with no dictionary hits.
    pub conf_short_line: f32,

    /// A region's runner-up attempt is merged in when it scores at least
    /// this fraction of the winner and looks important.
    pub second_best_ratio: f32,
    /// Auto-mode retries against the full image when the merged text has
    /// fewer alphanumeric characters than this.
    pub fallback_min_alnum: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            region_mode: RegionMode::Auto,
            manual_region: None,
            min_width: 800,
            max_width: 2000,
            scale_factor: 1.0,
            psm_override: None,
            char_whitelist: None,
            preprocess: true,
            hard_threshold: true,
            sharpen: false,
            blur_radius: 1,
            contrast: 1.15,
            brightness: 0,
            aggressive: false,
            spell_correct: true,
            smart_precheck: true,
            text_likelihood_threshold: 0.075,
            edge_threshold: 70,
            max_regions: 3,
            conf_general_block: 62.0,
            conf_general_line: 72.0,
            conf_important_block: 42.0,
            conf_important_line: 52.0,
            conf_short_line: 85.0,
            second_best_ratio: 0.8,
            fallback_min_alnum: 12,
        }
    }
}

impl AnalysisSettings {
    /// Fail-fast validation, run before any engine work begins.
    pub fn validate(&self) -> Result<()> {
        if self.min_width == 0 || self.max_width == 0 {
            return Err(AnalysisError::Config(
                "min_width and max_width must be positive".to_string(),
            ));
        }
        if self.min_width > self.max_width {
            return Err(AnalysisError::Config(format!(
                "min_width {} exceeds max_width {}",
                self.min_width, self.max_width
            )));
        }
        if self.blur_radius > 3 {
            return Err(AnalysisError::Config(format!(
                "blur_radius {} out of range 0-3",
                self.blur_radius
            )));
        }
        if !(0.0..=1.0).contains(&self.text_likelihood_threshold) {
            return Err(AnalysisError::Config(
                "text_likelihood_threshold must be within 0.0-1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.second_best_ratio) {
            return Err(AnalysisError::Config(
                "second_best_ratio must be within 0.0-1.0".to_string(),
            ));
        }
        if self.region_mode == RegionMode::Manual {
            match &self.manual_region {
                Some(region) => region.validate()?,
                None => {
                    return Err(AnalysisError::Config(
                        "region_mode is manual but no manual_region given".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Effective scale factor, clamped to the supported 1.0-3.0 range.
    pub fn effective_scale(&self) -> f32 {
        self.scale_factor.clamp(1.0, 3.0)
    }

    /// Deterministic fingerprint over every setting plus the pipeline
    /// version. Cache keys embed this, so any tunable change (or a version
    /// bump) invalidates prior entries.
    pub fn fingerprint(&self) -> String {
        // serde_json emits struct fields in declaration order, which makes
        // the serialization deterministic for a fixed crate version.
        let serialized =
            serde_json::to_string(self).unwrap_or_else(|_| "unserializable".to_string());
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        let digest = hasher.finalize();
        format!("v{}-{:x}", PIPELINE_VERSION, digest)
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<AnalysisSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings: AnalysisSettings =
        toml::from_str(&content).map_err(|e| AnalysisError::Config(e.to_string()))?;
    Ok(settings)
}

/// Save settings to a TOML file.
pub fn save_settings(settings: &AnalysisSettings, path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(settings).map_err(|e| AnalysisError::Config(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}
