//! Analysis orchestration
//!
//! Ties the stages together: load and decode the image, consult the cache,
//! run the cheap text-likelihood precheck, resolve regions, schedule
//! preprocessing passes and drive the recognition engine across them,
//! merge and clean the winning text and derive suggestions.
//!
//! Attempts run strictly sequentially because engines are stateful. A
//! single failed attempt never fails the analysis; cancellation does.

use crate::cache::{self, AnalysisCache};
use crate::config::{AnalysisSettings, RegionMode};
use crate::detect;
use crate::engine::{EngineParams, PageSegMode, RecognitionEngine};
use crate::error::{AnalysisError, Result};
use crate::preprocess::{self, PreprocessOptions, LINE_ASPECT};
use crate::raster::{FractionalRegion, RasterBuffer};
use crate::suggest;
use crate::textproc::{self, AdmissionThresholds, ProcessOptions};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Absolute ceiling on the working resolution width.
const MAX_WORKING_WIDTH: u32 = 3200;
/// Auto mode analyzes at most this many regions, bands included.
const MAX_TOTAL_REGIONS: usize = 4;
/// Weight of engine confidence against text quality when ranking attempts.
const CONFIDENCE_WEIGHT: f32 = 1.4;

/// Where the image bytes come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    async fn load(&self) -> Result<Vec<u8>> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Path(path) => Ok(tokio::fs::read(path).await?),
            ImageSource::Url(url) => {
                debug!(url, "fetching image");
                let response = reqwest::get(url).await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

/// Why an analysis returned without running recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The precheck judged the image unlikely to contain readable text.
    LowTextLikelihood,
}

/// The complete output of one analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    /// Cleaned, deduplicated text, best for display.
    pub display_text: String,
    /// Spell-corrected but unfiltered text.
    pub raw_text: String,
    /// Up to three alt-text candidates, best first.
    pub alt_suggestions: Vec<String>,
    /// Up to two call-to-action labels.
    pub cta_suggestions: Vec<String>,
    /// Up to three filename slugs.
    pub name_suggestions: Vec<String>,
    /// Edge-density likelihood score of the original image.
    pub text_likelihood: f32,
    /// Set when recognition was skipped entirely.
    pub skipped: Option<SkipReason>,
    /// True when this result came from the cache.
    pub cache_hit: bool,
}

/// Per-call controls that are not part of the cache key.
pub struct AnalyzeOptions {
    /// Re-analyze past a cached skip and override the precheck
    /// short-circuit. A genuine cached success is still returned.
    pub force: bool,
    /// Checked between attempts; cancellation aborts with
    /// [`AnalysisError::Cancelled`].
    pub cancel: CancellationToken,
    /// Monotone progress in `[0, 1]`, reported at attempt boundaries.
    pub progress: Option<Box<dyn Fn(f32) + Send + Sync>>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            force: false,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

/// One completed recognition attempt for a region.
struct Attempt {
    text: String,
    score: f32,
}

/// Drives a [`RecognitionEngine`] through the full analysis pipeline.
pub struct Analyzer<E> {
    engine: E,
    cache: AnalysisCache,
    applied_params: Option<EngineParams>,
}

impl<E: RecognitionEngine> Analyzer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            cache: AnalysisCache::new(),
            applied_params: None,
        }
    }

    pub fn with_cache(engine: E, cache: AnalysisCache) -> Self {
        Self {
            engine,
            cache,
            applied_params: None,
        }
    }

    /// Analyze one image under the given settings.
    pub async fn analyze(
        &mut self,
        source: &ImageSource,
        settings: &AnalysisSettings,
        opts: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        settings.validate()?;

        let bytes = source.load().await?;
        if opts.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let format = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("unknown");
        let content_fp = cache::content_fingerprint(&bytes, format);
        let config_fp = settings.fingerprint();

        // Force re-runs a cached skip, but a genuine cached success stands:
        // the fingerprints guarantee it would come out identical anyway.
        if let Some(mut hit) = self.cache.get(&content_fp, &config_fp) {
            if !(opts.force && hit.skipped.is_some()) {
                hit.cache_hit = true;
                report_progress(opts, 1.0);
                return Ok(hit);
            }
        }

        let decoded = RasterBuffer::decode(&bytes)?;
        let likelihood = detect::estimate_text_likelihood(&decoded, settings.edge_threshold);
        debug!(likelihood, width = decoded.width(), height = decoded.height(), "image decoded");

        if settings.smart_precheck
            && !opts.force
            && likelihood < settings.text_likelihood_threshold
        {
            info!(likelihood, "precheck: image unlikely to contain text, skipping");
            let result = AnalysisResult {
                text_likelihood: likelihood,
                skipped: Some(SkipReason::LowTextLikelihood),
                ..Default::default()
            };
            self.cache.put(&content_fp, &config_fp, result.clone());
            report_progress(opts, 1.0);
            return Ok(result);
        }

        let working = working_buffer(&decoded, settings);
        let regions = resolve_regions(&working, settings);
        debug!(regions = regions.len(), "analyzing regions");

        let merged = self
            .recognize_regions(&working, &regions, settings, opts)
            .await?;

        // A near-empty merge in auto mode usually means detection chose the
        // wrong regions; retry once with a single aggressive pass over the
        // whole image and keep whichever result read more.
        let merged = if settings.region_mode == RegionMode::Auto
            && textproc::count_alphanumeric(&merged) < settings.fallback_min_alnum
            && regions != vec![FractionalRegion::full()]
        {
            info!("merged text too thin, retrying full image");
            let retry = self.fallback_attempt(&working, settings, opts).await?;
            if textproc::count_alphanumeric(&retry) > textproc::count_alphanumeric(&merged) {
                retry
            } else {
                merged
            }
        } else {
            merged
        };

        let processed = textproc::process(
            &merged,
            ProcessOptions {
                spell_correct: settings.spell_correct,
            },
        );
        let suggestions = suggest::build(&processed.lines);

        let result = AnalysisResult {
            display_text: processed.display_text,
            raw_text: processed.raw_corrected_text,
            alt_suggestions: suggestions.alt,
            cta_suggestions: suggestions.cta,
            name_suggestions: suggestions.names,
            text_likelihood: likelihood,
            skipped: None,
            cache_hit: false,
        };
        self.cache.put(&content_fp, &config_fp, result.clone());
        report_progress(opts, 1.0);
        Ok(result)
    }

    /// Run the attempt schedule over every region and merge the winners
    /// top to bottom.
    async fn recognize_regions(
        &mut self,
        working: &RasterBuffer,
        regions: &[FractionalRegion],
        settings: &AnalysisSettings,
        opts: &AnalyzeOptions,
    ) -> Result<String> {
        let preprocess_opts = PreprocessOptions {
            enabled: settings.preprocess,
            hard_threshold: settings.hard_threshold,
            sharpen: settings.sharpen,
            blur_radius: settings.blur_radius,
            contrast: settings.contrast,
            brightness: settings.brightness,
        };

        // Build the whole schedule first so progress has a stable total.
        struct RegionPlan {
            is_line: bool,
            passes: Vec<preprocess::PreprocessPass>,
        }

        let mut plans: Vec<RegionPlan> = Vec::new();
        let mut ordered: Vec<FractionalRegion> = regions.to_vec();
        ordered.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));

        for region in ordered {
            let crop = working.crop(&region);
            let is_line = match settings.psm_override {
                Some(PageSegMode::SingleLine) => true,
                Some(PageSegMode::Block) => false,
                None => region.aspect() <= LINE_ASPECT,
            };
            let passes = preprocess::build_passes(&crop, &preprocess_opts);
            plans.push(RegionPlan { is_line, passes });
        }

        let total_attempts: usize = plans
            .iter()
            .map(|p| preprocess::pick_attempts(&p.passes, p.is_line, settings.aggressive).len())
            .sum();
        let mut completed = 0usize;
        let mut merged_lines: Vec<String> = Vec::new();

        for plan in &plans {
            let thresholds = AdmissionThresholds {
                general: if plan.is_line {
                    settings.conf_general_line
                } else {
                    settings.conf_general_block
                },
                important: if plan.is_line {
                    settings.conf_important_line
                } else {
                    settings.conf_important_block
                },
                short: settings.conf_short_line,
            };
            let params = EngineParams {
                page_seg_mode: if plan.is_line {
                    PageSegMode::SingleLine
                } else {
                    PageSegMode::Block
                },
                char_whitelist: settings.char_whitelist.clone(),
            };

            let mut attempts: Vec<Attempt> = Vec::new();
            for pass in preprocess::pick_attempts(&plan.passes, plan.is_line, settings.aggressive) {
                if opts.cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }

                match self.run_attempt(&pass.buffer, &params, &thresholds).await {
                    Ok(Some(attempt)) => {
                        debug!(pass = pass.id.as_str(), score = attempt.score, "attempt complete");
                        attempts.push(attempt);
                    }
                    Ok(None) => {}
                    Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
                    Err(e) => {
                        warn!(pass = pass.id.as_str(), error = %e, "attempt failed, continuing");
                    }
                }

                completed += 1;
                report_progress(opts, completed as f32 / total_attempts.max(1) as f32);
            }

            merge_region_attempts(&mut merged_lines, attempts, settings.second_best_ratio);
        }

        Ok(merged_lines.join("\n"))
    }

    /// The one-shot fallback when the primary schedule read almost
    /// nothing: a single hard-thresholded max-channel attempt over the
    /// full working image in block layout. Engine failures degrade to an
    /// empty result rather than failing the analysis.
    async fn fallback_attempt(
        &mut self,
        working: &RasterBuffer,
        settings: &AnalysisSettings,
        opts: &AnalyzeOptions,
    ) -> Result<String> {
        if opts.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let pass = preprocess::fallback_pass(working);
        let params = EngineParams {
            page_seg_mode: PageSegMode::Block,
            char_whitelist: settings.char_whitelist.clone(),
        };
        let thresholds = AdmissionThresholds {
            general: settings.conf_general_block,
            important: settings.conf_important_block,
            short: settings.conf_short_line,
        };
        match self.run_attempt(&pass.buffer, &params, &thresholds).await {
            Ok(Some(attempt)) => Ok(attempt.text),
            Ok(None) => Ok(String::new()),
            Err(AnalysisError::Cancelled) => Err(AnalysisError::Cancelled),
            Err(e) => {
                warn!(pass = pass.id.as_str(), error = %e, "fallback attempt failed");
                Ok(String::new())
            }
        }
    }

    /// One engine invocation with confidence-gated line admission.
    /// `Ok(None)` means the attempt produced nothing admissible.
    async fn run_attempt(
        &mut self,
        buffer: &RasterBuffer,
        params: &EngineParams,
        thresholds: &AdmissionThresholds,
    ) -> Result<Option<Attempt>> {
        if self.applied_params.as_ref() != Some(params) {
            self.engine.set_parameters(params).await?;
            self.applied_params = Some(params.clone());
        }

        let outcome = self.engine.recognize(buffer).await?;

        let text = if outcome.lines.is_empty() {
            // Engine without line-level confidence: take the text as-is.
            outcome.text.clone()
        } else {
            outcome
                .lines
                .iter()
                .filter(|l| textproc::admit_line(&l.text, l.confidence, thresholds))
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };

        if text.trim().is_empty() {
            return Ok(None);
        }

        let score = outcome.overall_confidence * CONFIDENCE_WEIGHT + textproc::quality_score(&text);
        Ok(Some(Attempt { text, score }))
    }
}

/// Merge a region's attempts into the running line list. The winner's
/// lines are taken wholesale; the runner-up contributes only important
/// lines, and only when it scored close enough to the winner.
fn merge_region_attempts(merged: &mut Vec<String>, mut attempts: Vec<Attempt>, ratio: f32) {
    attempts.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut iter = attempts.into_iter();
    let Some(best) = iter.next() else {
        return;
    };

    let mut push_unique = |line: &str, merged: &mut Vec<String>| {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if merged.iter().any(|l| l.eq_ignore_ascii_case(trimmed)) {
            return;
        }
        merged.push(trimmed.to_string());
    };

    for line in best.text.lines() {
        push_unique(line, merged);
    }

    if let Some(second) = iter.next() {
        if second.score >= best.score * ratio {
            for line in second.text.lines() {
                if textproc::is_important_line(line) {
                    push_unique(line, merged);
                }
            }
        }
    }
}

/// Scale the decoded image to the working resolution: width clamped to
/// the configured band, multiplied by the scale factor, hard-capped.
fn working_buffer(decoded: &RasterBuffer, settings: &AnalysisSettings) -> RasterBuffer {
    let clamped = decoded.width().clamp(settings.min_width, settings.max_width);
    let target = ((clamped as f32 * settings.effective_scale()) as u32)
        .min(MAX_WORKING_WIDTH)
        .max(1);
    if target == decoded.width() {
        return decoded.clone();
    }
    let height = ((decoded.height() as f32 * target as f32 / decoded.width() as f32) as u32).max(1);
    decoded.resize(target, height)
}

/// Resolve the region list for the configured mode.
fn resolve_regions(working: &RasterBuffer, settings: &AnalysisSettings) -> Vec<FractionalRegion> {
    match settings.region_mode {
        RegionMode::Full => vec![FractionalRegion::full()],
        RegionMode::Manual => {
            // validate() guarantees the region is present and well-formed.
            vec![settings.manual_region.unwrap_or_else(FractionalRegion::full)]
        }
        RegionMode::Auto => {
            let mut regions =
                detect::detect_regions(working, settings.edge_threshold, settings.max_regions);
            regions.truncate(MAX_TOTAL_REGIONS);
            if regions.is_empty() {
                regions.push(FractionalRegion::full());
            }
            regions
        }
    }
}

fn report_progress(opts: &AnalyzeOptions, ratio: f32) {
    if let Some(progress) = &opts.progress {
        progress(ratio.clamp(0.0, 1.0));
    }
}
