//! End-to-end pipeline tests against the public API, using a scripted
//! in-process engine instead of a real OCR binary.

use async_trait::async_trait;
use bannerlens::engine::{EngineParams, RecognitionOutcome, RecognizedLine};
use bannerlens::pipeline::AnalyzeOptions;
use bannerlens::{
    AnalysisSettings, Analyzer, ImageSource, RasterBuffer, RecognitionEngine, Result, SkipReason,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Replays one fixed recognition outcome and counts calls.
struct ScriptedEngine {
    outcome: RecognitionOutcome,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn new(lines: &[(&str, f32)]) -> (Self, Arc<AtomicUsize>) {
        let recognized: Vec<RecognizedLine> = lines
            .iter()
            .map(|(t, c)| RecognizedLine {
                text: t.to_string(),
                confidence: *c,
            })
            .collect();
        let overall = if recognized.is_empty() {
            0.0
        } else {
            recognized.iter().map(|l| l.confidence).sum::<f32>() / recognized.len() as f32
        };
        let text = recognized
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                outcome: RecognitionOutcome {
                    text,
                    overall_confidence: overall,
                    lines: recognized,
                },
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn set_parameters(&mut self, _params: &EngineParams) -> Result<()> {
        Ok(())
    }

    async fn recognize(&mut self, _buffer: &RasterBuffer) -> Result<RecognitionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.clone())
    }
}

fn flat_png(width: u32, height: u32) -> Vec<u8> {
    let data = vec![220u8; (width * height * 4) as usize];
    RasterBuffer::from_rgba(width, height, data)
        .unwrap()
        .to_png()
        .unwrap()
}

fn busy_png(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = if (x + y) % 2 == 0 { 0 } else { 255 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    RasterBuffer::from_rgba(width, height, data)
        .unwrap()
        .to_png()
        .unwrap()
}

#[tokio::test]
async fn cache_idempotence_with_identical_suggestions() {
    let (engine, _) = ScriptedEngine::new(&[
        ("The Financial Reckoning", 91.0),
        ("SIGN UP", 88.0),
    ]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(220, 130));
    let settings = AnalysisSettings::default();

    let first = analyzer
        .analyze(&source, &settings, &AnalyzeOptions::default())
        .await
        .unwrap();
    let second = analyzer
        .analyze(&source, &settings, &AnalyzeOptions::default())
        .await
        .unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.alt_suggestions, second.alt_suggestions);
    assert_eq!(first.cta_suggestions, second.cta_suggestions);
    assert_eq!(first.name_suggestions, second.name_suggestions);
    assert_eq!(first.display_text, second.display_text);
}

#[tokio::test]
async fn changing_one_setting_invalidates_cache() {
    let (engine, calls) = ScriptedEngine::new(&[("LEARN MORE", 90.0)]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(220, 130));

    analyzer
        .analyze(&source, &AnalysisSettings::default(), &AnalyzeOptions::default())
        .await
        .unwrap();
    let after_first = calls.load(Ordering::SeqCst);

    let changed = AnalysisSettings {
        max_width: 1999,
        ..Default::default()
    };
    let result = analyzer
        .analyze(&source, &changed, &AnalyzeOptions::default())
        .await
        .unwrap();
    assert!(!result.cache_hit);
    assert!(calls.load(Ordering::SeqCst) > after_first);
}

#[tokio::test]
async fn near_blank_image_skips_without_engine_calls() {
    let (engine, calls) = ScriptedEngine::new(&[("ghost text", 99.0)]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(flat_png(300, 150));

    let result = analyzer
        .analyze(&source, &AnalysisSettings::default(), &AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(result.skipped, Some(SkipReason::LowTextLikelihood));
    assert!(result.alt_suggestions.is_empty());
    assert!(result.cta_suggestions.is_empty());
    assert!(result.name_suggestions.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_stops_engine_calls() {
    let (engine, calls) = ScriptedEngine::new(&[("whatever", 90.0)]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(220, 130));

    let opts = AnalyzeOptions::default();
    opts.cancel.cancel();

    let err = analyzer
        .analyze(&source, &AnalysisSettings::default(), &opts)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_recognition_yields_empty_suggestions_without_error() {
    let (engine, _) = ScriptedEngine::new(&[]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(220, 130));

    let result = analyzer
        .analyze(&source, &AnalysisSettings::default(), &AnalyzeOptions::default())
        .await
        .unwrap();

    assert!(result.display_text.is_empty());
    assert!(result.alt_suggestions.len() <= 3);
    assert!(result.cta_suggestions.len() <= 2);
    assert!(result.name_suggestions.len() <= 3);
    assert!(result.alt_suggestions.is_empty());
}

#[tokio::test]
async fn suggestion_cardinality_bounds_hold_on_busy_text() {
    let (engine, _) = ScriptedEngine::new(&[
        ("First headline here", 90.0),
        ("Second headline text", 90.0),
        ("Third headline again", 90.0),
        ("Fourth headline more", 90.0),
        ("CLICK HERE", 90.0),
        ("SHOP NOW", 90.0),
        ("SIGN UP", 90.0),
    ]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(220, 130));

    let result = analyzer
        .analyze(&source, &AnalysisSettings::default(), &AnalyzeOptions::default())
        .await
        .unwrap();

    assert!(result.alt_suggestions.len() <= 3);
    assert!(result.cta_suggestions.len() <= 2);
    assert!(result.name_suggestions.len() <= 3);
}

#[tokio::test]
async fn end_to_end_correction_and_suggestions() {
    let (engine, _) = ScriptedEngine::new(&[
        ("CLICK HEHE", 92.0),
        ("financial  reckoning", 88.0),
        ("aaaaaaaa", 90.0),
    ]);
    let mut analyzer = Analyzer::new(engine);
    let source = ImageSource::Bytes(busy_png(240, 140));

    let result = analyzer
        .analyze(&source, &AnalysisSettings::default(), &AnalyzeOptions::default())
        .await
        .unwrap();

    assert!(result.display_text.contains("CLICK HERE"));
    assert!(result.display_text.contains("financial reckoning"));
    assert!(!result.display_text.contains("aaaaaaaa"));
    assert_eq!(result.cta_suggestions, vec!["Go to link"]);
    assert_eq!(result.alt_suggestions, vec!["Financial reckoning"]);
}
