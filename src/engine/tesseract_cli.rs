//! Subprocess tesseract engine
//!
//! Drives the external `tesseract` binary and parses its TSV output to get
//! per-line confidences. The binary is located once at construction; each
//! recognize call writes the buffer to a scratch PNG and runs one process.

use crate::engine::{EngineParams, PageSegMode, RecognitionEngine, RecognitionOutcome, RecognizedLine};
use crate::error::{AnalysisError, Result};
use crate::raster::RasterBuffer;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// TSV column layout emitted by `tesseract ... tsv`.
const TSV_COLUMNS: usize = 12;

/// OCR engine backed by the `tesseract` command line tool.
pub struct TesseractCli {
    binary: PathBuf,
    lang: String,
    params: EngineParams,
}

impl TesseractCli {
    /// Locate the tesseract binary on PATH and build a handle.
    pub fn locate(lang: &str) -> Result<Self> {
        let binary = which::which("tesseract")
            .map_err(|e| AnalysisError::Engine(format!("tesseract binary not found: {e}")))?;
        debug!("using tesseract at {:?}", binary);
        Ok(Self {
            binary,
            lang: lang.to_string(),
            params: EngineParams {
                page_seg_mode: PageSegMode::Block,
                char_whitelist: None,
            },
        })
    }

    /// Use an explicit binary path (tests, vendored installs).
    pub fn with_binary(binary: PathBuf, lang: &str) -> Self {
        Self {
            binary,
            lang: lang.to_string(),
            params: EngineParams {
                page_seg_mode: PageSegMode::Block,
                char_whitelist: None,
            },
        }
    }

    fn psm_flag(&self) -> &'static str {
        match self.params.page_seg_mode {
            PageSegMode::SingleLine => "7",
            PageSegMode::Block => "6",
        }
    }
}

#[async_trait]
impl RecognitionEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract-cli"
    }

    async fn set_parameters(&mut self, params: &EngineParams) -> Result<()> {
        // Subprocess engines carry no live state; parameters are applied on
        // the next invocation.
        self.params = params.clone();
        Ok(())
    }

    async fn recognize(&mut self, buffer: &RasterBuffer) -> Result<RecognitionOutcome> {
        let png = buffer.to_png()?;
        let scratch = tempfile::Builder::new()
            .prefix("bannerlens-")
            .suffix(".png")
            .tempfile()?;
        std::fs::write(scratch.path(), &png)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(scratch.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg(self.psm_flag());
        if let Some(whitelist) = &self.params.char_whitelist {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={whitelist}"));
        }
        cmd.arg("tsv").stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| AnalysisError::Engine(format!("failed to spawn tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&tsv))
    }
}

/// Fold word-level TSV rows into per-line results.
fn parse_tsv(tsv: &str) -> RecognitionOutcome {
    // Words belonging to one visual line share (block, paragraph, line).
    let mut lines: Vec<RecognizedLine> = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;
    let mut current_words: Vec<String> = Vec::new();
    let mut current_confs: Vec<f32> = Vec::new();

    let mut flush = |words: &mut Vec<String>, confs: &mut Vec<f32>, lines: &mut Vec<RecognizedLine>| {
        if words.is_empty() {
            return;
        }
        let confidence = confs.iter().sum::<f32>() / confs.len() as f32;
        lines.push(RecognizedLine {
            text: words.join(" "),
            confidence,
        });
        words.clear();
        confs.clear();
    };

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < TSV_COLUMNS {
            continue;
        }
        // level 5 = word
        if cols[0] != "5" {
            continue;
        }
        let key = (
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let word = cols[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }

        if current_key != Some(key) {
            flush(&mut current_words, &mut current_confs, &mut lines);
            current_key = Some(key);
        }
        current_words.push(word.to_string());
        current_confs.push(conf);
    }
    flush(&mut current_words, &mut current_confs, &mut lines);

    if lines.is_empty() {
        return RecognitionOutcome::default();
    }

    let overall = lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32;
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if overall.is_nan() {
        warn!("tesseract produced NaN confidence, treating output as empty");
        return RecognitionOutcome::default();
    }

    RecognitionOutcome {
        text,
        overall_confidence: overall,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t0\t0\t50\t20\t90.0\tCLICK\n\
             5\t1\t1\t1\t1\t2\t60\t0\t50\t20\t80.0\tHERE\n\
             5\t1\t1\t1\t2\t1\t0\t30\t90\t20\t70.0\tSummer\n"
        );
        let outcome = parse_tsv(&tsv);
        assert_eq!(outcome.lines.len(), 2);
        assert_eq!(outcome.lines[0].text, "CLICK HERE");
        assert!((outcome.lines[0].confidence - 85.0).abs() < 0.01);
        assert_eq!(outcome.lines[1].text, "Summer");
        assert_eq!(outcome.text, "CLICK HERE\nSummer");
    }

    #[test]
    fn test_parse_tsv_skips_non_word_rows_and_negative_conf() {
        let tsv = format!(
            "{HEADER}\n\
             4\t1\t1\t1\t1\t0\t0\t0\t100\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t0\t0\t50\t20\t-1\tghost\n\
             5\t1\t1\t1\t1\t2\t60\t0\t50\t20\t95.0\treal\n"
        );
        let outcome = parse_tsv(&tsv);
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].text, "real");
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        let outcome = parse_tsv(HEADER);
        assert!(outcome.text.is_empty());
        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.overall_confidence, 0.0);
    }
}
