//! Text post-processing
//!
//! Turns raw OCR output into clean display text plus scored, classified
//! lines for the suggestion layer. Stages: whitespace and quote
//! normalization, noise filters, case-insensitive dedupe, word-likeness
//! checks, classification and scoring. Spell correction runs before
//! classification so fixed phrases classify correctly.

pub mod dictionary;
pub mod spell;

use serde::Serialize;
use tracing::trace;

/// Lines longer than this are OCR smear, not banner copy.
const MAX_LINE_LEN: usize = 320;
/// Fraction of non-alphanumeric characters above which a line is noise.
const MAX_SYMBOL_FRACTION: f32 = 0.45;
/// A character repeated this many times in a row marks a junk line.
const REPEAT_RUN_LEN: usize = 6;

/// What a cleaned line is, for the suggestion layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    Junk,
    Content,
    CallToAction,
    Year,
}

/// One cleaned line with its classification and salience score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredLine {
    pub text: String,
    pub class: LineClass,
    pub score: f32,
}

/// Post-processing controls, derived from the analysis settings.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub spell_correct: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self { spell_correct: true }
    }
}

/// Output of the cleaning pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProcessedText {
    /// Cleaned, deduplicated, noise-filtered text for display.
    pub display_text: String,
    /// Spell-corrected but unfiltered text, for debugging and the cache.
    pub raw_corrected_text: String,
    /// Surviving lines in input order, scored and classified.
    pub lines: Vec<ScoredLine>,
}

/// Confidence floors for admitting a recognized line, in engine units
/// (0-100). Derived from settings by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionThresholds {
    /// Ordinary lines.
    pub general: f32,
    /// Lines that look important (CTA phrasing, years, label-like text).
    pub important: f32,
    /// Very short lines with no dictionary hits, which engines routinely
    /// hallucinate at moderate confidence.
    pub short: f32,
}

/// Run the full cleaning pipeline over raw OCR text.
pub fn process(raw: &str, opts: ProcessOptions) -> ProcessedText {
    let normalized: Vec<String> = raw
        .lines()
        .map(normalize_line)
        .filter(|l| !l.is_empty())
        .collect();

    let corrected: Vec<String> = if opts.spell_correct {
        normalized.iter().map(|l| correct_line(l)).collect()
    } else {
        normalized
    };
    let raw_corrected_text = corrected.join("\n");

    let mut seen: Vec<String> = Vec::new();
    let mut lines: Vec<ScoredLine> = Vec::new();
    for line in &corrected {
        if is_noise_line(line) {
            trace!(line, "dropped noise line");
            continue;
        }
        let lower = line.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        let tokens = tokenize(line);
        if !passes_word_likeness(line, &tokens) {
            trace!(line, "dropped non-word-like line");
            continue;
        }
        let class = classify_line(line);
        let score = score_line(line, &tokens);
        lines.push(ScoredLine {
            text: line.clone(),
            class,
            score,
        });
    }

    let display_text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    ProcessedText {
        display_text,
        raw_corrected_text,
        lines,
    }
}

/// Collapse whitespace and straighten curly quotes.
fn normalize_line(line: &str) -> String {
    let straightened: String = line
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c if c.is_whitespace() => ' ',
            c => c,
        })
        .collect();
    straightened.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Spell-correct one line token by token, then try splitting glued tokens
/// and apply the fixed-phrase replacements.
fn correct_line(line: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for token in line.split(' ') {
        let corrected = spell::correct_token(token);
        if let Some(split) = spell::split_glued_token(&corrected) {
            out.push(split);
        } else {
            out.push(corrected);
        }
    }
    spell::apply_post_fixes(&out.join(" "))
}

fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(|t| t.to_string()).collect()
}

/// Hard noise filters applied before any scoring.
fn is_noise_line(line: &str) -> bool {
    let len = line.chars().count();
    if len < 2 || len > MAX_LINE_LEN {
        return true;
    }
    if looks_like_href(line) {
        return true;
    }
    if has_repeat_run(line) {
        return true;
    }
    non_alnum_fraction(line) > MAX_SYMBOL_FRACTION
}

fn looks_like_href(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("http") || lower.contains("www.") || lower.contains("://") || lower.contains("href")
}

/// True when any character repeats `REPEAT_RUN_LEN` or more times in a row.
fn has_repeat_run(line: &str) -> bool {
    let mut run = 0usize;
    let mut prev: Option<char> = None;
    for c in line.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= REPEAT_RUN_LEN {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

/// Fraction of non-space characters that are neither letters nor digits.
fn non_alnum_fraction(line: &str) -> f32 {
    let mut total = 0usize;
    let mut symbols = 0usize;
    for c in line.chars() {
        if c == ' ' {
            continue;
        }
        total += 1;
        if !c.is_alphanumeric() {
            symbols += 1;
        }
    }
    if total == 0 {
        1.0
    } else {
        symbols as f32 / total as f32
    }
}

/// Whether a token reads as a real word: a 4-digit year, a known short
/// word, or four-plus letters with a plausible vowel ratio.
pub fn is_word_like_token(token: &str) -> bool {
    if is_year_token(token) {
        return true;
    }
    if dictionary::is_short_word(token) {
        return true;
    }
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 4 {
        return false;
    }
    let vowels = letters
        .iter()
        .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y'))
        .count();
    let ratio = vowels as f32 / letters.len() as f32;
    (0.1..=0.8).contains(&ratio)
}

fn is_year_token(token: &str) -> bool {
    // Strip surrounding punctuation only; "(2024)" is a year, "in 2024"
    // is not.
    let t = token.trim_matches(|c: char| !c.is_alphanumeric());
    t.len() == 4
        && t.chars().all(|c| c.is_ascii_digit())
        && (t.starts_with("19") || t.starts_with("20"))
}

/// Line-level word-likeness gates. Lines with several tokens need a
/// majority of word-like ones; single tokens need enough letters to mean
/// something.
fn passes_word_likeness(line: &str, tokens: &[String]) -> bool {
    let word_like = tokens.iter().filter(|t| is_word_like_token(t)).count();
    if tokens.len() >= 4 && (word_like as f32) < tokens.len() as f32 * 0.5 {
        return false;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    if tokens.len() >= 8 && letters < 18 {
        return false;
    }
    if tokens.len() == 1 {
        let alnum = count_alphanumeric(line);
        return alnum >= 3 && (letters >= 4 || is_year_token(&tokens[0]) || word_like == 1);
    }
    true
}

/// Classify a cleaned line for the suggestion layer.
pub fn classify_line(line: &str) -> LineClass {
    let trimmed = line.trim();
    if is_year_token(trimmed) {
        return LineClass::Year;
    }
    let lower = trimmed.to_lowercase();
    if dictionary::has_cta_phrase(trimmed) || lower.contains("click") || lower.contains("subscribe")
    {
        return LineClass::CallToAction;
    }
    LineClass::Content
}

/// Salience score used to rank lines for alt-text.
pub fn score_line(line: &str, tokens: &[String]) -> f32 {
    let alnum = count_alphanumeric(line) as f32;
    let mut score = alnum * 0.5 + (tokens.len().min(10) as f32) * 6.0;

    let len = line.chars().count();
    score += if (10..=90).contains(&len) {
        18.0
    } else if (4..10).contains(&len) || (91..=160).contains(&len) {
        8.0
    } else {
        -8.0
    };

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if !letters.is_empty() && letters.iter().all(|c| c.is_uppercase()) {
        score += 18.0;
    } else if is_title_case(tokens) {
        score += 10.0;
    }

    let symbols = line
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count() as f32;
    score - symbols * 2.0
}

fn is_title_case(tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return false;
    }
    let capitalized = tokens
        .iter()
        .filter(|t| {
            let mut chars = t.chars();
            matches!(chars.next(), Some(c) if c.is_uppercase())
                && chars.all(|c| !c.is_uppercase())
        })
        .count();
    capitalized * 2 > tokens.len()
}

/// Lines the pipeline should be reluctant to discard on confidence alone.
pub fn is_important_line(line: &str) -> bool {
    let trimmed = line.trim();
    if dictionary::has_cta_phrase(trimmed) || is_year_token(trimmed) {
        return true;
    }
    if trimmed.ends_with(':') {
        return true;
    }
    dictionary::dictionary_hits(&tokenize(trimmed)) >= 2
}

/// Confidence gate for one recognized line.
pub fn admit_line(line: &str, confidence: f32, thresholds: &AdmissionThresholds) -> bool {
    if is_important_line(line) {
        return confidence >= thresholds.important;
    }
    let tokens = tokenize(line);
    let hits = dictionary::dictionary_hits(&tokens);
    if count_alphanumeric(line) < 6 && hits == 0 {
        return confidence >= thresholds.short;
    }
    confidence >= thresholds.general
}

/// Alphanumeric character count, used for fallback and gating decisions.
pub fn count_alphanumeric(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}

/// Heuristic quality of an OCR attempt's text, in roughly the same scale
/// as engine confidence. Rewards word-like tokens, punishes symbol soup
/// and repeated-character smear.
pub fn quality_score(text: &str) -> f32 {
    let mut word_like = 0usize;
    let mut symbols = 0usize;
    let mut smear_lines = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if has_repeat_run(line) {
            smear_lines += 1;
        }
        for token in line.split_whitespace() {
            if is_word_like_token(token) {
                word_like += 1;
            }
        }
        symbols += line
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
    }

    let mut score = (word_like.min(20) as f32) * 4.0;
    score -= (symbols as f32 * 1.5).min(30.0);
    score -= smear_lines as f32 * 10.0;
    if count_alphanumeric(text) < 4 {
        score -= 20.0;
    }
    score.clamp(-40.0, 120.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  financial \t reckoning "), "financial reckoning");
        assert_eq!(normalize_line("\u{201C}hi\u{201D} it\u{2019}s"), "\"hi\" it's");
    }

    #[test]
    fn test_noise_filters() {
        assert!(is_noise_line("a"));
        assert!(is_noise_line("aaaaaaaa"));
        assert!(is_noise_line("visit https://example.com"));
        assert!(is_noise_line("#$%^&*!!"));
        assert!(!is_noise_line("CLICK HERE"));
    }

    #[test]
    fn test_word_like_tokens() {
        assert!(is_word_like_token("reckoning"));
        assert!(is_word_like_token("2024"));
        assert!(is_word_like_token("AI"));
        assert!(!is_word_like_token("XQZJKL"));
        assert!(!is_word_like_token("zx"));
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_line("CLICK HERE"), LineClass::CallToAction);
        assert_eq!(classify_line("Subscribe today"), LineClass::CallToAction);
        assert_eq!(classify_line("2024"), LineClass::Year);
        assert_eq!(classify_line("(2025)"), LineClass::Year);
        assert_eq!(classify_line("Sale ends in 2024"), LineClass::Content);
        assert_eq!(classify_line("Financial reckoning"), LineClass::Content);
    }

    #[test]
    fn test_scoring_prefers_real_headlines() {
        let headline = "The Financial Reckoning";
        let junk = "x@ ## yz";
        let h = score_line(headline, &tokenize(headline));
        let j = score_line(junk, &tokenize(junk));
        assert!(h > j);
    }

    #[test]
    fn test_all_caps_bonus() {
        let caps = score_line("CLICK HERE NOW", &tokenize("CLICK HERE NOW"));
        let plain = score_line("click here now", &tokenize("click here now"));
        assert!(caps > plain);
    }

    #[test]
    fn test_process_end_to_end() {
        let raw = "CLICK HEHE\nfinancial  reckoning\naaaaaaaa";
        let out = process(raw, ProcessOptions::default());
        assert_eq!(out.lines.len(), 2);
        assert_eq!(out.lines[0].text, "CLICK HERE");
        assert_eq!(out.lines[0].class, LineClass::CallToAction);
        assert_eq!(out.lines[1].text, "financial reckoning");
        assert_eq!(out.lines[1].class, LineClass::Content);
        assert_eq!(out.display_text, "CLICK HERE\nfinancial reckoning");
        // raw corrected keeps everything, corrected, before filtering
        assert!(out.raw_corrected_text.contains("aaaaaaaa"));
    }

    #[test]
    fn test_process_dedupes_case_insensitively() {
        let raw = "Shop Now\nSHOP NOW\nshop now";
        let out = process(raw, ProcessOptions { spell_correct: false });
        assert_eq!(out.lines.len(), 1);
    }

    #[test]
    fn test_process_without_spell_correction() {
        let raw = "CLICK HEHE";
        let out = process(raw, ProcessOptions { spell_correct: false });
        assert_eq!(out.lines[0].text, "CLICK HEHE");
    }

    #[test]
    fn test_important_lines() {
        assert!(is_important_line("LEARN MORE"));
        assert!(is_important_line("2025"));
        assert!(is_important_line("Inside this issue:"));
        assert!(!is_important_line("qwtx brrn"));
    }

    #[test]
    fn test_admission_thresholds() {
        let t = AdmissionThresholds {
            general: 62.0,
            important: 42.0,
            short: 85.0,
        };
        // important line admitted at lower confidence
        assert!(admit_line("CLICK HERE", 50.0, &t));
        // ordinary line needs the general floor
        assert!(!admit_line("a longer ordinary sentence", 50.0, &t));
        assert!(admit_line("a longer ordinary sentence", 70.0, &t));
        // short garbage needs near certainty
        assert!(!admit_line("qz!", 70.0, &t));
    }

    #[test]
    fn test_quality_score_ranks_text() {
        let good = quality_score("The Financial Reckoning\nSubscribe today");
        let bad = quality_score("@#$ |||| aaaaaaaa");
        assert!(good > bad);
    }
}
