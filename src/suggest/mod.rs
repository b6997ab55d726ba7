//! Suggestion extraction
//!
//! Derives alt-text candidates, call-to-action labels and filename slugs
//! from the scored lines produced by text post-processing. Everything here
//! is deterministic string work; no image access.

use crate::textproc::{dictionary, LineClass, ScoredLine};
use serde::Serialize;

/// Alt text is clipped to this length at a word boundary.
const ALT_MAX_LEN: usize = 125;
const MAX_ALT: usize = 3;
const MAX_CTA: usize = 2;
const MAX_NAMES: usize = 3;

/// Leading filler stripped from alt-text candidates.
const FILLER_PREFIXES: &[&str] = &["the", "a", "an", "of", "our", "your", "this"];

/// Redundant nouns a screen reader already implies.
const FILLER_NOUNS: &[&str] = &["image", "photo", "picture", "icon", "logo", "graphic"];

/// Suggestions derived from one analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Suggestions {
    /// Up to three alt-text candidates, best first.
    pub alt: Vec<String>,
    /// Up to two call-to-action labels.
    pub cta: Vec<String>,
    /// Up to three filename slugs.
    pub names: Vec<String>,
}

/// Build all suggestion groups from scored lines.
pub fn build(lines: &[ScoredLine]) -> Suggestions {
    Suggestions {
        alt: alt_suggestions(lines),
        cta: cta_suggestions(lines),
        names: name_suggestions(lines),
    }
}

/// Content lines ranked by score, cleaned up for use as alt text.
fn alt_suggestions(lines: &[ScoredLine]) -> Vec<String> {
    let mut candidates: Vec<&ScoredLine> = lines
        .iter()
        .filter(|l| l.class == LineClass::Content)
        .collect();
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<String> = Vec::new();
    for line in candidates {
        let text = sentence_case(&strip_filler(&line.text));
        let text = truncate_at_word(&text, ALT_MAX_LEN);
        if text.chars().filter(|c| c.is_alphabetic()).count() < 3 {
            continue;
        }
        if out.iter().any(|existing| existing.eq_ignore_ascii_case(&text)) {
            continue;
        }
        out.push(text);
        if out.len() == MAX_ALT {
            break;
        }
    }
    out
}

/// Action labels for CTA lines. When a banner clearly has a clickable
/// feel but no curated phrase matched, fall back to the generic label.
fn cta_suggestions(lines: &[ScoredLine]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines.iter().filter(|l| l.class == LineClass::CallToAction) {
        let action = dictionary::cta_action_for(&line.text)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let lower = line.text.to_lowercase();
                if lower.contains("subscribe") {
                    "Subscribe".to_string()
                } else {
                    "Go to link".to_string()
                }
            });
        if !out.iter().any(|existing| existing == &action) {
            out.push(action);
        }
        if out.len() == MAX_CTA {
            break;
        }
    }
    out
}

/// Filename stems: single lowercase words drawn from the best content and
/// CTA lines, best line first.
fn name_suggestions(lines: &[ScoredLine]) -> Vec<String> {
    let mut ranked: Vec<&ScoredLine> = lines
        .iter()
        .filter(|l| matches!(l.class, LineClass::Content | LineClass::CallToAction))
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<String> = Vec::new();
    for line in ranked {
        for word in line.text.split_whitespace() {
            let stem = slug_word(word);
            let len = stem.chars().count();
            if !(3..=20).contains(&len) {
                continue;
            }
            if FILLER_PREFIXES.contains(&stem.as_str()) || FILLER_NOUNS.contains(&stem.as_str()) {
                continue;
            }
            if !out.contains(&stem) {
                out.push(stem);
            }
            if out.len() == MAX_NAMES {
                return out;
            }
        }
    }
    out
}

/// Lowercase a word, dropping everything non-alphanumeric.
fn slug_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Drop leading filler words and redundant nouns ("the image of ...")
/// while more than one word remains.
fn strip_filler(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while words.len() > 1 {
        let first = words[0].to_lowercase();
        if FILLER_PREFIXES.contains(&first.as_str()) || FILLER_NOUNS.contains(&first.as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }
    words.join(" ")
}

/// First letter uppercase, the rest untouched unless the line is shouting.
fn sentence_case(text: &str) -> String {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let shouting = !letters.is_empty() && letters.iter().all(|c| c.is_uppercase());
    let base = if shouting { text.to_lowercase() } else { text.to_string() };
    let mut chars: Vec<char> = base.chars().collect();
    if let Some(first) = chars.iter_mut().find(|c| c.is_alphabetic()) {
        *first = first.to_uppercase().next().unwrap_or(*first);
    }
    chars.into_iter().collect()
}

/// Cut at the last word boundary within `max` characters.
fn truncate_at_word(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max).collect();
    match clipped.rfind(' ') {
        Some(pos) if pos > 0 => clipped[..pos].to_string(),
        _ => clipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, class: LineClass, score: f32) -> ScoredLine {
        ScoredLine {
            text: text.to_string(),
            class,
            score,
        }
    }

    #[test]
    fn test_alt_ranked_by_score_and_sentence_cased() {
        let lines = vec![
            line("financial reckoning", LineClass::Content, 50.0),
            line("THE BIG STORY", LineClass::Content, 80.0),
            line("CLICK HERE", LineClass::CallToAction, 90.0),
        ];
        let s = build(&lines);
        assert_eq!(s.alt[0], "Big story");
        assert_eq!(s.alt[1], "Financial reckoning");
    }

    #[test]
    fn test_alt_capped_at_three() {
        let lines: Vec<ScoredLine> = (0..6)
            .map(|i| line(&format!("headline number {i}"), LineClass::Content, i as f32))
            .collect();
        assert_eq!(build(&lines).alt.len(), 3);
    }

    #[test]
    fn test_alt_truncates_at_word_boundary() {
        let long = "word ".repeat(40);
        let lines = vec![line(long.trim(), LineClass::Content, 10.0)];
        let alt = &build(&lines).alt[0];
        assert!(alt.chars().count() <= ALT_MAX_LEN);
        assert!(!alt.ends_with(' '));
        assert!(alt.ends_with("word"));
    }

    #[test]
    fn test_cta_mapping() {
        let lines = vec![line("CLICK HERE", LineClass::CallToAction, 90.0)];
        assert_eq!(build(&lines).cta, vec!["Go to link"]);
    }

    #[test]
    fn test_cta_deduped_and_capped() {
        let lines = vec![
            line("CLICK HERE", LineClass::CallToAction, 90.0),
            line("click here please", LineClass::CallToAction, 80.0),
            line("SHOP NOW", LineClass::CallToAction, 70.0),
            line("SIGN UP", LineClass::CallToAction, 60.0),
        ];
        let s = build(&lines);
        assert_eq!(s.cta, vec!["Go to link", "Shop now"]);
    }

    #[test]
    fn test_names_are_single_lowercase_words() {
        let lines = vec![line("The Financial Story!", LineClass::Content, 50.0)];
        let s = build(&lines);
        assert_eq!(s.names, vec!["financial", "story"]);
    }

    #[test]
    fn test_names_skip_short_and_filler_words() {
        let lines = vec![
            line("Go to our Webinar", LineClass::Content, 60.0),
            line("image of a Podcast", LineClass::Content, 50.0),
        ];
        let s = build(&lines);
        assert_eq!(s.names, vec!["webinar", "podcast"]);
    }

    #[test]
    fn test_names_capped_at_three() {
        let lines = vec![line(
            "financial reckoning newsletter edition weekly",
            LineClass::Content,
            50.0,
        )];
        assert_eq!(build(&lines).names.len(), 3);
    }

    #[test]
    fn test_strip_filler_removes_leading_noise() {
        assert_eq!(strip_filler("the image of Summer Sale"), "Summer Sale");
        assert_eq!(strip_filler("Summer Sale"), "Summer Sale");
        // never strips down to nothing
        assert_eq!(strip_filler("image"), "image");
    }

    #[test]
    fn test_empty_input_yields_empty_suggestions() {
        let s = build(&[]);
        assert!(s.alt.is_empty());
        assert!(s.cta.is_empty());
        assert!(s.names.is_empty());
    }
}
