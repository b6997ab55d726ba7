//! Spell correction for OCR output
//!
//! Conservative fixes for systematic OCR confusions: digit glyphs standing
//! in for letters, near-miss tokens one or two edits from a known banner
//! word, and glued tokens that split cleanly into dictionary words. A token
//! that cannot be confidently corrected is returned unchanged.

use crate::textproc::dictionary;
use std::collections::HashMap;
use strsim::levenshtein;

/// Maximum parts a glued token may split into.
const MAX_SPLIT_PARTS: usize = 4;

/// Replace glyphs that OCR commonly confuses with letters: digit
/// stand-ins (0/1/5/8) in mostly-letter tokens, and lowercase 'l' for 'I'
/// in mostly-uppercase tokens.
pub fn normalize_glyphs(token: &str) -> String {
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    let uppers = token.chars().filter(|c| c.is_uppercase()).count();

    let map_digits = letters > 0 && digits > 0 && digits <= letters;
    let map_ell = uppers > letters - uppers && token.contains('l');
    if !map_digits && !map_ell {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| match c {
            '0' if map_digits => 'O',
            '1' if map_digits => 'I',
            '5' if map_digits => 'S',
            '8' if map_digits => 'B',
            'l' if map_ell => 'I',
            other => other,
        })
        .collect()
}

/// A lower-to-upper transition inside the token ("cLick", "SaLE").
fn has_case_shift(token: &str) -> bool {
    let mut prev_lower = false;
    for c in token.chars().filter(|c| c.is_alphabetic()) {
        if c.is_uppercase() && prev_lower {
            return true;
        }
        prev_lower = c.is_lowercase();
    }
    false
}

/// Adjacent I/l glyphs with at least one lowercase 'l' in a
/// mostly-uppercase token ("CIVIl", "BIll").
fn has_il_run(token: &str) -> bool {
    let uppers = token.chars().filter(|c| c.is_uppercase()).count();
    let lowers = token.chars().filter(|c| c.is_lowercase()).count();
    if uppers <= lowers {
        return false;
    }
    token
        .chars()
        .zip(token.chars().skip(1))
        .any(|(a, b)| matches!(a, 'I' | 'l') && matches!(b, 'I' | 'l') && (a == 'l' || b == 'l'))
}

/// Whether a token looks like an OCR misread worth correcting: mixed
/// digits and letters, stray pipes, internal case shifts, repeated I/l
/// glyphs, or an uppercase token the dictionary does not know.
fn is_suspicious(token: &str) -> bool {
    if token.contains('|') {
        return true;
    }
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    if letters > 0 && digits > 0 {
        return true;
    }
    if has_case_shift(token) || has_il_run(token) {
        return true;
    }
    let all_upper = letters > 0 && token.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
    all_upper && !dictionary::is_dictionary_word(token)
}

/// Correct a single token against the banner dictionary.
///
/// Dictionary words and unsuspicious tokens pass through untouched. For
/// suspicious tokens the nearest dictionary word within the edit budget
/// wins; ties prefer a candidate of equal length. Tokens shorter than four
/// characters are never edited, only glyph-normalized.
pub fn correct_token(token: &str) -> String {
    let normalized = normalize_glyphs(token);
    if dictionary::is_dictionary_word(&normalized) {
        // A clean dictionary hit passes through; a glyph-mangled or
        // case-shifted one ("CLlCK", "SaLE") is re-cased to the match.
        if normalized == token && !has_case_shift(token) {
            return token.to_string();
        }
        return match_case(token, &normalized);
    }
    if normalized.chars().count() < 4 || !is_suspicious(&normalized) {
        return normalized;
    }

    let upper = normalized.to_uppercase();
    let budget = if upper.len() <= 5 { 1 } else { 2 };
    let mut best: Option<(&'static str, usize)> = None;
    for word in dictionary::all_words() {
        if word.len().abs_diff(upper.len()) > budget {
            continue;
        }
        let dist = levenshtein(&upper, word);
        if dist == 0 || dist > budget {
            continue;
        }
        best = match best {
            None => Some((word, dist)),
            Some((cur, cur_dist)) => {
                if dist < cur_dist
                    || (dist == cur_dist
                        && word.len() == upper.len()
                        && cur.len() != upper.len())
                {
                    Some((word, dist))
                } else {
                    Some((cur, cur_dist))
                }
            }
        };
    }

    match best {
        Some((word, _)) => match_case(token, word),
        None => normalized,
    }
}

/// Reshape a corrected word to the casing of the original token.
fn match_case(original: &str, corrected: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    let uppers = letters.iter().filter(|c| c.is_uppercase()).count();
    let all_lower = !letters.is_empty() && uppers == 0;
    // Majority-uppercase originals are treated as shouting even when a
    // stray glyph broke the run ("CLlCK").
    if uppers * 2 > letters.len() {
        corrected.to_uppercase()
    } else if all_lower {
        corrected.to_lowercase()
    } else {
        // Mixed case: title-case the correction.
        let mut chars = corrected.to_lowercase().chars().collect::<Vec<_>>();
        if let Some(first) = chars.first_mut() {
            *first = first.to_ascii_uppercase();
        }
        chars.into_iter().collect()
    }
}

/// Split a glued all-letters token into known dictionary words.
///
/// Returns the space-joined split only when the whole token decomposes
/// into at least two dictionary words in at most [`MAX_SPLIT_PARTS`]
/// parts. Longest-prefix-first search with memoized failures keeps the
/// worst case linear in practice.
pub fn split_glued_token(token: &str) -> Option<String> {
    let upper = token.to_uppercase();
    if upper.len() < 5 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if dictionary::is_dictionary_word(&upper) {
        return None;
    }
    let mut dead_ends: HashMap<usize, bool> = HashMap::new();
    let parts = split_from(&upper, 0, MAX_SPLIT_PARTS, &mut dead_ends)?;
    if parts.len() < 2 {
        return None;
    }
    Some(parts.join(" "))
}

fn split_from(
    token: &str,
    start: usize,
    parts_left: usize,
    dead_ends: &mut HashMap<usize, bool>,
) -> Option<Vec<String>> {
    if start == token.len() {
        return Some(Vec::new());
    }
    if parts_left == 0 || dead_ends.get(&start).copied().unwrap_or(false) {
        return None;
    }
    let rest = &token[start..];
    // Longest prefix first so "CLICKHERE" yields CLICK+HERE, not shorter
    // fragments.
    for end in (2..=rest.len()).rev() {
        let prefix = &rest[..end];
        if !dictionary::is_dictionary_word(prefix) {
            continue;
        }
        if let Some(mut tail) = split_from(token, start + end, parts_left - 1, dead_ends) {
            let mut out = vec![prefix.to_string()];
            out.append(&mut tail);
            return Some(out);
        }
    }
    dead_ends.insert(start, true);
    None
}

/// Apply the fixed-phrase replacements for confusions the per-token
/// corrector cannot see.
pub fn apply_post_fixes(text: &str) -> String {
    let mut out = text.to_string();
    for (from, to) in dictionary::POST_FIXES {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}
