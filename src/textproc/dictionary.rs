//! Banner vocabulary
//!
//! Curated word and phrase sets tuned for marketing banner copy. Used for
//! spell correction targets, word-likeness scoring and call-to-action
//! detection. Deliberately small: a general English dictionary would make
//! the Levenshtein corrector far too eager.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Core banner dictionary: CTA verbs, common function words, domain terms.
/// Stored uppercase; lookups are case-insensitive.
static BANNER_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // CTA verbs and targets
        "CLICK", "LEARN", "READ", "SIGN", "SUBSCRIBE", "BUY", "SHOP", "VIEW",
        "HERE", "MORE", "NOW", "TODAY", "GET", "ORDER", "REGISTER", "BOOK",
        "JOIN", "START", "SAVE", "DISCOVER", "EXPLORE", "DOWNLOAD", "TRY",
        "WATCH", "LISTEN", "APPLY", "DONATE", "RENEW", "UPGRADE",
        // Offer vocabulary
        "FREE", "SALE", "OFFER", "DEAL", "LIMITED", "EXCLUSIVE", "SPECIAL",
        "DISCOUNT", "PERCENT", "ONLY", "ENDS", "SOON", "LAST", "CHANCE",
        // Domain terms
        "NEWSLETTER", "WEBINAR", "PODCAST", "REPORT", "GUIDE", "EVENT",
        "EDITION", "ISSUE", "DIGITAL", "ONLINE", "PREMIUM", "MEMBER",
        "MEMBERSHIP", "ACCESS", "STORY", "STORIES", "NEWS", "DAILY",
        "WEEKLY", "ANALYSIS", "INSIGHT", "FINANCIAL", "MARKET", "BUSINESS",
        "RECKONING",
        // Function words (4+ letters; short ones live in SHORT_WORDS)
        "THE", "AND", "FOR", "WITH", "YOUR", "FROM", "THIS", "THAT", "WHAT",
        "WHEN", "WHERE", "WHY", "HOW", "WHO", "BEST", "MOST", "EVERY",
        "ABOUT", "INTO", "OVER", "UNDER", "AFTER", "BEFORE", "NEVER",
        "ALWAYS", "JUST", "ALSO", "WILL", "HAVE", "BEEN", "THAN", "THEM",
        "THEY", "THEIR", "YOU", "OUR", "ALL", "NEW", "TOP",
    ]
    .into_iter()
    .collect()
});

/// 2-3 letter tokens accepted as real words ("AI" included deliberately).
static SHORT_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "AI", "OK", "GO", "WE", "US", "NO", "SO", "ON", "OR", "AN", "AT",
        "BY", "TO", "UP", "IS", "IT", "BE", "DO", "IF", "IN", "MY", "HE",
        "AS", "OF", "AM", "THE", "AND", "FOR", "NEW", "NOW", "GET", "OFF",
        "ALL", "OUT", "TOP", "BUY", "TRY", "OUR", "YOU", "ONE", "TWO",
        "PER", "DAY", "WIN", "HOT", "VIA", "SEE", "USE",
    ]
    .into_iter()
    .collect()
});

/// CTA phrase to suggested action label.
static CTA_ACTIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("CLICK HERE", "Go to link"),
        ("LEARN MORE", "Learn more"),
        ("READ MORE", "Read more"),
        ("READ NOW", "Read now"),
        ("SIGN UP", "Sign up"),
        ("SIGN UP NOW", "Sign up"),
        ("SUBSCRIBE", "Subscribe"),
        ("SUBSCRIBE NOW", "Subscribe"),
        ("BUY NOW", "Buy now"),
        ("SHOP NOW", "Shop now"),
        ("SHOP HERE", "Shop now"),
        ("VIEW MORE", "View more"),
        ("VIEW NOW", "View now"),
        ("GET STARTED", "Get started"),
        ("ORDER NOW", "Order now"),
        ("REGISTER NOW", "Register"),
        ("BOOK NOW", "Book now"),
    ]
    .into_iter()
    .collect()
});

/// Frequent systematic OCR confusions fixed verbatim after correction.
pub const POST_FIXES: &[(&str, &str)] = &[("AN AL", "AN AI"), ("THE AL", "THE AI"), ("0FF", "OFF")];

/// Case-insensitive membership in the banner dictionary (any length).
pub fn is_dictionary_word(token: &str) -> bool {
    let upper = token.to_uppercase();
    BANNER_WORDS.contains(upper.as_str()) || SHORT_WORDS.contains(upper.as_str())
}

/// Case-insensitive membership in the short-word allow-list.
pub fn is_short_word(token: &str) -> bool {
    SHORT_WORDS.contains(token.to_uppercase().as_str())
}

/// Number of dictionary words among a line's tokens.
pub fn dictionary_hits(tokens: &[String]) -> usize {
    tokens.iter().filter(|t| is_dictionary_word(t)).count()
}

/// The action label for the strongest CTA phrase contained in the line,
/// longest phrase first so "SIGN UP NOW" wins over "SIGN UP".
pub fn cta_action_for(line: &str) -> Option<&'static str> {
    let upper = line.to_uppercase();
    let mut best: Option<(&'static str, &'static str)> = None;
    for (&phrase, &action) in CTA_ACTIONS.iter() {
        if upper.contains(phrase) {
            match best {
                Some((current, _)) if current.len() >= phrase.len() => {}
                _ => best = Some((phrase, action)),
            }
        }
    }
    best.map(|(_, action)| action)
}

/// Whether the line contains any curated CTA phrase.
pub fn has_cta_phrase(line: &str) -> bool {
    cta_action_for(line).is_some()
}

/// Iterator over the dictionary, used by the token splitter.
pub fn all_words() -> impl Iterator<Item = &'static str> {
    BANNER_WORDS.iter().chain(SHORT_WORDS.iter()).copied()
}
