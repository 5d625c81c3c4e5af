//! Resume keyword extraction
//!
//! Reduces extracted resume text to its most frequent meaningful words, which
//! are indexed as exact terms and searched with the highest keyword weight.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords kept per resume
pub const MAX_KEYWORDS: usize = 40;

static NON_WORD_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9+#. ]").expect("static regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9+#.]+").expect("static regex"));

static STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "down", "during", "each", "etc", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is",
    "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off",
    "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "to", "too", "under", "until", "up", "upon", "us", "very", "was", "we",
    "well", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "within",
    "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Most frequent words of `text`, lowercased, stopwords and words of two
/// characters or fewer removed. Ties keep first-occurrence order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let cleaned = NON_WORD_CHARS.replace_all(text, " ").to_lowercase();

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, word) in WORD
        .find_iter(&cleaned)
        .map(|m| m.as_str().trim_matches('.'))
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
        .enumerate()
    {
        counts.entry(word).or_insert((0, order)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts.into_iter().map(|(w, (n, first))| (w, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(w, _, _)| w.to_string())
        .collect()
}
