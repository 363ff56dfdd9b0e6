// Token and entity extraction for the augmented export.
//
// Auxiliary analysis only: nothing here feeds the embeddings or the
// clustering. Tokens are lowercase alphabetic words with stop words removed
// and common inflections folded; entities are runs of capitalized words.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;
use stop_words::{get, LANGUAGE};

static STOP_WORDS: LazyLock<HashSet<String>> =
    LazyLock::new(|| get(LANGUAGE::English).into_iter().collect());

static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z]+(?:[ \t]+[A-Z][A-Za-z]+)*\b").expect("valid entity pattern")
});

/// Normalized view of one post's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    pub tokens: Vec<String>,
    pub entities: Vec<String>,
}

pub fn normalize(text: &str) -> Normalized {
    Normalized {
        tokens: tokens(text),
        entities: entities(text),
    }
}

/// Lemmatized, lowercased, stop-word-free alphabetic tokens in text order.
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(|w| lemmatize(&w))
        .collect()
}

/// Capitalized word runs that look like proper nouns, deduplicated in order
/// of first appearance. A lone capitalized stop word ("The", "Why") is skipped.
pub fn entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    CAPITALIZED_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|e| e.contains(' ') || !STOP_WORDS.contains(&e.to_lowercase()))
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

/// Fold plural and verb inflections with a handful of suffix rules.
pub fn lemmatize(word: &str) -> String {
    let len = word.chars().count();

    if len > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = word.strip_suffix("sses") {
        return format!("{stem}ss");
    }
    if len > 5 {
        if let Some(stem) = word.strip_suffix("ing") {
            return undouble(stem);
        }
    }
    if len > 4 {
        if let Some(stem) = word.strip_suffix("ed") {
            if !stem.ends_with('e') {
                return undouble(stem);
            }
        }
    }
    if len > 3
        && word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}

/// "runn" → "run", "stopp" → "stop". Leaves "ll"/"ss"/"zz" alone.
fn undouble(stem: &str) -> String {
    let mut chars = stem.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a == b && !matches!(a, 'l' | 's' | 'z') && !"aeiou".contains(a) => {
            stem[..stem.len() - a.len_utf8()].to_string()
        }
        _ => stem.to_string(),
    }
}
