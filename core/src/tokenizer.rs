use crate::stemmer::stem;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","and","are","as","at","be","but","by",
            "for","from","had","has","have","he","if","in","into","is","it","its",
            "not","of","on","or","that","the","their","then","there","these","they","this","to",
            "was","when","which","who","will","with",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Split text into lowercase tokens: NFKC-normalize, lowercase, turn every
/// character that is not a letter, digit or whitespace into a space, split on
/// whitespace. No stopword removal or stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    NON_WORD
        .replace_all(&normalized, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Full analysis pipeline: tokenize, drop stopwords, stem. Order and
/// duplicates are kept.
pub fn analyze(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .map(|t| stem(&t))
        .collect()
}

/// The analyzer shared by indexing and querying so both sides produce the
/// same terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer;

impl Analyzer {
    pub fn new() -> Self { Self }

    pub fn analyze(&self, text: &str) -> Vec<String> { analyze(text) }

    /// Frequency of every distinct term in `text`.
    pub fn term_frequencies(&self, text: &str) -> BTreeMap<String, u32> {
        let mut tf: BTreeMap<String, u32> = BTreeMap::new();
        for term in analyze(text) {
            *tf.entry(term).or_insert(0) += 1;
        }
        tf
    }

    /// Distinct query terms in first-seen order.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        analyze(query).into_iter().filter(|t| seen.insert(t.clone())).collect()
    }
}
