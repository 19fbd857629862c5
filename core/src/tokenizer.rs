use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Normalization policy; stored in every index so queries match documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens shorter than this (in chars) are discarded.
    pub min_token_len: usize,
    /// Apply English Snowball stemming after stop-word removal.
    pub stem: bool,
    pub default_stopwords: bool,
    /// Additional stop words, matched after lowercasing.
    pub extra_stopwords: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { min_token_len: 2, stem: false, default_stopwords: true, extra_stopwords: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    config: TokenizerConfig,
    extra: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(TokenizerConfig::default()) }
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let extra = config.extra_stopwords.iter().map(|w| w.to_lowercase()).collect();
        Self { config, extra }
    }

    fn is_stopword(&self, token: &str) -> bool {
        (self.config.default_stopwords && STOPWORDS.contains(token)) || self.extra.contains(token)
    }

    /// Tokenize text into (term, position) using NFKC normalization, lowercase,
    /// splitting on non-alphanumeric boundaries, length and stop-word filtering,
    /// and optional stemming. Positions count every raw token, kept or not.
    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if token.chars().count() < self.config.min_token_len { continue; }
            if self.is_stopword(token) { continue; }
            let term = if self.config.stem { STEMMER.stem(token).into_owned() } else { token.to_string() };
            tokens.push((term, pos));
        }
        tokens
    }

    /// Terms only, in text order, duplicates kept.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|(t, _)| t).collect()
    }
}

/// Tokenize with the default policy.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    Tokenizer::default().tokenize(text)
}
