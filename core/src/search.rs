use crate::error::SearchError;
use crate::index::{DocId, SearchIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How document frequency discounts common terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdfMode {
    /// Plain term frequency.
    Off,
    /// `ln(N / df)`. A term present in every document contributes zero.
    Standard,
    /// `ln(1 + N / df)`. Always positive.
    #[default]
    Smoothed,
}

impl IdfMode {
    pub fn weight(self, num_docs: usize, doc_freq: usize) -> f32 {
        let n = num_docs.max(1) as f32;
        let df = doc_freq.max(1) as f32;
        match self {
            IdfMode::Off => 1.0,
            IdfMode::Standard => (n / df).ln(),
            IdfMode::Smoothed => (1.0 + n / df).ln(),
        }
    }
}

impl FromStr for IdfMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(IdfMode::Off),
            "standard" => Ok(IdfMode::Standard),
            "smoothed" => Ok(IdfMode::Smoothed),
            other => Err(format!("unknown idf mode {other:?} (expected off, standard or smoothed)")),
        }
    }
}

impl fmt::Display for IdfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdfMode::Off => "off",
            IdfMode::Standard => "standard",
            IdfMode::Smoothed => "smoothed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub limit: usize,
    /// Fail with [`SearchError::InvalidQuery`] instead of returning nothing
    /// when the query has no searchable terms.
    pub require_terms: bool,
    pub idf: IdfMode,
    /// Distinct query terms beyond this many are ignored.
    pub max_terms: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { limit: 10, require_terms: false, idf: IdfMode::default(), max_terms: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub terms: Vec<String>,
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,
}

/// Distinct query terms in first-occurrence order, normalized with the
/// index's own tokenizer.
pub fn query_terms(index: &SearchIndex, query: &str, max_terms: usize) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in index.tokenizer().terms(query) {
        if terms.len() >= max_terms {
            break;
        }
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id))
}

/// Score = sum over distinct query terms of weighted tf × idf; ties go to the
/// lower document id.
pub fn search_page(index: &SearchIndex, query: &str, opts: &SearchOptions) -> Result<SearchPage, SearchError> {
    let terms = query_terms(index, query, opts.max_terms);
    if terms.is_empty() {
        if opts.require_terms {
            return Err(SearchError::InvalidQuery { query: query.to_string() });
        }
        return Ok(SearchPage { terms, hits: Vec::new(), total_hits: 0 });
    }

    let n = index.num_docs();
    let mut scores: HashMap<DocId, f32> = HashMap::new();
    for term in &terms {
        let list = index.postings(term);
        if list.is_empty() {
            continue;
        }
        let idf = opts.idf.weight(n, list.len());
        for p in list {
            *scores.entry(p.doc_id).or_insert(0.0) += p.weight * idf;
        }
    }

    let mut hits: Vec<SearchHit> = scores.into_iter().map(|(doc_id, score)| SearchHit { doc_id, score }).collect();
    let total_hits = hits.len();
    hits.sort_by(rank);
    hits.truncate(opts.limit);
    if let Some(hit) = hits.iter().find(|hit| hit.doc_id as usize >= n) {
        panic!("posting references missing document {}", hit.doc_id);
    }
    tracing::debug!(query, terms = terms.len(), total_hits, returned = hits.len(), "search");
    Ok(SearchPage { terms, hits, total_hits })
}

pub fn search_with(index: &SearchIndex, query: &str, opts: &SearchOptions) -> Result<Vec<SearchHit>, SearchError> {
    search_page(index, query, opts).map(|page| page.hits)
}

/// Ranked hits with default options. Queries without searchable terms return
/// an empty list.
pub fn search(index: &SearchIndex, query: &str, limit: usize) -> Vec<SearchHit> {
    let opts = SearchOptions { limit, ..SearchOptions::default() };
    search_with(index, query, &opts).unwrap_or_default()
}
