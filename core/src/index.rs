use crate::document::Document;
use crate::error::ConfigError;
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = u32;

/// Bumped whenever the serialized layout of [`SearchIndex`] changes.
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Raw occurrences across all indexed fields.
    pub tf: u32,
    pub weight: f32, // field-weighted term frequency
}

/// Per-field multipliers applied to each token occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f32,
    pub excerpt: f32,
    pub categories: f32,
    pub tags: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 3.0, excerpt: 1.0, categories: 1.0, tags: 1.0 }
    }
}

impl FieldWeights {
    /// Every weight must be finite and non-negative. Zero turns a field off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let FieldWeights { title, excerpt, categories, tags } = *self;
        for (field, value) in [("title", title), ("excerpt", excerpt), ("categories", categories), ("tags", tags)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub tokenizer: TokenizerConfig,
    pub weights: FieldWeights,
}

/// Immutable inverted index over a corpus of posts.
///
/// Document ids are dense: `docs[id].id == id`. Postings for each term are
/// sorted by ascending document id. Only the builder and the loader construct
/// one, and both check [`SearchIndex::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub(crate) version: u32,
    pub(crate) config: IndexConfig,
    pub(crate) docs: Vec<Document>,
    pub(crate) postings: BTreeMap<String, Vec<Posting>>,
}

impl SearchIndex {
    pub(crate) fn new(config: IndexConfig, docs: Vec<Document>, postings: BTreeMap<String, Vec<Posting>>) -> Self {
        Self { version: INDEX_VERSION, config, docs, postings }
    }

    pub fn version(&self) -> u32 { self.version }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn docs(&self) -> &[Document] { &self.docs }

    /// Every indexed term with its postings, in term order.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &[Posting])> {
        self.postings.iter().map(|(term, list)| (term.as_str(), list.as_slice()))
    }

    pub fn num_docs(&self) -> usize { self.docs.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docs.get(id as usize)
    }

    /// Postings for a term; unknown terms have none.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn doc_freq(&self, term: &str) -> usize { self.postings(term).len() }

    /// The tokenizer this index was built with. Queries must use it.
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(self.config.tokenizer.clone())
    }

    /// Check structural invariants: dense ids, postings strictly ascending,
    /// every posting pointing at an existing document with a positive count.
    pub fn validate(&self) -> Result<(), String> {
        for (i, doc) in self.docs.iter().enumerate() {
            if doc.id as usize != i {
                return Err(format!("document at position {i} has id {}", doc.id));
            }
        }
        let n = self.docs.len();
        for (term, list) in &self.postings {
            if list.is_empty() {
                return Err(format!("term {term:?} has an empty posting list"));
            }
            let mut prev: Option<DocId> = None;
            for p in list {
                if p.doc_id as usize >= n {
                    return Err(format!("term {term:?} references missing document {}", p.doc_id));
                }
                if prev.is_some_and(|prev| prev >= p.doc_id) {
                    return Err(format!("postings for {term:?} are not strictly ascending"));
                }
                if p.tf == 0 {
                    return Err(format!("term {term:?} has a zero count for document {}", p.doc_id));
                }
                prev = Some(p.doc_id);
            }
        }
        Ok(())
    }
}
