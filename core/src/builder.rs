use crate::document::{Document, RawPost};
use crate::error::ConfigError;
use crate::index::{DocId, FieldWeights, IndexConfig, Posting, SearchIndex};
use crate::tokenizer::Tokenizer;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Why a record was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingUrl,
    NoIndexableText,
    /// Another record with the same url was accepted first.
    DuplicateUrl { first_id: DocId },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingUrl => write!(f, "missing url"),
            SkipReason::NoIndexableText => write!(f, "no indexable text"),
            SkipReason::DuplicateUrl { first_id } => write!(f, "duplicate url (already indexed as document {first_id})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    /// Zero-based position of the record in the input sequence.
    pub position: usize,
    pub url: Option<String>,
    pub reason: SkipReason,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "record {} ({url}) skipped: {}", self.position, self.reason),
            None => write!(f, "record {} skipped: {}", self.position, self.reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub index: SearchIndex,
    pub warnings: Vec<BuildWarning>,
}

pub struct IndexBuilder {
    config: IndexConfig,
    tokenizer: Tokenizer,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        let config = IndexConfig::default();
        Self { tokenizer: Tokenizer::new(config.tokenizer.clone()), config }
    }
}

impl IndexBuilder {
    /// Fails when a field weight is negative, infinite or NaN.
    pub fn new(config: IndexConfig) -> Result<Self, ConfigError> {
        config.weights.validate()?;
        let tokenizer = Tokenizer::new(config.tokenizer.clone());
        Ok(Self { config, tokenizer })
    }

    /// Validate, number and index `posts` in order.
    ///
    /// Invalid records are skipped and reported in [`BuildOutput::warnings`].
    /// The same input always yields an equal index.
    ///
    /// # Panics
    ///
    /// If the constructed index violates its own invariants, which indicates a
    /// bug in this module rather than bad input.
    pub fn build<I>(&self, posts: I) -> BuildOutput
    where
        I: IntoIterator<Item = RawPost>,
    {
        let mut docs: Vec<Document> = Vec::new();
        let mut warnings: Vec<BuildWarning> = Vec::new();
        let mut by_url: HashMap<String, DocId> = HashMap::new();
        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();

        for (position, post) in posts.into_iter().enumerate() {
            let url = match post.url() {
                Some(url) => url.to_string(),
                None => {
                    warnings.push(skip(position, None, SkipReason::MissingUrl));
                    continue;
                }
            };
            if !post.has_text() {
                warnings.push(skip(position, Some(url), SkipReason::NoIndexableText));
                continue;
            }
            if let Some(&first_id) = by_url.get(&url) {
                warnings.push(skip(position, Some(url), SkipReason::DuplicateUrl { first_id }));
                continue;
            }

            let doc_id = docs.len() as DocId;
            by_url.insert(url, doc_id);
            let doc = post.into_document(doc_id);

            // Documents are visited in id order, so appending keeps every
            // posting list sorted.
            for (term, (tf, weight)) in self.term_counts(&doc) {
                postings.entry(term).or_default().push(Posting { doc_id, tf, weight });
            }
            docs.push(doc);
        }

        let index = SearchIndex::new(self.config.clone(), docs, postings);
        if let Err(violation) = index.validate() {
            panic!("index builder produced an inconsistent index: {violation}");
        }
        tracing::info!(
            num_docs = index.num_docs(),
            num_terms = index.num_terms(),
            skipped = warnings.len(),
            "index built"
        );
        BuildOutput { index, warnings }
    }

    /// Per-term (raw count, weighted count) over the indexed fields of `doc`.
    fn term_counts(&self, doc: &Document) -> BTreeMap<String, (u32, f32)> {
        let FieldWeights { title, excerpt, categories, tags } = self.config.weights;
        let mut counts: BTreeMap<String, (u32, f32)> = BTreeMap::new();
        let mut add = |text: &str, weight: f32| {
            for term in self.tokenizer.terms(text) {
                let entry = counts.entry(term).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += weight;
            }
        };
        add(&doc.title, title);
        add(&doc.excerpt, excerpt);
        for c in &doc.categories {
            add(c, categories);
        }
        for t in &doc.tags {
            add(t, tags);
        }
        counts
    }
}

fn skip(position: usize, url: Option<String>, reason: SkipReason) -> BuildWarning {
    let warning = BuildWarning { position, url, reason };
    tracing::warn!(%warning, "skipping record");
    warning
}

/// Build with the default configuration.
pub fn build<I>(posts: I) -> BuildOutput
where
    I: IntoIterator<Item = RawPost>,
{
    IndexBuilder::default().build(posts)
}
