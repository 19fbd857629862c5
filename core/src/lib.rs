//! Full-text search over blog-post records.

pub mod builder;
pub mod document;
pub mod error;
pub mod index;
pub mod live;
pub mod persist;
pub mod search;
pub mod tokenizer;

pub use builder::{build, BuildOutput, BuildWarning, IndexBuilder, SkipReason};
pub use document::{Document, RawPost};
pub use error::{ConfigError, LoadError, PersistError, SearchError};
pub use index::{DocId, FieldWeights, IndexConfig, Posting, SearchIndex, INDEX_VERSION};
pub use live::LiveIndex;
pub use search::{search, search_page, search_with, IdfMode, SearchHit, SearchOptions, SearchPage};
pub use tokenizer::{tokenize, Tokenizer, TokenizerConfig};
