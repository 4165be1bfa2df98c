//! Retrieval core for the movie search engine: inverted index, corpus statistics,
//! vector space / BM25 ranking, MinHash near-duplicate detection and snippets.

pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod index;
pub mod metadata;
pub mod minhash;
pub mod persist;
pub mod scorer;
pub mod shingle;
pub mod snippet;
pub mod spell;
pub mod tokenizer;

pub use config::{IndexConfig, LshParams};
pub use corpus::{Corpus, RawMovie};
pub use engine::{Engine, Method};
pub use error::{Result, SearchError};
pub use index::{DocId, Document, FieldPostings, InvertedIndex};
pub use metadata::MetadataIndex;
pub use minhash::{BucketKey, BucketMap, MinHashLsh, SignatureMatrix};
pub use scorer::{Scorer, VsmMethod};
pub use snippet::{Snippet, SnippetExtractor};
pub use spell::SpellCorrector;

/// Name of the index holding whole document records.
pub const DOCUMENTS_FIELD: &str = "documents";
