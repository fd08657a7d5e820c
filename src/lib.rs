//! lexitrie — an embeddable, in-memory full-text search engine.
//!
//! Ingests documents into an inverted index keyed by processed terms and
//! answers ranked queries with BM25+ scoring, optional prefix expansion,
//! and optional bounded-edit-distance fuzzy expansion. Supports incremental
//! updates (`add`, `remove`, `discard`, `replace`) with lazy compaction
//! ("vacuuming"), and round-trip serialization of the index to a portable
//! plain-data form.
//!
//! The engine is generic over the caller's external document id type
//! (anything implementing [`DocumentId`]) and does not assume any
//! particular document representation beyond a `HashMap<String, FieldValue>`
//! (see [`FieldMap`]). Tokenization, term processing, per-document
//! boosting, and logging are all pluggable.
//!
//! ```
//! use std::collections::HashMap;
//! use lexitrie::{FieldValue, IndexOptions, Query, SearchIndex};
//!
//! let mut index: SearchIndex<u64> =
//!     SearchIndex::new(IndexOptions::new(vec!["text".to_string()])).unwrap();
//!
//! let mut doc = HashMap::new();
//! doc.insert("id".to_string(), FieldValue::Number(1.0));
//! doc.insert("text".to_string(), FieldValue::String("nel mezzo del cammin".to_string()));
//! index.add(&doc).unwrap();
//!
//! let results = index.search(&Query::text("cammin"), None);
//! assert_eq!(results.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod logger;
pub mod postings;
pub mod query;
pub mod radix;
pub mod registry;
pub mod scorer;
mod search_index;
pub mod serialize;
pub mod tokenize;
pub mod value;
pub mod vacuum;

pub use config::{
    default_option, AutoSuggestOptions, AutoVacuumOptions, AutoVacuumSetting, BM25Options, CombineWith,
    FuzzySetting, FuzzyValue, IndexOptions, PrefixSetting, SearchOptions, VacuumConditions,
};
pub use error::{Result, SearchIndexError};
pub use ids::{FieldId, ShortId};
pub use logger::{LogLevel, Logger, NullLogger, TracingLogger};
pub use query::{Query, QueryTree, TermSpec};
pub use radix::{FuzzyMatch, Prefix, RadixMap};
pub use scorer::{SearchResult, Suggestion};
pub use search_index::SearchIndex;
pub use serialize::{SerializedIndex, TermFrequencyMap};
pub use tokenize::{DefaultTermProcessor, DefaultTokenizer, TermOutput, TermProcessor, Tokenizer};
pub use value::{DocumentId, FieldMap, FieldValue};
pub use vacuum::{SharedVacuumFuture, VacuumHost, VacuumParams, VacuumScheduler};
