//! Error types for the search index.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchIndexError>;

#[derive(Error, Debug)]
pub enum SearchIndexError {
    #[error("`fields` option is required and must be a non-empty list of field names")]
    MissingFieldsOption,

    #[error("document is missing its id field {0:?}")]
    MissingIdField(String),

    #[error("a document with id {0} is already indexed")]
    DuplicateId(String),

    #[error("no live document with id {0}")]
    UnknownDocument(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unrecognized combine_with operator: {0:?}")]
    InvalidCombinator(String),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("from_serializable called without load options")]
    MissingLoadOptions,

    #[error("incompatible serialized index version: {0}")]
    IncompatibleIndexVersion(u32),
}
