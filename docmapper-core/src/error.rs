//! Error types and result types for dataset operations.
//!
//! Everything fallible in this crate returns [`DatasetResult<T>`]. Driver failures are
//! not interpreted here; backends wrap them in [`DatasetError::Backend`] and they reach
//! the caller unchanged in meaning.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::backend::ViewOp;

/// Represents all possible errors raised while composing or materializing a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during database initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The repository configuration could not be parsed or is incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No dataset has been registered under the given name.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),
    /// A document with the given `_id` already exists.
    /// The first argument is the id, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DuplicateKey(String, String),
    /// The selector uses a shape or operator the backend cannot evaluate.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    /// The update document uses a shape or operator the backend cannot apply.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    /// A sort direction could not be normalized (strict mode only).
    #[error("Invalid sort direction {value} for field {field}")]
    InvalidSortDirection {
        /// The field whose direction was rejected.
        field: String,
        /// A rendering of the rejected direction value.
        value: String,
    },
    /// The view does not support an accumulated option (strict mode only).
    #[error("View does not support the {0} option")]
    UnsupportedOption(ViewOp),
    /// Exactly one document was expected but none matched.
    #[error("Expected one document, found none")]
    NoResults,
    /// Exactly one document was expected but several matched.
    #[error("Expected one document, found {0}")]
    TooManyResults(usize),
    /// An error occurred in the underlying driver.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

impl From<BsonError> for DatasetError {
    fn from(err: BsonError) -> Self {
        DatasetError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DatasetError {
    fn from(err: SerdeJsonError) -> Self {
        DatasetError::Serialization(err.to_string())
    }
}
