//! Error types for the geocodec data model

use thiserror::Error;

/// Errors raised when a model invariant would be broken
#[derive(Error, Debug)]
pub enum Error {
    #[error("Channel '{channel}' has {actual} entries, expected {expected}")]
    ChannelLength {
        channel: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate scalar field name: {0}")]
    DuplicateScalarField(String),

    #[error("Index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Result type alias for data model operations
pub type Result<T> = std::result::Result<T, Error>;
