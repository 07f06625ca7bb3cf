//! Error types for I/O operations

use crate::session::Warnings;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that can occur while loading or saving geometry files
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("Write error: {0}")]
    Write(#[source] std::io::Error),

    #[error("Malformed file: {0}")]
    Format(String),

    #[error("Inconsistent data: {0}")]
    Semantic(String),

    #[error("Not enough memory: {0}")]
    Resource(String),

    #[error("Canceled by user")]
    Canceled,

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Nothing to load: {0}")]
    NothingToLoad(String),
}

/// Closed set of outcomes reported at the codec boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    BadArgument,
    WrongFileType,
    Reading,
    Writing,
    NotEnoughMemory,
    MalformedFile,
    Canceled,
    NothingToLoad,
}

impl CodecError {
    /// Outcome kind reported to callers for this error
    pub fn outcome(&self) -> OutcomeKind {
        match self {
            CodecError::Read(_) => OutcomeKind::Reading,
            CodecError::Write(_) => OutcomeKind::Writing,
            CodecError::Format(_) | CodecError::Semantic(_) => OutcomeKind::MalformedFile,
            CodecError::Resource(_) => OutcomeKind::NotEnoughMemory,
            CodecError::Canceled => OutcomeKind::Canceled,
            CodecError::BadArgument(_) => OutcomeKind::BadArgument,
            CodecError::UnsupportedFormat(_) => OutcomeKind::WrongFileType,
            CodecError::NothingToLoad(_) => OutcomeKind::NothingToLoad,
        }
    }

    pub(crate) fn reserve(what: &str, err: TryReserveError) -> Self {
        CodecError::Resource(format!("cannot reserve {}: {}", what, err))
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Read(err)
    }
}

impl From<geocodec_core::Error> for CodecError {
    fn from(err: geocodec_core::Error) -> Self {
        CodecError::Semantic(err.to_string())
    }
}

/// A failed load: the error plus every warning collected before it
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LoadFailure {
    #[source]
    pub error: CodecError,
    pub warnings: Warnings,
}

impl LoadFailure {
    pub fn outcome(&self) -> OutcomeKind {
        self.error.outcome()
    }
}

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
