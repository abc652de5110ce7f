//! Error types for the bookkeeping bot
//!
//! Every failure on the parse/store path is recovered at the boundary where
//! it occurs and converted to a typed value; nothing propagates past the
//! parser or the record store as an unhandled fault. `Display` on each kind
//! is the user-facing message; underlying causes are carried for logging
//! only.

use thiserror::Error;

/// Result type alias for top-level operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// The completion provider could not be reached or returned an error.
///
/// The carried string is the underlying cause, intended for logs; the
/// rendered message stays generic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service temporarily unavailable, please retry later")]
pub struct ProviderError(pub String);

/// Why a parse attempt did not yield a record.
///
/// `ModelDeclared` carries the model's own message and is rendered
/// verbatim; the validation variants are synthesized here. The two kinds
/// stay distinct on purpose — the model-supplied guidance is part of what
/// the end user sees.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("AI returned malformed output, please retry")]
    MalformedResponse,

    #[error("{0}")]
    ModelDeclared(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid main category: {0}")]
    InvalidMainCategory(String),

    #[error("sub-category '{sub}' is not valid under '{main}'")]
    InvalidSubCategory { main: String, sub: String },

    #[error("invalid record type: {0}")]
    InvalidRecordType(String),

    #[error("invalid amount")]
    InvalidAmount,
}

/// An insert or probe against the record store failed. The record is never
/// left partially persisted.
#[derive(Error, Debug)]
#[error("failed to save the record, please retry")]
pub struct StorageError(#[from] pub sqlx::Error);

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
