//! Error types for pbsstore.
//!
//! All errors are represented by the `PersistError` enum. Per-object errors
//! (ghost files, old versions, corrupt blocks) are reported to the caller and
//! logged; only `Fatal` means the store as a whole can no longer be trusted.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all persistence operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Open, read, write, seek or rename failure.
    #[error("{0}")]
    IoError(String),

    /// The object or file that an operation expects does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The identity embedded in a record does not match its file name or key.
    #[error("{0}")]
    Ghost(String),

    /// The stored schema version predates the oldest recoverable layout.
    #[error("structure version {found} cannot be recovered, minimum is {minimum}")]
    VersionTooOld {
        found: u32,
        minimum: u32,
    },

    /// Short read or malformed fixed, tracking or attribute block.
    #[error("{0}")]
    Corrupt(String),

    /// An attribute value or name could not be decoded.
    #[error("{0}")]
    Decode(String),

    /// A value does not fit its on-disk representation.
    #[error("{0}")]
    Encode(String),

    /// Database operation errors.
    #[error("{0}")]
    Store(String),

    /// Store-wide failure; the halt latch has been set.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PersistError {
    /// Wraps an I/O error together with the operation and path it came from.
    pub fn io(
        op: &str,
        path: impl AsRef<std::path::Path>,
        err: std::io::Error,
    ) -> Self {
        if err.kind() == ErrorKind::NotFound {
            return PersistError::NotFound(format!("{} {}: {}", op, path.as_ref().display(), err));
        }
        PersistError::IoError(format!("{} {}: {}", op, path.as_ref().display(), err))
    }
}

impl From<PersistError> for String {
    fn from(val: PersistError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for PersistError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => PersistError::NotFound(error.to_string()),
            ErrorKind::UnexpectedEof => PersistError::Corrupt(error.to_string()),
            _ => PersistError::IoError(error.to_string()),
        }
    }
}

impl From<PersistError> for std::io::Error {
    fn from(val: PersistError) -> Self {
        std::io::Error::other(val.to_string())
    }
}

impl From<FromUtf8Error> for PersistError {
    fn from(_: FromUtf8Error) -> Self {
        PersistError::Corrupt("Error with utf-8 string convert".to_string())
    }
}

impl From<sqlx::Error> for PersistError {
    fn from(error: sqlx::Error) -> Self {
        PersistError::Store(error.to_string())
    }
}

impl From<toml::de::Error> for PersistError {
    fn from(error: toml::de::Error) -> Self {
        PersistError::Config(error.to_string())
    }
}
