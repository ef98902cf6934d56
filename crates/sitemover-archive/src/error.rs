//! # Design
//!
//! - Structured, constant-message errors for archive writing.
//! - The entry path travels as context; it is never interpolated into the message.

use std::io;

use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors produced while writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO failures while writing entries or the output stream.
    #[error("archive io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Entry path involved, empty for whole-archive operations.
        entry: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Zip container failures.
    #[error("archive zip failure")]
    Zip {
        /// Operation that triggered the zip failure.
        operation: &'static str,
        /// Entry path involved, empty for whole-archive operations.
        entry: String,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Unknown archive format name.
    #[error("archive format unsupported")]
    UnsupportedFormat {
        /// Rejected format name.
        value: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(operation: &'static str, entry: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation,
            entry: entry.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        entry: impl Into<String>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            entry: entry.into(),
            source,
        }
    }

    /// Operation identifier carried by the error, when there is one.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io { operation, .. } | Self::Zip { operation, .. } => Some(*operation),
            Self::UnsupportedFormat { .. } => None,
        }
    }
}
