//! # Design
//!
//! - Structured, constant-message errors for feed decoding, sinks, and content sources.
//! - Context (operation, url, names) travels in fields. Destination errors render their
//!   `detail`, the only text the destination itself supplies.
//! - `SinkError::Conflict` and `SinkError::UnresolvedConflict` are the recoverable destination
//!   errors. The first carries the handle of the container already holding the requested
//!   name; the second means that container exists but could not be located.

use std::error::Error;
use std::io;

use thiserror::Error;

use crate::sink::SinkHandle;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result alias for content source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while decoding source feeds or persisting job records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Feed payload was not valid JSON.
    #[error("feed decode failure")]
    FeedDecode {
        /// Operation that attempted the decode.
        operation: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Feed payload decoded but lacked an expected structure.
    #[error("feed shape invalid")]
    FeedShape {
        /// Field that was missing or malformed.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// A payload could not be serialised.
    #[error("payload serialisation failed")]
    Serialize {
        /// Operation that attempted the encode.
        operation: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Local IO failure (spooling, record files).
    #[error("core io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Job record persistence failed.
    #[error("job record persistence failed")]
    JobStore {
        /// Operation identifier.
        operation: &'static str,
        /// Job identifier being persisted.
        job_id: String,
        /// Underlying store failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl CoreError {
    pub(crate) const fn feed_decode(operation: &'static str, source: serde_json::Error) -> Self {
        Self::FeedDecode { operation, source }
    }
}

/// Errors reported by destination sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The destination already holds an item with the requested name.
    #[error("destination name already in use")]
    Conflict {
        /// Name that collided.
        name: String,
        /// Handle of the existing container holding that name.
        existing: SinkHandle,
    },
    /// The name is in use but the existing container could not be located.
    #[error("destination name already in use by an unknown container: {detail}")]
    UnresolvedConflict {
        /// Name that collided.
        name: String,
        /// Why the existing container could not be found.
        detail: String,
    },
    /// Any other destination failure (transport, auth, rejected request).
    #[error("destination operation failed: {detail}")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Human-readable detail reported by the destination.
        detail: String,
    },
    /// Local IO failure while writing to the destination.
    #[error("destination io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl SinkError {
    /// Build a backend error from an operation and detail string.
    #[must_use]
    pub fn backend(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            detail: detail.into(),
        }
    }

    /// Whether the error is a name conflict, resolved or not. Conflicts never halt a run.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::UnresolvedConflict { .. })
    }
}

/// Errors raised while talking to the source system.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request could not be sent or the body could not be read.
    #[error("source transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The source answered with a non-success status.
    #[error("source returned an error status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response body could not be decoded.
    #[error("source payload could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// Underlying decode error.
        source: CoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_conflict_is_recoverable() {
        let conflict = SinkError::Conflict {
            name: "Week 1".into(),
            existing: SinkHandle::new("42"),
        };
        assert!(conflict.is_conflict());
        assert!(!SinkError::backend("create_folder", "denied").is_conflict());
        assert!(
            SinkError::UnresolvedConflict {
                name: "Week 1".into(),
                detail: "not listed".into(),
            }
            .is_conflict()
        );
    }

    #[test]
    fn backend_error_renders_its_detail() {
        let err = SinkError::backend("remote.create_folder", "status 403: forbidden");
        assert_eq!(
            err.to_string(),
            "destination operation failed: status 403: forbidden"
        );
    }

    #[test]
    fn source_error_keeps_transport_source() {
        let err = SourceError::Transport {
            operation: "fetch",
            url: "https://example.test".into(),
            source: Box::new(io::Error::other("reset")),
        };
        assert!(err.source().is_some());
    }
}
