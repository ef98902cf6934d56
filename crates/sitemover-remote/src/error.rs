//! # Design
//!
//! - Structured, constant-message errors for remote store and group-service calls.
//! - URL, status, and response body travel as fields so failures can be reported verbatim.

use std::io;

use sitemover_core::{SinkError, describe_error};
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors produced while talking to the remote store or the group service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A configured base URL could not be joined with an endpoint path.
    #[error("remote url invalid")]
    Url {
        /// Endpoint being built.
        endpoint: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The request could not be sent or its body could not be read.
    #[error("remote transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The remote answered with a non-success status.
    #[error("remote returned an error status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },
    /// The remote answered with a body that did not match the expected shape.
    #[error("remote response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// URL requested.
        url: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// Local IO failure while preparing an upload.
    #[error("remote upload io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl RemoteError {
    /// HTTP status reported by the remote, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote reported a name conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409))
    }

    /// Operation identifier carried by the error.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Url { .. } => "remote.url",
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Io { operation, .. } => *operation,
        }
    }

    /// Detail line combining the error chain and any response body.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Status { status, body, .. } if !body.is_empty() => {
                format!("{}: {status} {body}", describe_error(self))
            }
            Self::Status { status, .. } => format!("{}: {status}", describe_error(self)),
            _ => describe_error(self),
        }
    }
}

impl From<RemoteError> for SinkError {
    fn from(err: RemoteError) -> Self {
        Self::backend(err.operation(), err.detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_expose_conflicts_and_bodies() {
        let err = RemoteError::Status {
            operation: "create_folder",
            url: "https://api.test/folders".into(),
            status: 409,
            body: "item_name_in_use".into(),
        };
        assert!(err.is_conflict());
        assert_eq!(err.detail(), "remote returned an error status: 409 item_name_in_use");
        let sink: SinkError = err.into();
        assert!(matches!(
            sink,
            SinkError::Backend {
                operation: "create_folder",
                ..
            }
        ));
    }

    #[test]
    fn io_errors_keep_source_in_detail() {
        let err = RemoteError::Io {
            operation: "upload.spool",
            source: io::Error::other("disk full"),
        };
        assert!(!err.is_conflict());
        assert_eq!(err.detail(), "remote upload io failure: disk full");
    }
}
