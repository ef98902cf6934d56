//! # Design
//!
//! - Centralize application-level errors for command wiring and job bookkeeping.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Usage and configuration problems map to exit code 2; everything else to 1.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Exit code for a failed migration or operational error.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code for configuration and usage errors.
pub const EXIT_USAGE: u8 = 2;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: sitemover_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: sitemover_telemetry::TelemetryError,
    },
    /// A status document could not be rendered.
    #[error("payload encoding failed")]
    Encode {
        /// Operation identifier.
        operation: &'static str,
        /// Source serialisation error.
        source: serde_json::Error,
    },
    /// HTTP client construction failed.
    #[error("http client setup failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// A command argument was invalid.
    #[error("invalid argument")]
    InvalidArgument {
        /// Argument name.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A collaborator required by the command is not configured.
    #[error("missing dependency")]
    MissingDependency {
        /// Name of the missing setting.
        name: &'static str,
    },
    /// A dispatched job task did not run to completion.
    #[error("migration task failed")]
    Join {
        /// Job identifier.
        job_id: String,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: sitemover_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: sitemover_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: Some(path.into()),
            source,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::InvalidArgument { .. } | Self::MissingDependency { .. } => {
                EXIT_USAGE
            }
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        let config = AppError::config(
            "config.load",
            sitemover_config::ConfigError::MissingEnv {
                name: "SITEMOVER_SOURCE_URL".into(),
            },
        );
        assert_eq!(config.exit_code(), EXIT_USAGE);
        assert_eq!(
            AppError::MissingDependency {
                name: "SITEMOVER_GROUP_SERVICE_URL"
            }
            .exit_code(),
            EXIT_USAGE
        );

        let io = AppError::io("archive.create", "/tmp/out.zip", io::Error::other("denied"));
        assert_eq!(io.exit_code(), EXIT_FAILURE);
        assert!(matches!(io, AppError::Io { path: Some(_), .. }));
    }
}
