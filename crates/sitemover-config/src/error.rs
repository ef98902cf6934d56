//! Error types for configuration loading.

use thiserror::Error;

/// Primary error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("required configuration variable missing")]
    MissingEnv {
        /// Full variable name.
        name: String,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }

    /// One-line description including the offending field.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::MissingEnv { name } => format!("{self}: {name}"),
            Self::InvalidField {
                field,
                reason,
                value: Some(value),
            } => format!("{self}: {field} {reason} (got '{value}')"),
            Self::InvalidField { field, reason, .. } => format!("{self}: {field} {reason}"),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
