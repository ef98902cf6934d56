//! Typed configuration and its environment loader.
//!
//! # Design
//! - Every variable is read through a lookup function so tests never touch the process
//!   environment; [`AppConfig::from_env`] is a thin wrapper over [`AppConfig::from_lookup`].
//! - Empty values count as unset.
//! - Secrets never appear in `Debug` output.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{parse_base_url, parse_log_format, parse_positive_u64, parse_positive_usize};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "SITEMOVER_";

/// Remote store endpoints and credentials.
#[derive(Clone)]
pub struct RemoteStoreConfig {
    /// API base for folder, listing, and metadata calls.
    pub api_url: Url,
    /// Base for content uploads.
    pub upload_url: Url,
    /// Bearer token, when the store requires one.
    pub token: Option<String>,
}

impl fmt::Debug for RemoteStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStoreConfig")
            .field("api_url", &self.api_url.as_str())
            .field("upload_url", &self.upload_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the source LMS.
    pub source_url: Url,
    /// Remote store settings.
    pub remote: RemoteStoreConfig,
    /// Group-messaging service base URL, when configured.
    pub group_service_url: Option<Url>,
    /// Directory receiving one job record document per job.
    pub job_dir: PathBuf,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
    /// Jobs allowed to run concurrently.
    pub max_concurrent_jobs: usize,
    /// Default log level.
    pub log_level: String,
    /// `json` or `pretty`; `None` picks by build profile.
    pub log_format: Option<String>,
}

impl AppConfig {
    /// Load configuration from `SITEMOVER_*` process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or any value is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which receives full variable names.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or any value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let read = |key: &str| {
            lookup(&format!("{ENV_PREFIX}{key}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let source_url = read("SOURCE_URL").ok_or_else(|| ConfigError::MissingEnv {
            name: format!("{ENV_PREFIX}SOURCE_URL"),
        })?;
        let source_url = parse_base_url("SOURCE_URL", &source_url)?;

        let api_url = parse_base_url(
            "REMOTE_API_URL",
            read("REMOTE_API_URL")
                .as_deref()
                .unwrap_or(defaults::REMOTE_API_URL),
        )?;
        let upload_url = parse_base_url(
            "REMOTE_UPLOAD_URL",
            read("REMOTE_UPLOAD_URL")
                .as_deref()
                .unwrap_or(defaults::REMOTE_UPLOAD_URL),
        )?;
        let group_service_url = read("GROUP_SERVICE_URL")
            .map(|value| parse_base_url("GROUP_SERVICE_URL", &value))
            .transpose()?;

        let http_timeout = read("HTTP_TIMEOUT_SECS")
            .map(|value| parse_positive_u64("HTTP_TIMEOUT_SECS", &value))
            .transpose()?
            .unwrap_or(defaults::HTTP_TIMEOUT_SECS);
        let max_concurrent_jobs = read("MAX_CONCURRENT_JOBS")
            .map(|value| parse_positive_usize("MAX_CONCURRENT_JOBS", &value))
            .transpose()?
            .unwrap_or(defaults::MAX_CONCURRENT_JOBS);
        let log_format = read("LOG_FORMAT")
            .map(|value| parse_log_format("LOG_FORMAT", &value))
            .transpose()?;

        let config = Self {
            source_url,
            remote: RemoteStoreConfig {
                api_url,
                upload_url,
                token: read("REMOTE_TOKEN"),
            },
            group_service_url,
            job_dir: PathBuf::from(read("JOB_DIR").unwrap_or_else(|| defaults::JOB_DIR.into())),
            http_timeout: Duration::from_secs(http_timeout),
            max_concurrent_jobs,
            log_level: read("LOG_LEVEL").unwrap_or_else(|| defaults::LOG_LEVEL.into()),
            log_format,
        };
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (format!("{ENV_PREFIX}{key}"), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_fill_everything_but_the_source() -> anyhow::Result<()> {
        let config = AppConfig::from_lookup(lookup(&[("SOURCE_URL", "https://lms.test")]))?;
        assert_eq!(config.source_url.as_str(), "https://lms.test/");
        assert_eq!(config.remote.api_url.as_str(), "https://api.box.com/2.0/");
        assert_eq!(
            config.remote.upload_url.as_str(),
            "https://upload.box.com/api/2.0/"
        );
        assert!(config.remote.token.is_none());
        assert!(config.group_service_url.is_none());
        assert_eq!(config.job_dir, PathBuf::from("./jobs"));
        assert_eq!(config.http_timeout, Duration::from_secs(300));
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.log_level, "info");
        assert!(config.log_format.is_none());
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> anyhow::Result<()> {
        let config = AppConfig::from_lookup(lookup(&[
            ("SOURCE_URL", "https://lms.test/portal"),
            ("REMOTE_TOKEN", "secret-token"),
            ("GROUP_SERVICE_URL", "http://groups.test:8080/api"),
            ("JOB_DIR", "/var/lib/sitemover"),
            ("HTTP_TIMEOUT_SECS", "30"),
            ("MAX_CONCURRENT_JOBS", "1"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "Pretty"),
        ]))?;
        assert_eq!(
            config.group_service_url.as_ref().map(Url::as_str),
            Some("http://groups.test:8080/api/")
        );
        assert_eq!(config.remote.token.as_deref(), Some("secret-token"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.log_format.as_deref(), Some("pretty"));
        assert!(!format!("{config:?}").contains("secret-token"));
        Ok(())
    }

    #[test]
    fn missing_source_is_reported_by_full_name() {
        let err = AppConfig::from_lookup(lookup(&[("SOURCE_URL", "  ")]));
        assert!(matches!(
            err,
            Err(ConfigError::MissingEnv { ref name }) if name == "SITEMOVER_SOURCE_URL"
        ));
    }

    #[test]
    fn invalid_values_name_their_field() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SOURCE_URL", "https://lms.test"),
            ("MAX_CONCURRENT_JOBS", "0"),
        ]));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField {
                field: "MAX_CONCURRENT_JOBS",
                ..
            })
        ));
    }
}
