//! Validation helpers and parsing utilities for configuration values.

use url::Url;

use crate::error::{ConfigError, ConfigResult};

pub(crate) const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// Parse an absolute `http`/`https` URL, normalised to end with `/`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unparseable URLs, other schemes, or URLs
/// without a host.
pub fn parse_base_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    let mut url = Url::parse(value.trim()).map_err(|_| ConfigError::invalid(field, "is not a valid URL", value))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(field, "must use http or https", value));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::invalid(field, "must include a host", value));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse a strictly positive integer.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a number or is zero.
pub fn parse_positive_u64(field: &'static str, value: &str) -> ConfigResult<u64> {
    let parsed: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "must be an integer", value))?;
    if parsed == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero", value));
    }
    Ok(parsed)
}

/// Parse a strictly positive count.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a number, is zero, or does
/// not fit the platform's `usize`.
pub fn parse_positive_usize(field: &'static str, value: &str) -> ConfigResult<usize> {
    let parsed = parse_positive_u64(field, value)?;
    usize::try_from(parsed).map_err(|_| ConfigError::invalid(field, "is too large", value))
}

/// Accept `json` or `pretty` in any case, returned lowercase.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other value.
pub fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<String> {
    let normalized = value.trim().to_ascii_lowercase();
    if LOG_FORMATS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ConfigError::invalid(field, "must be json or pretty", value))
    }
}
