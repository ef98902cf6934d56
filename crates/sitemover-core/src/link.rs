//! Web links rendered as small redirecting HTML pages.

use thiserror::Error;
use url::Url;

/// Errors raised while rendering a link page.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link target is not an absolute URL.
    #[error("link target is not an absolute url")]
    InvalidTarget {
        /// Link title.
        title: String,
        /// Rejected target.
        target: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
}

impl LinkError {
    /// Status text shown to the user for this failure.
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::InvalidTarget { title, .. } => format!(
                "Link {title} could not be migrated. Please change the link name to be the complete URL and migrate the site again."
            ),
        }
    }
}

/// Render an HTML page that forwards the browser to `target`.
///
/// # Errors
///
/// Returns [`LinkError::InvalidTarget`] when `target` does not parse as an absolute URL.
pub fn render_link_page(title: &str, target: &str) -> Result<String, LinkError> {
    let url = Url::parse(target.trim()).map_err(|source| LinkError::InvalidTarget {
        title: title.to_string(),
        target: target.to_string(),
        source,
    })?;
    let href = escape_html(url.as_str());
    let title = escape_html(title);
    Ok(format!(
        "<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <meta http-equiv=\"refresh\" content=\"0; url={href}\">\n</head>\n\
         <body>\n<p>Redirecting to <a href=\"{href}\">{title}</a></p>\n</body>\n</html>\n"
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
