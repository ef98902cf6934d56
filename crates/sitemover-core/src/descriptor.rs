//! Content feed decoding.
//!
//! # Design
//! - The source exposes a depth-first, flat list of descriptors with no parent pointers;
//!   hierarchy is implied by the `/`-separated source path derived from each access URL.
//! - Decoding is pure. A descriptor whose access URL cannot be normalised keeps a `None`
//!   path and ends the decoded batch, because container tracking cannot continue past it.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::{CoreError, CoreResult};

/// Access prefix for plain content.
pub const ACCESS_MARKER: &str = "/access/content";
/// Access prefix for citation (restricted) content.
pub const CITATION_ACCESS_MARKER: &str = "/access/citation/content";
/// Endpoint that records the copyright acceptance and then serves the content.
pub const ACCEPT_PATH: &str = "/access/accept";

const FEED_COLLECTION: &str = "content_collection";
const FOLDER_TYPE: &str = "collection";
const LINK_TYPE: &str = "text/url";
const PATH_SEPARATOR: char = '/';

/// Kind of node carried by a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Folder-like container.
    Folder,
    /// Regular file whose bytes are fetched from the source.
    File,
    /// Web link rendered as a small HTML page.
    Link,
}

impl ContentKind {
    fn from_type(value: Option<&str>) -> Self {
        match value {
            Some(FOLDER_TYPE) => Self::Folder,
            Some(LINK_TYPE) => Self::Link,
            _ => Self::File,
        }
    }
}

/// One node of the flat content feed. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Node kind.
    pub kind: ContentKind,
    /// Raw `type` value from the feed (a MIME type for files).
    pub mime_type: Option<String>,
    /// Display title.
    pub title: String,
    /// Content-fetch endpoint as published by the source.
    pub access_url: String,
    /// Absolute source path; folders end with `/`. `None` when the URL is unparseable.
    pub source_path: Option<String>,
    /// Declared size in bytes (files only).
    pub size: u64,
    /// Free-text description.
    pub description: Option<String>,
    /// Author recorded by the source.
    pub author: Option<String>,
    /// Copyright/restriction marker.
    pub sensitive: bool,
    /// Link target for web links.
    pub link_target: Option<String>,
}

impl ContentDescriptor {
    /// Target URL for a link, falling back to the title when the feed omits one.
    #[must_use]
    pub fn link_target(&self) -> &str {
        self.link_target
            .as_deref()
            .filter(|target| !target.trim().is_empty())
            .unwrap_or(&self.title)
    }

    /// URL to fetch the bytes from.
    ///
    /// Content behind a copyright alert is fetched through the acceptance endpoint, so the
    /// migration never stops at the alert page.
    #[must_use]
    pub fn fetch_url(&self) -> Cow<'_, str> {
        if self.sensitive
            && let Some(accept) = copyright_accept_url(&self.access_url)
        {
            return Cow::Owned(accept);
        }
        Cow::Borrowed(&self.access_url)
    }
}

/// Rewrite a plain content URL into its copyright acceptance URL.
///
/// `https://host/access/content/group/s/a.pdf` becomes
/// `https://host/access/accept?ref=/content/group/s/a.pdf&url=/access/content/group/s/a.pdf`.
/// Returns `None` for URLs without the plain access prefix.
#[must_use]
pub fn copyright_accept_url(access_url: &str) -> Option<String> {
    let mut url = Url::parse(access_url).ok()?;
    let path = urlencoding::decode(url.path()).ok()?.into_owned();
    let rest = path.strip_prefix(ACCESS_MARKER)?;
    let reference = format!("/content{rest}");
    url.set_path(ACCEPT_PATH);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("ref", &reference)
        .append_pair("url", &path);
    Some(url.into())
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(rename = "copyrightAlert", default)]
    copyright_alert: Option<Value>,
    #[serde(rename = "webLinkUrl", default)]
    web_link_url: Option<String>,
    #[serde(default)]
    size: Option<Value>,
}

impl From<FeedItem> for ContentDescriptor {
    fn from(item: FeedItem) -> Self {
        let access_url = item.url.unwrap_or_default();
        let source_path = normalize_access_url(&access_url);
        Self {
            kind: ContentKind::from_type(item.kind.as_deref()),
            mime_type: item.kind,
            title: item.title.unwrap_or_default(),
            source_path,
            access_url,
            size: item.size.as_ref().map_or(0, size_from_value),
            description: item.description.filter(|text| !text.is_empty()),
            author: item.author.filter(|text| !text.is_empty()),
            sensitive: item.copyright_alert.as_ref().is_some_and(flag_from_value),
            link_target: item.web_link_url.filter(|text| !text.is_empty()),
        }
    }
}

/// Decode a content feed into its ordered descriptor sequence.
///
/// Decoding stops after the first descriptor whose access URL cannot be normalised; that
/// descriptor is still returned (with a `None` path) so the caller can report it.
///
/// # Errors
///
/// Returns an error when the payload is not JSON or lacks a `content_collection` array.
pub fn parse_feed(payload: &str) -> CoreResult<Vec<ContentDescriptor>> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|err| CoreError::feed_decode("parse_feed", err))?;
    let items = document
        .get_mut(FEED_COLLECTION)
        .map(Value::take)
        .ok_or(CoreError::FeedShape {
            field: FEED_COLLECTION,
            reason: "missing",
        })?;
    let items: Vec<FeedItem> =
        serde_json::from_value(items).map_err(|err| CoreError::feed_decode("parse_feed", err))?;

    let mut descriptors = Vec::with_capacity(items.len());
    for item in items {
        let descriptor = ContentDescriptor::from(item);
        let unparseable = descriptor.source_path.is_none();
        if unparseable {
            warn!(
                url = %descriptor.access_url,
                title = %descriptor.title,
                "content url carries no recognised access prefix; truncating feed"
            );
        }
        descriptors.push(descriptor);
        if unparseable {
            break;
        }
    }
    Ok(descriptors)
}

/// Strip everything through the access prefix, returning the source path.
///
/// The URL is percent-decoded first. Returns `None` when neither the plain nor the citation
/// access prefix is present.
#[must_use]
pub fn normalize_access_url(access_url: &str) -> Option<String> {
    let decoded = urlencoding::decode(access_url).map_or_else(
        |_| String::from_utf8_lossy(&urlencoding::decode_binary(access_url.as_bytes())).into_owned(),
        std::borrow::Cow::into_owned,
    );
    [ACCESS_MARKER, CITATION_ACCESS_MARKER]
        .iter()
        .find_map(|marker| {
            decoded
                .find(marker)
                .map(|index| decoded[index + marker.len()..].to_string())
        })
}

/// Parent container of a source path, keeping the trailing separator.
///
/// `/group/site/a/b.txt` and `/group/site/a/sub/` both yield `/group/site/a/`. A path with
/// no separator yields an empty string.
#[must_use]
pub fn container_path(source_path: &str) -> String {
    let trimmed = source_path
        .strip_suffix(PATH_SEPARATOR)
        .unwrap_or(source_path);
    trimmed
        .rfind(PATH_SEPARATOR)
        .map_or_else(String::new, |index| trimmed[..=index].to_string())
}

fn size_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|size| *size >= 0.0)
                    .map(|size| size as u64)
            })
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn flag_from_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => {
            let text = text.trim();
            !text.is_empty() && !text.eq_ignore_ascii_case("false")
        }
        _ => true,
    }
}
