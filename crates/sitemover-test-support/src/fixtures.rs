//! Feed payload builders.

use serde_json::{Value, json};
use sitemover_core::{ContentDescriptor, CoreResult, parse_feed};

/// Base URL used by fixtures for source access URLs.
pub const SOURCE_BASE: &str = "https://lms.test";

/// Builds a `content_collection` payload rooted at `/group/<site>/`.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    base: String,
    site_root: String,
    items: Vec<Value>,
}

impl FeedBuilder {
    /// Start a feed for `site_id`; the site root folder is emitted first.
    #[must_use]
    pub fn new(site_id: &str) -> Self {
        Self::with_base(site_id, SOURCE_BASE)
    }

    /// Start a feed whose access URLs point at `base`, e.g. a mock server.
    #[must_use]
    pub fn with_base(site_id: &str, base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        let site_root = format!("/group/{site_id}/");
        let items = vec![json!({
            "type": "collection",
            "title": site_id,
            "url": format!("{base}/access/content{site_root}"),
        })];
        Self {
            base,
            site_root,
            items,
        }
    }

    /// Access URL for a path relative to the site root.
    #[must_use]
    pub fn access_url(&self, relative: &str) -> String {
        format!("{}/access/content{}{relative}", self.base, self.site_root)
    }

    /// Add a folder; `relative` must end with `/`.
    #[must_use]
    pub fn folder(mut self, relative: &str, title: &str) -> Self {
        let url = self.access_url(relative);
        self.items.push(json!({
            "type": "collection",
            "title": title,
            "url": url,
            "description": format!("{title} description"),
        }));
        self
    }

    /// Add a plain-text file.
    #[must_use]
    pub fn file(mut self, relative: &str, title: &str, size: u64) -> Self {
        let url = self.access_url(relative);
        self.items.push(json!({
            "type": "text/plain",
            "title": title,
            "url": url,
            "size": size,
            "author": "instructor",
            "copyrightAlert": false,
        }));
        self
    }

    /// Add a file flagged with a copyright alert.
    #[must_use]
    pub fn sensitive_file(mut self, relative: &str, title: &str, size: u64) -> Self {
        let url = self.access_url(relative);
        self.items.push(json!({
            "type": "application/pdf",
            "title": title,
            "url": url,
            "size": size,
            "author": "instructor",
            "copyrightAlert": "true",
        }));
        self
    }

    /// Add a web link.
    #[must_use]
    pub fn link(mut self, relative: &str, title: &str, target: &str) -> Self {
        let url = self.access_url(relative);
        self.items.push(json!({
            "type": "text/url",
            "title": title,
            "url": url,
            "webLinkUrl": target,
        }));
        self
    }

    /// Add a descriptor whose URL carries no access prefix.
    #[must_use]
    pub fn unparseable(mut self, title: &str) -> Self {
        self.items.push(json!({
            "type": "text/plain",
            "title": title,
            "url": format!("{}/portal/{title}", self.base),
        }));
        self
    }

    /// Render the JSON payload.
    #[must_use]
    pub fn build(&self) -> String {
        json!({ "content_collection": self.items }).to_string()
    }

    /// Decode the payload into descriptors.
    ///
    /// # Errors
    ///
    /// Propagates feed decoding errors.
    pub fn descriptors(&self) -> CoreResult<Vec<ContentDescriptor>> {
        parse_feed(&self.build())
    }
}

/// Channel list payload for `site_id`; each entry is `(channel id, display title)`.
#[must_use]
pub fn mail_channels_json(site_id: &str, channels: &[(&str, &str)]) -> String {
    let items: Vec<Value> = channels
        .iter()
        .map(|(id, name)| {
            json!({
                "data": format!("/mailarchive/channel/{site_id}/{id}"),
                "displayTitle": name,
            })
        })
        .collect();
    json!({ "mailarchive_collection": items }).to_string()
}

/// Message payload with one message per `(id, subject, body)` entry.
#[must_use]
pub fn mail_messages_json(messages: &[(&str, &str, &str)]) -> String {
    let items: Vec<Value> = messages
        .iter()
        .map(|(id, subject, body)| {
            json!({
                "id": id,
                "headers": [
                    "Date: Mon, 1 Jan 2024 09:00:00",
                    "From: instructor@lms.test",
                    format!("Subject: {subject}"),
                ],
                "body": body,
                "attachments": [],
            })
        })
        .collect();
    json!({ "mailarchive_collection": items }).to_string()
}
