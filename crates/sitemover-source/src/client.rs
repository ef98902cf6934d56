//! Source system client.
//!
//! # Design
//! - Every request carries the session id as the `_sessionId` query parameter; session
//!   establishment happens elsewhere.
//! - Feed endpoints are read fully and decoded by `sitemover-core`; content fetches are
//!   streamed to the caller without buffering.
//! - Non-success statuses become [`SourceError::Status`] so a failed fetch is reported
//!   per item by the engine.

use std::io;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Response};
use sitemover_core::mail::{MailChannel, MailChannelContent, MailMessage, parse_channels, parse_messages};
use sitemover_core::{
    ContentDescriptor, ContentSource, ContentStream, SourceError, SourceResult, parse_feed,
};
use tracing::{debug, info};
use url::Url;

/// Query parameter carrying the source session id.
pub const SESSION_PARAM: &str = "_sessionId";

/// Client bound to one source base URL and one session.
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: Client,
    base: Url,
    session_id: String,
}

impl SourceClient {
    /// Client for the source rooted at `base`, authenticated by `session_id`.
    #[must_use]
    pub fn new(http: Client, mut base: Url, session_id: impl Into<String>) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http,
            base,
            session_id: session_id.into(),
        }
    }

    fn with_session(&self, mut url: Url) -> Url {
        url.query_pairs_mut()
            .append_pair(SESSION_PARAM, &self.session_id);
        url
    }

    fn direct_url(&self, operation: &'static str, path: &str) -> SourceResult<Url> {
        self.base
            .join(path)
            .map(|url| self.with_session(url))
            .map_err(|err| SourceError::Transport {
                operation,
                url: path.to_string(),
                source: Box::new(err),
            })
    }

    async fn get(&self, operation: &'static str, url: &Url) -> SourceResult<Response> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| SourceError::Transport {
                operation,
                url: redact(url),
                source: Box::new(err),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                operation,
                url: redact(url),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_text(&self, operation: &'static str, url: &Url) -> SourceResult<String> {
        self.get(operation, url)
            .await?
            .text()
            .await
            .map_err(|err| SourceError::Transport {
                operation,
                url: redact(url),
                source: Box::new(err),
            })
    }

    /// Fetch and decode the flat content feed of `site_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the feed cannot be fetched or decoded.
    pub async fn site_content(&self, site_id: &str) -> SourceResult<Vec<ContentDescriptor>> {
        const OPERATION: &str = "source.site_content";
        let path = format!("direct/content/site/{}.json", urlencoding::encode(site_id));
        let url = self.direct_url(OPERATION, &path)?;
        let payload = self.get_text(OPERATION, &url).await?;
        let descriptors = parse_feed(&payload).map_err(|source| SourceError::Decode {
            operation: OPERATION,
            url: redact(&url),
            source,
        })?;
        info!(site_id = %site_id, descriptors = descriptors.len(), "site content feed loaded");
        Ok(descriptors)
    }

    /// Fetch the mail channels of `site_id`; `None` when the site has no mail archive.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel list cannot be fetched or decoded.
    pub async fn mail_channels(&self, site_id: &str) -> SourceResult<Option<Vec<MailChannel>>> {
        const OPERATION: &str = "source.mail_channels";
        let path = format!(
            "direct/mailarchive/siteChannels/{}.json",
            urlencoding::encode(site_id)
        );
        let url = self.direct_url(OPERATION, &path)?;
        let payload = self.get_text(OPERATION, &url).await?;
        parse_channels(site_id, &payload).map_err(|source| SourceError::Decode {
            operation: OPERATION,
            url: redact(&url),
            source,
        })
    }

    /// Fetch the messages of one channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the messages cannot be fetched or decoded.
    pub async fn channel_messages(
        &self,
        site_id: &str,
        channel_id: &str,
    ) -> SourceResult<Vec<MailMessage>> {
        const OPERATION: &str = "source.channel_messages";
        let path = format!(
            "direct/mailarchive/channelMessages/{}/{}.json",
            urlencoding::encode(site_id),
            urlencoding::encode(channel_id)
        );
        let url = self.direct_url(OPERATION, &path)?;
        let payload = self.get_text(OPERATION, &url).await?;
        parse_messages(&payload).map_err(|source| SourceError::Decode {
            operation: OPERATION,
            url: redact(&url),
            source,
        })
    }

    /// Fetch every channel of `site_id` with its messages.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel list or any channel's messages cannot be loaded.
    pub async fn mail_archive(&self, site_id: &str) -> SourceResult<Option<Vec<MailChannelContent>>> {
        let Some(channels) = self.mail_channels(site_id).await? else {
            return Ok(None);
        };
        let mut contents = Vec::with_capacity(channels.len());
        for channel in channels {
            let messages = self.channel_messages(site_id, &channel.id).await?;
            debug!(site_id = %site_id, channel = %channel.id, messages = messages.len(), "channel loaded");
            contents.push(MailChannelContent { channel, messages });
        }
        Ok(Some(contents))
    }
}

#[async_trait]
impl ContentSource for SourceClient {
    async fn fetch(&self, access_url: &str) -> SourceResult<ContentStream> {
        const OPERATION: &str = "source.fetch";
        let url = Url::parse(access_url).map_err(|err| SourceError::Transport {
            operation: OPERATION,
            url: access_url.to_string(),
            source: Box::new(err),
        })?;
        let url = self.with_session(url);
        let response = self.get(OPERATION, &url).await?;
        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(stream))
    }
}

fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SESSION_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if pairs.is_empty() {
        shown.set_query(None);
    } else {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    shown.to_string()
}
