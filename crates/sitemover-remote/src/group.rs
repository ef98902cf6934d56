//! Client for the group-messaging service.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sitemover_core::SinkResult;
use sitemover_core::mail::GroupPublisher;
use tracing::debug;
use url::Url;

use crate::error::{RemoteError, RemoteResult};

const RFC822_CONTENT_TYPE: &str = "message/rfc822";

/// Posts rendered mail messages to `{base}groups/{group_id}/messages`.
#[derive(Debug, Clone)]
pub struct GroupServiceClient {
    http: Client,
    base: Url,
}

impl GroupServiceClient {
    /// Client for the service rooted at `base`.
    #[must_use]
    pub fn new(http: Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { http, base }
    }

    fn messages_url(&self, group_id: &str) -> RemoteResult<Url> {
        let path = format!("groups/{}/messages", urlencoding::encode(group_id));
        self.base.join(&path).map_err(|source| RemoteError::Url {
            endpoint: path,
            source,
        })
    }

    async fn post(&self, group_id: &str, rfc822: &str) -> RemoteResult<()> {
        const OPERATION: &str = "group.publish";
        let url = self.messages_url(group_id)?;
        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, RFC822_CONTENT_TYPE)
            .body(rfc822.to_string())
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                operation: OPERATION,
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            debug!(group_id = %group_id, status = status.as_u16(), "group message accepted");
            return Ok(());
        }
        Err(RemoteError::Status {
            operation: OPERATION,
            url: url.to_string(),
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl GroupPublisher for GroupServiceClient {
    async fn publish(&self, group_id: &str, rfc822: &str) -> SinkResult<()> {
        Ok(self.post(group_id, rfc822).await?)
    }
}
