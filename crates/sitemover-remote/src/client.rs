//! REST calls against a Box-style file store.
//!
//! # Design
//! - Folder and metadata calls go to the API base URL; uploads go to the upload base URL.
//! - Non-success responses become [`RemoteError::Status`] with the body kept verbatim, so
//!   callers can inspect 409 conflict payloads.

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::{RemoteError, RemoteResult};

const ITEMS_PAGE_SIZE: usize = 1000;

/// Folder or file entry as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteItem {
    /// Item type (`folder`, `file`, `web_link`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Store identifier.
    pub id: String,
    /// Item name.
    #[serde(default)]
    pub name: String,
}

impl RemoteItem {
    /// Whether the item is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }
}

/// Result of a file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file was created.
    Created(RemoteItem),
    /// The parent already holds an item with that name.
    Conflict,
}

#[derive(Debug, Deserialize)]
struct ItemCollection {
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    entries: Vec<RemoteItem>,
}

/// Items listed in a 409 response body under `context_info.conflicts`.
///
/// The store reports a single object for some conflicts and an array for others; both are
/// accepted. Malformed bodies yield an empty list.
#[must_use]
pub fn conflicting_items(body: &str) -> Vec<RemoteItem> {
    let Ok(document) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    match document.pointer("/context_info/conflicts") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        Some(item @ Value::Object(_)) => serde_json::from_value(item.clone())
            .map(|item| vec![item])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Thin client for the remote store API.
#[derive(Debug, Clone)]
pub struct RemoteStoreClient {
    http: Client,
    api_base: Url,
    upload_base: Url,
    token: Option<String>,
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

impl RemoteStoreClient {
    /// Build a client from base URLs and an optional bearer token.
    #[must_use]
    pub fn new(http: Client, api_base: Url, upload_base: Url, token: Option<String>) -> Self {
        Self {
            http,
            api_base: with_trailing_slash(api_base),
            upload_base: with_trailing_slash(upload_base),
            token,
        }
    }

    fn endpoint(base: &Url, path: &str) -> RemoteResult<Url> {
        base.join(path).map_err(|source| RemoteError::Url {
            endpoint: path.to_string(),
            source,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        url: &Url,
        request: RequestBuilder,
    ) -> RemoteResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                operation,
                url: url.to_string(),
                source,
            })?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            operation,
            url: url.to_string(),
            status,
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        url: &Url,
        response: Response,
    ) -> RemoteResult<T> {
        let text = response
            .text()
            .await
            .map_err(|source| RemoteError::Transport {
                operation,
                url: url.to_string(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|source| RemoteError::Decode {
            operation,
            url: url.to_string(),
            source,
        })
    }

    /// Create a folder under `parent_id`.
    ///
    /// # Errors
    ///
    /// A 409 conflict surfaces as [`RemoteError::Status`] carrying the conflict body.
    pub async fn create_folder(&self, parent_id: &str, name: &str) -> RemoteResult<RemoteItem> {
        const OPERATION: &str = "remote.create_folder";
        let url = Self::endpoint(&self.api_base, "folders")?;
        let body = json!({ "name": name, "parent": { "id": parent_id } });
        let response = self
            .send(OPERATION, &url, self.http.post(url.clone()).json(&body))
            .await?;
        Self::decode(OPERATION, &url, response).await
    }

    /// List every item directly inside `folder_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when any page request fails.
    pub async fn folder_items(&self, folder_id: &str) -> RemoteResult<Vec<RemoteItem>> {
        const OPERATION: &str = "remote.folder_items";
        let path = format!("folders/{}/items", urlencoding::encode(folder_id));
        let mut url = Self::endpoint(&self.api_base, &path)?;
        let mut items = Vec::new();
        loop {
            url.query_pairs_mut()
                .clear()
                .append_pair("fields", "type,id,name")
                .append_pair("limit", &ITEMS_PAGE_SIZE.to_string())
                .append_pair("offset", &items.len().to_string());
            let response = self
                .send(OPERATION, &url, self.http.get(url.clone()))
                .await?;
            let page: ItemCollection = Self::decode(OPERATION, &url, response).await?;
            let fetched = page.entries.len();
            items.extend(page.entries);
            let total = page.total_count.unwrap_or(items.len());
            if fetched == 0 || fetched < ITEMS_PAGE_SIZE || items.len() >= total {
                return Ok(items);
            }
        }
    }

    /// Set the description of a folder.
    ///
    /// # Errors
    ///
    /// Returns an error when the update is rejected.
    pub async fn update_folder_description(
        &self,
        folder_id: &str,
        description: &str,
    ) -> RemoteResult<()> {
        let path = format!("folders/{}", urlencoding::encode(folder_id));
        let url = Self::endpoint(&self.api_base, &path)?;
        let body = json!({ "description": description });
        self.send(
            "remote.folder_description",
            &url,
            self.http.put(url.clone()).json(&body),
        )
        .await?;
        Ok(())
    }

    /// Set the description of a file.
    ///
    /// # Errors
    ///
    /// Returns an error when the update is rejected.
    pub async fn update_file_description(&self, file_id: &str, description: &str) -> RemoteResult<()> {
        let path = format!("files/{}", urlencoding::encode(file_id));
        let url = Self::endpoint(&self.api_base, &path)?;
        let body = json!({ "description": description });
        self.send(
            "remote.file_description",
            &url,
            self.http.put(url.clone()).json(&body),
        )
        .await?;
        Ok(())
    }

    /// Attach global properties metadata to a file.
    ///
    /// # Errors
    ///
    /// Returns an error when the metadata call is rejected.
    pub async fn create_file_metadata(&self, file_id: &str, metadata: &Value) -> RemoteResult<()> {
        let path = format!(
            "files/{}/metadata/global/properties",
            urlencoding::encode(file_id)
        );
        let url = Self::endpoint(&self.api_base, &path)?;
        self.send(
            "remote.file_metadata",
            &url,
            self.http.post(url.clone()).json(metadata),
        )
        .await?;
        Ok(())
    }

    /// Upload `len` bytes from `file` as `name` under `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and non-conflict error statuses.
    pub async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        file: tokio::fs::File,
        len: u64,
    ) -> RemoteResult<UploadOutcome> {
        const OPERATION: &str = "remote.upload_file";
        let url = Self::endpoint(&self.upload_base, "files/content")?;
        let attributes = json!({ "name": name, "parent": { "id": parent_id } }).to_string();
        let part = Part::stream_with_length(Body::from(file), len).file_name(name.to_string());
        let form = Form::new().text("attributes", attributes).part("file", part);

        let response = match self
            .send(OPERATION, &url, self.http.post(url.clone()).multipart(form))
            .await
        {
            Ok(response) => response,
            Err(err) if err.status() == Some(StatusCode::CONFLICT.as_u16()) => {
                debug!(name = %name, parent_id = %parent_id, "upload name conflict");
                return Ok(UploadOutcome::Conflict);
            }
            Err(err) => return Err(err),
        };
        let created: ItemCollection = Self::decode(OPERATION, &url, response).await?;
        created
            .entries
            .into_iter()
            .next()
            .map(UploadOutcome::Created)
            .ok_or_else(|| RemoteError::Status {
                operation: OPERATION,
                url: url.to_string(),
                status: StatusCode::CREATED.as_u16(),
                body: "upload response carried no entries".to_string(),
            })
    }
}
