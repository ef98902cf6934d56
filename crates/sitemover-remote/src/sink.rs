//! Remote store sink.
//!
//! # Design
//! - Handles are store folder ids; the root is the folder chosen by the user.
//! - A folder name conflict is resolved to the existing folder: first from the conflict body,
//!   then by listing the parent. When neither names a folder, the conflict stays unresolved
//!   and only that folder's subtree is skipped.
//! - Descriptions and metadata are follow-up calls. Their failure is logged and never undoes
//!   the folder or file they describe.
//! - The folder-id cache belongs to one sink and one job.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use sitemover_core::{
    ContentStream, FileMetadata, ItemStatus, NamePolicy, Sink, SinkError, SinkHandle, SinkResult,
    spool,
};
use tracing::{debug, info, warn};

use crate::client::{RemoteItem, RemoteStoreClient, UploadOutcome, conflicting_items};
use crate::error::RemoteError;

/// Largest single object accepted by the store, in bytes.
pub const MAX_CONTENT_SIZE: u64 = 5 * 1024 * 1024 * 1024;

const SINK_LABEL: &str = "Box";

/// Sink creating folders and files in the remote store.
#[derive(Debug)]
pub struct RemoteStoreSink {
    client: RemoteStoreClient,
    root: SinkHandle,
    folders: HashMap<(String, String), SinkHandle>,
}

impl RemoteStoreSink {
    /// Sink writing beneath the folder `root_folder_id`.
    #[must_use]
    pub fn new(client: RemoteStoreClient, root_folder_id: impl Into<String>) -> Self {
        Self {
            client,
            root: SinkHandle::new(root_folder_id),
            folders: HashMap::new(),
        }
    }

    fn cache_key(parent: &SinkHandle, name: &str) -> (String, String) {
        (parent.as_str().to_string(), name.to_lowercase())
    }

    fn matching_folder(items: Vec<RemoteItem>, name: &str) -> Option<SinkHandle> {
        items
            .into_iter()
            .find(|item| item.is_folder() && item.name.eq_ignore_ascii_case(name))
            .map(|item| SinkHandle::new(item.id))
    }

    async fn resolve_conflict(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        body: &str,
    ) -> SinkResult<SinkHandle> {
        let key = Self::cache_key(parent, name);
        if let Some(existing) = self.folders.get(&key) {
            return Ok(existing.clone());
        }
        let unresolved = |detail: String| {
            warn!(parent = %parent, name = %name, detail = %detail, "conflicting folder not found");
            SinkError::UnresolvedConflict {
                name: name.to_string(),
                detail,
            }
        };
        let existing = match Self::matching_folder(conflicting_items(body), name) {
            Some(existing) => Some(existing),
            None => {
                debug!(parent = %parent, name = %name, "conflict body named no folder; listing parent");
                let items = self.client.folder_items(parent.as_str()).await.map_err(|err| {
                    unresolved(format!(
                        "Cannot list {SINK_LABEL} folder {parent}: {}",
                        err.detail()
                    ))
                })?;
                Self::matching_folder(items, name)
            }
        };
        let Some(existing) = existing else {
            return Err(unresolved(format!(
                "Cannot find conflicting {SINK_LABEL} folder id for folder name {name}"
            )));
        };
        self.folders.insert(key, existing.clone());
        Ok(existing)
    }

    async fn describe_file(&self, file_id: &str, metadata: &FileMetadata) {
        if let Some(description) = metadata.description.as_deref().filter(|d| !d.is_empty())
            && let Err(err) = self.client.update_file_description(file_id, description).await
        {
            warn!(file_id = %file_id, error = %err, "file description not applied");
        }
        let properties = json!({
            "copyrightAlert": if metadata.sensitive { "true" } else { "false" },
            "author": metadata.author.clone().unwrap_or_default(),
        });
        if let Err(err) = self.client.create_file_metadata(file_id, &properties).await {
            warn!(file_id = %file_id, error = %err, "file metadata not applied");
        }
    }
}

#[async_trait]
impl Sink for RemoteStoreSink {
    fn label(&self) -> &'static str {
        SINK_LABEL
    }

    fn root(&self) -> SinkHandle {
        self.root.clone()
    }

    fn name_policy(&self) -> NamePolicy {
        NamePolicy::REMOTE_STORE
    }

    fn max_object_size(&self) -> Option<u64> {
        Some(MAX_CONTENT_SIZE)
    }

    async fn create_folder(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        description: Option<&str>,
    ) -> SinkResult<SinkHandle> {
        match self.client.create_folder(parent.as_str(), name).await {
            Ok(created) => {
                let handle = SinkHandle::new(created.id);
                info!(parent = %parent, name = %name, folder_id = %handle, "remote folder created");
                if let Some(description) = description.filter(|d| !d.is_empty())
                    && let Err(err) = self
                        .client
                        .update_folder_description(handle.as_str(), description)
                        .await
                {
                    warn!(folder_id = %handle, error = %err, "folder description not applied");
                }
                self.folders
                    .insert(Self::cache_key(parent, name), handle.clone());
                Ok(handle)
            }
            Err(RemoteError::Status {
                status: 409, body, ..
            }) => {
                let existing = self.resolve_conflict(parent, name, &body).await?;
                Err(SinkError::Conflict {
                    name: name.to_string(),
                    existing,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put_file(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        content: ContentStream,
        metadata: &FileMetadata,
    ) -> ItemStatus {
        let spooled = match spool(content).await {
            Ok(spooled) => spooled,
            Err(err) => {
                return ItemStatus::failed(format!(
                    "problem reading content for file {name}: {err}"
                ));
            }
        };
        let file = tokio::fs::File::from_std(spooled.file);
        match self
            .client
            .upload_file(parent.as_str(), name, file, spooled.len)
            .await
        {
            Ok(UploadOutcome::Created(created)) => {
                info!(parent = %parent, name = %name, file_id = %created.id, bytes = spooled.len, "remote file uploaded");
                self.describe_file(&created.id, metadata).await;
                ItemStatus::ok("")
            }
            Ok(UploadOutcome::Conflict) => ItemStatus::failed(format!(
                "There is already a file with name {name} - file was not added"
            )),
            Err(err) => {
                warn!(parent = %parent, name = %name, error = %err, "remote upload failed");
                ItemStatus::failed(format!(
                    "problem uploading file {name} with length {}: {}",
                    spooled.len,
                    err.detail()
                ))
            }
        }
    }
}
