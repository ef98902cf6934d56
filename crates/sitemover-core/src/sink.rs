//! Destination capability shared by the archive writer and the remote store client.

use std::fmt;

use async_trait::async_trait;

use crate::content::{ContentStream, content_from_bytes};
use crate::error::SinkResult;
use crate::link::render_link_page;
use crate::names::NamePolicy;
use crate::status::ItemStatus;

/// Opaque destination-side container identifier.
///
/// A path prefix for archives, a folder id for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkHandle(String);

impl SinkHandle {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive metadata attached to an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Declared size in bytes.
    pub size: u64,
    /// Free-text description.
    pub description: Option<String>,
    /// Author recorded by the source.
    pub author: Option<String>,
    /// Copyright/restriction marker.
    pub sensitive: bool,
}

/// Destination for a migration traversal.
///
/// Folder creation reports errors so the engine can tell a recoverable conflict from a
/// fatal failure; file writes report a per-item status and never unwind the traversal.
#[async_trait]
pub trait Sink: Send {
    /// Short label used in outcome text and metrics (`archive`, `Box`).
    fn label(&self) -> &'static str;

    /// Handle of the destination root container.
    fn root(&self) -> SinkHandle;

    /// Naming rules for this destination.
    fn name_policy(&self) -> NamePolicy;

    /// Largest object accepted, in bytes; `None` when unbounded.
    fn max_object_size(&self) -> Option<u64> {
        None
    }

    /// Create a folder named `name` under `parent`.
    ///
    /// # Errors
    ///
    /// `SinkError::Conflict` when the name is already used (carrying the existing handle),
    /// `SinkError::UnresolvedConflict` when the holder of the name cannot be located,
    /// any other variant for failures the traversal must not continue past.
    async fn create_folder(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        description: Option<&str>,
    ) -> SinkResult<SinkHandle>;

    /// Write `content` as a file named `name` under `parent`.
    async fn put_file(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        content: ContentStream,
        metadata: &FileMetadata,
    ) -> ItemStatus;

    /// Write a web link as a small redirecting HTML page.
    async fn put_link(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        title: &str,
        target: &str,
    ) -> ItemStatus {
        match render_link_page(title, target) {
            Ok(page) => {
                let metadata = FileMetadata {
                    size: page.len() as u64,
                    ..FileMetadata::default()
                };
                self.put_file(parent, name, content_from_bytes(page), &metadata)
                    .await
            }
            Err(err) => ItemStatus::failed(err.status_text()),
        }
    }
}
