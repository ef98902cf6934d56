//! Fake collaborators for engine and dispatcher tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use sitemover_core::mail::GroupPublisher;
use sitemover_core::{
    ContentSource, ContentStream, CoreError, CoreResult, FileMetadata, ItemStatus, JobRecord,
    JobRecordStore, NamePolicy, Sink, SinkError, SinkHandle, SinkResult, SourceError,
    SourceResult, content_from_bytes,
};
use tokio::sync::Mutex;

/// Call observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// `create_folder` succeeded.
    Folder {
        /// Parent handle.
        parent: String,
        /// Requested name.
        name: String,
        /// Handle returned.
        handle: String,
        /// Description passed along.
        description: Option<String>,
    },
    /// `put_file` drained its content.
    File {
        /// Parent handle.
        parent: String,
        /// File name.
        name: String,
        /// Bytes received.
        bytes: Vec<u8>,
        /// Metadata passed along.
        metadata: FileMetadata,
    },
}

/// In-memory sink that records every call.
#[derive(Debug)]
pub struct RecordingSink {
    /// Calls in order.
    pub events: Vec<SinkEvent>,
    conflicts: HashMap<String, SinkHandle>,
    failures: HashSet<String>,
    max_object_size: Option<u64>,
    next_id: u32,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    /// Sink with root handle `root` and no scripted behaviour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            conflicts: HashMap::new(),
            failures: HashSet::new(),
            max_object_size: None,
            next_id: 0,
        }
    }

    /// Report a conflict resolving to `existing` when `name` is created.
    #[must_use]
    pub fn with_conflict(mut self, name: &str, existing: &str) -> Self {
        self.conflicts
            .insert(name.to_string(), SinkHandle::new(existing));
        self
    }

    /// Fail folder creation for `name` with a backend error.
    #[must_use]
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failures.insert(name.to_string());
        self
    }

    /// Advertise a maximum object size.
    #[must_use]
    pub const fn with_max_object_size(mut self, limit: u64) -> Self {
        self.max_object_size = Some(limit);
        self
    }

    /// `(parent, name)` of every file written, in order.
    #[must_use]
    pub fn files(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::File { parent, name, .. } => Some((parent.clone(), name.clone())),
                SinkEvent::Folder { .. } => None,
            })
            .collect()
    }

    /// `(parent, name)` of every folder created, in order.
    #[must_use]
    pub fn folders(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Folder { parent, name, .. } => Some((parent.clone(), name.clone())),
                SinkEvent::File { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn label(&self) -> &'static str {
        "recording"
    }

    fn root(&self) -> SinkHandle {
        SinkHandle::new("root")
    }

    fn name_policy(&self) -> NamePolicy {
        NamePolicy::REMOTE_STORE
    }

    fn max_object_size(&self) -> Option<u64> {
        self.max_object_size
    }

    async fn create_folder(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        description: Option<&str>,
    ) -> SinkResult<SinkHandle> {
        if let Some(existing) = self.conflicts.get(name) {
            return Err(SinkError::Conflict {
                name: name.to_string(),
                existing: existing.clone(),
            });
        }
        if self.failures.contains(name) {
            return Err(SinkError::backend("create_folder", "scripted failure"));
        }
        self.next_id += 1;
        let handle = SinkHandle::new(format!("folder-{}", self.next_id));
        self.events.push(SinkEvent::Folder {
            parent: parent.to_string(),
            name: name.to_string(),
            handle: handle.to_string(),
            description: description.map(str::to_string),
        });
        Ok(handle)
    }

    async fn put_file(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        mut content: ContentStream,
        metadata: &FileMetadata,
    ) -> ItemStatus {
        let mut bytes = Vec::new();
        while let Some(chunk) = content.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(err) => return ItemStatus::failed(err.to_string()),
            }
        }
        self.events.push(SinkEvent::File {
            parent: parent.to_string(),
            name: name.to_string(),
            bytes,
            metadata: metadata.clone(),
        });
        ItemStatus::ok("")
    }
}

/// Source serving fixed payloads by access URL; unknown URLs answer 404.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    payloads: HashMap<String, Bytes>,
}

impl StaticSource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `payload` for `access_url`.
    #[must_use]
    pub fn with(mut self, access_url: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.payloads.insert(access_url.into(), payload.into());
        self
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch(&self, access_url: &str) -> SourceResult<ContentStream> {
        self.payloads.get(access_url).map_or_else(
            || {
                Err(SourceError::Status {
                    operation: "fetch",
                    url: access_url.to_string(),
                    status: 404,
                })
            },
            |payload| Ok(content_from_bytes(payload.clone())),
        )
    }
}

/// Job record store kept in memory; a second write for the same job is rejected.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: Mutex<Vec<JobRecord>>,
}

impl InMemoryJobStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored records.
    pub async fn records(&self) -> Vec<JobRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl JobRecordStore for InMemoryJobStore {
    async fn complete(&self, record: JobRecord) -> CoreResult<()> {
        let mut records = self.records.lock().await;
        if records.iter().any(|stored| stored.job_id == record.job_id) {
            return Err(CoreError::JobStore {
                operation: "complete",
                job_id: record.job_id,
                source: "job record already written".into(),
            });
        }
        records.push(record);
        Ok(())
    }
}

/// Group publisher that records posted messages.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    posted: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    /// Empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(group id, message)` pairs posted so far.
    pub async fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().await.clone()
    }
}

#[async_trait]
impl GroupPublisher for RecordingPublisher {
    async fn publish(&self, group_id: &str, rfc822: &str) -> SinkResult<()> {
        self.posted
            .lock()
            .await
            .push((group_id.to_string(), rfc822.to_string()));
        Ok(())
    }
}
