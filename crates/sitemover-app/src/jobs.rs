//! File-backed job record store.
//!
//! # Design
//! - One pretty-printed JSON document per job at `<dir>/<job_id>.json`.
//! - Files are opened with `create_new`, so a record is written at most once; a second
//!   completion for the same id is rejected rather than overwriting the first.
//! - Job ids are restricted to characters that cannot escape the directory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sitemover_core::{CoreError, CoreResult, JobRecord, JobRecordStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Job record store writing JSON documents into a directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

fn store_error(operation: &'static str, job_id: &str, err: impl std::error::Error + Send + Sync + 'static) -> CoreError {
    CoreError::JobStore {
        operation,
        job_id: job_id.to_string(),
        source: Box::new(err),
    }
}

fn valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !job_id.starts_with('.')
}

impl FileJobStore {
    /// Store rooted at `dir`; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the record for `job_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the id contains characters outside `[A-Za-z0-9._-]`.
    pub fn record_path(&self, job_id: &str) -> CoreResult<PathBuf> {
        if !valid_job_id(job_id) {
            return Err(store_error(
                "job_store.path",
                job_id,
                io::Error::new(io::ErrorKind::InvalidInput, "job id contains unsupported characters"),
            ));
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    /// Read back the record for `job_id`, if it was written.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or decoded.
    pub async fn load(&self, job_id: &str) -> CoreResult<Option<JobRecord>> {
        let path = self.record_path(job_id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(store_error("job_store.read", job_id, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| store_error("job_store.decode", job_id, err))
    }
}

#[async_trait]
impl JobRecordStore for FileJobStore {
    async fn complete(&self, record: JobRecord) -> CoreResult<()> {
        let job_id = record.job_id.as_str();
        let path = self.record_path(job_id)?;
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|err| store_error("job_store.encode", job_id, err))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| store_error("job_store.create_dir", job_id, err))?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| store_error("job_store.create", job_id, err))?;
        file.write_all(&body)
            .await
            .map_err(|err| store_error("job_store.write", job_id, err))?;
        file.sync_all()
            .await
            .map_err(|err| store_error("job_store.sync", job_id, err))?;
        info!(job_id = %job_id, path = %path.display(), "job record written");
        Ok(())
    }
}
