//! Background job dispatch.
//!
//! # Design
//! - One tokio task per job; a semaphore bounds how many jobs run at once.
//! - Each job runs inside an `info_span!("migration", job_id, site_id, kind, build_sha)`.
//! - The traversal inside a job stays sequential; only whole jobs run concurrently.
//! - Exactly one job record is written per job, after the payload is known. A failed write
//!   is logged and reported on the completion, never retried.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use sitemover_core::{JobRecord, JobRecordStore, MigrationStatusPayload, Outcome, describe_error};
use sitemover_telemetry::{Metrics, build_sha};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

/// Kind of migration a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Site content into a compressed archive.
    Archive,
    /// Site content into the remote store.
    Upload,
    /// Mail archive into a compressed archive.
    MailArchive,
    /// Mail archive into a messaging group.
    MailGroup,
}

impl JobKind {
    /// Label used in spans and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Upload => "upload",
            Self::MailArchive => "mail-archive",
            Self::MailGroup => "mail-group",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Job identifier; also names the job record.
    pub job_id: String,
    /// Source site being migrated.
    pub site_id: String,
    /// Migration kind.
    pub kind: JobKind,
    /// Destination label used for item metrics.
    pub sink_label: &'static str,
}

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobCompletion<T> {
    /// Job identifier.
    pub job_id: String,
    /// Final status payload.
    pub payload: MigrationStatusPayload<T>,
    /// Why the job record could not be written, if it could not.
    pub record_error: Option<String>,
}

/// Runs migration jobs on background tasks.
#[derive(Clone)]
pub struct MigrationDispatcher {
    permits: Arc<Semaphore>,
    store: Arc<dyn JobRecordStore>,
    metrics: Metrics,
}

impl fmt::Debug for MigrationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDispatcher")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl MigrationDispatcher {
    /// Dispatcher running at most `max_concurrent` jobs at once.
    #[must_use]
    pub fn new(max_concurrent: usize, store: Arc<dyn JobRecordStore>, metrics: Metrics) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            store,
            metrics,
        }
    }

    /// Spawn `work` as job `spec`. The returned handle may be awaited or dropped; the job
    /// runs to completion either way.
    pub fn submit<F, T>(&self, spec: JobSpec, work: F) -> JoinHandle<JobCompletion<T>>
    where
        F: Future<Output = MigrationStatusPayload<T>> + Send + 'static,
        T: Outcome + Serialize + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let store = Arc::clone(&self.store);
        let metrics = self.metrics.clone();
        let span = info_span!(
            "migration",
            job_id = %spec.job_id,
            site_id = %spec.site_id,
            kind = %spec.kind,
            build_sha = %build_sha(),
        );

        tokio::spawn(
            async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(err) => {
                        warn!(error = %err, "job semaphore closed; running unbounded");
                        None
                    }
                };
                metrics.job_started();
                info!("migration started");

                let payload = work.await;

                for outcome in &payload.data {
                    let status = if outcome.is_failure() { "failure" } else { "success" };
                    metrics.inc_item(spec.sink_label, status);
                }
                metrics.inc_migration(spec.kind.as_str(), payload.status.as_str());
                metrics.job_finished();

                let record_error = match JobRecord::completed(spec.job_id.clone(), &payload) {
                    Ok(record) => store.complete(record).await.err(),
                    Err(err) => Some(err),
                }
                .map(|err| {
                    error!(error = %describe_error(&err), "job record not written");
                    describe_error(&err)
                });

                info!(
                    status = payload.status.as_str(),
                    items = payload.data.len(),
                    "migration finished"
                );
                JobCompletion {
                    job_id: spec.job_id,
                    payload,
                    record_error,
                }
            }
            .instrument(span),
        )
    }
}
