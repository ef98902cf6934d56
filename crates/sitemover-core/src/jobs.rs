//! Job record persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::status::MigrationStatusPayload;

/// Final record of one migration job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub job_id: String,
    /// Completion timestamp.
    pub ended_at: DateTime<Utc>,
    /// Serialised status payload (`{status, data}`).
    pub status: Value,
}

impl JobRecord {
    /// Build a record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised.
    pub fn completed<T: Serialize>(
        job_id: impl Into<String>,
        payload: &MigrationStatusPayload<T>,
    ) -> CoreResult<Self> {
        let status = serde_json::to_value(payload).map_err(|source| CoreError::Serialize {
            operation: "job_record.serialise",
            source,
        })?;
        Ok(Self {
            job_id: job_id.into(),
            ended_at: Utc::now(),
            status,
        })
    }
}

/// Destination for finished job records. Written to exactly once per job.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Persist the final record for a job.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be stored or was already written.
    async fn complete(&self, record: JobRecord) -> CoreResult<()>;
}
