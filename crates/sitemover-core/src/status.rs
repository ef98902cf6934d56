//! Per-item outcomes and the migration-level status payload.
//!
//! # Design
//! - Outcomes are append-only and keep feed order.
//! - Failures carry the `failure` marker at the start of their status text; the overall
//!   status is derived by scanning for it. A halted run is always a failure.

use std::error::Error;

use serde::{Deserialize, Serialize};

/// Marker prefixed to every failed status text.
pub const FAILURE_MARKER: &str = "failure";

/// Result of writing one item to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    /// Whether the write failed.
    pub failed: bool,
    /// Human-readable detail; may be empty for plain successes.
    pub detail: String,
}

impl ItemStatus {
    /// Successful write.
    #[must_use]
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            failed: false,
            detail: detail.into(),
        }
    }

    /// Failed write.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            failed: true,
            detail: detail.into(),
        }
    }
}

/// Anything that can be scanned for the failure marker.
pub trait Outcome {
    /// Whether this outcome records a failure.
    fn is_failure(&self) -> bool;
}

/// One processed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Source path of the descriptor, when it could be derived.
    pub source_path: Option<String>,
    /// Descriptor title.
    pub title: String,
    /// Status text; empty means success.
    pub status_text: String,
}

impl ItemOutcome {
    /// Successful outcome with an informational note.
    #[must_use]
    pub fn success(source_path: Option<&str>, title: &str, note: impl Into<String>) -> Self {
        Self {
            source_path: source_path.map(str::to_string),
            title: title.to_string(),
            status_text: note.into(),
        }
    }

    /// Failed outcome; the failure marker is prefixed to `detail`.
    #[must_use]
    pub fn failure(source_path: Option<&str>, title: &str, detail: &str) -> Self {
        Self {
            source_path: source_path.map(str::to_string),
            title: title.to_string(),
            status_text: format!("{FAILURE_MARKER}: {detail}"),
        }
    }

    /// Outcome from a sink write status.
    #[must_use]
    pub fn from_status(source_path: Option<&str>, title: &str, status: ItemStatus) -> Self {
        if status.failed {
            Self::failure(source_path, title, &status.detail)
        } else {
            Self::success(source_path, title, status.detail)
        }
    }
}

impl Outcome for ItemOutcome {
    fn is_failure(&self) -> bool {
        self.status_text.starts_with(FAILURE_MARKER)
    }
}

/// Overall migration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// No outcome carried the failure marker and the run was not halted.
    Success,
    /// At least one failure, or the run halted early.
    Failure,
}

impl MigrationStatus {
    /// Lowercase label used in payloads and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Final status payload handed to the job record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusPayload<T> {
    /// Overall status.
    pub status: MigrationStatus,
    /// Job-level detail: the halt reason or a site-level error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Itemised outcomes in feed order.
    pub data: Vec<T>,
}

impl<T> MigrationStatusPayload<T> {
    /// Payload for a job that failed before any item was processed.
    #[must_use]
    pub fn site_failure(detail: impl Into<String>) -> Self {
        Self {
            status: MigrationStatus::Failure,
            detail: Some(detail.into()),
            data: Vec::new(),
        }
    }

    /// Whether the payload reports success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, MigrationStatus::Success)
    }
}

/// Fold outcomes into a payload. `halt` is the reason the traversal stopped early, if it did.
#[must_use]
pub fn aggregate<T: Outcome>(outcomes: Vec<T>, halt: Option<String>) -> MigrationStatusPayload<T> {
    let failed = halt.is_some() || outcomes.iter().any(Outcome::is_failure);
    MigrationStatusPayload {
        status: if failed {
            MigrationStatus::Failure
        } else {
            MigrationStatus::Success
        },
        detail: halt,
        data: outcomes,
    }
}

/// Render an error and its source chain on one line.
#[must_use]
pub fn describe_error(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        text.push_str(": ");
        text.push_str(&source.to_string());
        current = source.source();
    }
    text
}
