//! Default values applied when a variable is unset.

/// Remote store API base.
pub(crate) const REMOTE_API_URL: &str = "https://api.box.com/2.0/";
/// Remote store upload base.
pub(crate) const REMOTE_UPLOAD_URL: &str = "https://upload.box.com/api/2.0/";
/// Directory holding job record documents.
pub(crate) const JOB_DIR: &str = "./jobs";
/// Per-request HTTP timeout in seconds.
pub(crate) const HTTP_TIMEOUT_SECS: u64 = 300;
/// Jobs allowed to run at once.
pub(crate) const MAX_CONCURRENT_JOBS: usize = 4;
/// Log level used when neither `RUST_LOG` nor the config sets one.
pub(crate) const LOG_LEVEL: &str = "info";
