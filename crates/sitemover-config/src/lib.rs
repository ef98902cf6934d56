#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Environment-driven configuration for migration jobs.
//!
//! Layout: `model.rs` (typed config and loading), `validate.rs` (parsing/validation
//! helpers), `defaults.rs` (default values), `error.rs` (structured errors).

pub mod defaults;
pub mod error;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{AppConfig, ENV_PREFIX, RemoteStoreConfig};
