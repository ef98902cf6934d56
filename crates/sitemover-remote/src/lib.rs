//! Remote file-store destination and group-messaging client.
//!
//! Layout: error.rs (remote errors), client.rs (REST calls against the store), sink.rs (the
//! sink and its folder-id cache), group.rs (group-messaging publisher).
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

pub mod client;
pub mod error;
pub mod group;
pub mod sink;

pub use client::{RemoteItem, RemoteStoreClient, UploadOutcome};
pub use error::{RemoteError, RemoteResult};
pub use group::GroupServiceClient;
pub use sink::{MAX_CONTENT_SIZE, RemoteStoreSink};
