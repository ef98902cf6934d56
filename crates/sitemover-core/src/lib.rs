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

//! Flat-to-hierarchical reconciliation engine for site content migrations.
//!
//! Layout:
//! - `descriptor.rs`: content feed decoding and access-URL normalisation
//! - `names.rs`: sink-safe naming, sibling disambiguation, folder rename tracking
//! - `engine.rs`: the container-stack traversal that drives a [`Sink`]
//! - `sink.rs` / `source.rs`: collaborator traits for destinations and content fetches
//! - `status.rs`: per-item outcomes and the migration-level status payload
//! - `mail/`: mail archive migration into a sink or a group-messaging service
//! - `jobs.rs`: job record persistence seam

pub mod content;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod link;
pub mod mail;
pub mod names;
pub mod sink;
pub mod source;
pub mod status;

pub use content::{
    ContentStream, STREAM_CHUNK_SIZE, SpooledContent, content_from_bytes, copy_chunked, spool,
};
pub use descriptor::{
    ACCEPT_PATH, ACCESS_MARKER, CITATION_ACCESS_MARKER, ContentDescriptor, ContentKind,
    container_path, copyright_accept_url, normalize_access_url, parse_feed,
};
pub use engine::{ContainerFrame, Reconciler, StepFlow, TraversalReport};
pub use error::{CoreError, CoreResult, SinkError, SinkResult, SourceError, SourceResult};
pub use jobs::{JobRecord, JobRecordStore};
pub use link::{LinkError, render_link_page};
pub use names::{NamePolicy, NameRegistry, sanitize};
pub use sink::{FileMetadata, Sink, SinkHandle};
pub use source::ContentSource;
pub use status::{
    FAILURE_MARKER, ItemOutcome, ItemStatus, MigrationStatus, MigrationStatusPayload, Outcome,
    aggregate, describe_error,
};
