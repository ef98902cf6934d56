//! Archive destination for site content migrations.
//!
//! Layout: error.rs (archive errors), format.rs (zip / tar.gz selection), sink.rs (the sink).
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

pub mod error;
pub mod format;
pub mod sink;

pub use error::{ArchiveError, ArchiveResult};
pub use format::ArchiveFormat;
pub use sink::ArchiveSink;
