//! HTTP client for the source LMS: site content feeds, content bytes, and mail archives.
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

pub use client::{SESSION_PARAM, SourceClient};
