//! Archive sink writing zip or tar.gz output.
//!
//! # Design
//! - Handles are entry path prefixes; the root is the empty prefix and every folder handle
//!   ends with `/`.
//! - The caller's output is written strictly forward. Zip needs a seekable target, so zip
//!   entries are assembled in an anonymous temporary file and copied out on
//!   [`ArchiveSink::finish`]; tar.gz entries stream straight into the output.
//! - Folder creation never reports a conflict: sibling names are already unique per run.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use async_trait::async_trait;
use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use sitemover_core::{
    ContentStream, FileMetadata, ItemStatus, NamePolicy, Sink, SinkError, SinkHandle, SinkResult,
    copy_chunked, describe_error, spool,
};
use tracing::{debug, warn};
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::error::{ArchiveError, ArchiveResult};
use crate::format::ArchiveFormat;

const SINK_LABEL: &str = "archive";
const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

enum Backend<W: Write> {
    Zip { zip: ZipWriter<File>, out: W },
    TarGz(tar::Builder<GzEncoder<W>>),
}

/// Sink producing a single compressed archive.
pub struct ArchiveSink<W: Write> {
    backend: Backend<W>,
    format: ArchiveFormat,
    entries: usize,
}

impl<W: Write> std::fmt::Debug for ArchiveSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSink")
            .field("format", &self.format)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

fn zip_options() -> FileOptions {
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(FILE_MODE)
        .large_file(true)
}

fn tar_header(entry_type: tar::EntryType, size: u64, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(u64::try_from(Utc::now().timestamp()).unwrap_or_default());
    header
}

impl<W: Write> ArchiveSink<W> {
    /// Start an archive of `format` written to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error when the zip staging file cannot be created.
    pub fn new(format: ArchiveFormat, out: W) -> ArchiveResult<Self> {
        let backend = match format {
            ArchiveFormat::Zip => {
                let staging = tempfile::tempfile()
                    .map_err(|err| ArchiveError::io("archive.staging", "", err))?;
                Backend::Zip {
                    zip: ZipWriter::new(staging),
                    out,
                }
            }
            ArchiveFormat::TarGz => {
                let encoder = GzEncoder::new(out, Compression::best());
                let mut builder = tar::Builder::new(encoder);
                builder.mode(tar::HeaderMode::Deterministic);
                Backend::TarGz(builder)
            }
        };
        Ok(Self {
            backend,
            format,
            entries: 0,
        })
    }

    /// Archive format being written.
    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Number of entries written so far.
    #[must_use]
    pub const fn entries(&self) -> usize {
        self.entries
    }

    /// Close the archive and return the output writer.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive trailer cannot be written or copied out.
    pub fn finish(self) -> ArchiveResult<W> {
        match self.backend {
            Backend::Zip { mut zip, mut out } => {
                let mut staging = zip
                    .finish()
                    .map_err(|err| ArchiveError::zip("archive.finish", "", err))?;
                staging
                    .seek(SeekFrom::Start(0))
                    .map_err(|err| ArchiveError::io("archive.rewind", "", err))?;
                io::copy(&mut staging, &mut out)
                    .map_err(|err| ArchiveError::io("archive.copy_out", "", err))?;
                out.flush()
                    .map_err(|err| ArchiveError::io("archive.flush", "", err))?;
                Ok(out)
            }
            Backend::TarGz(builder) => {
                let encoder = builder
                    .into_inner()
                    .map_err(|err| ArchiveError::io("archive.finish", "", err))?;
                let mut out = encoder
                    .finish()
                    .map_err(|err| ArchiveError::io("archive.finish", "", err))?;
                out.flush()
                    .map_err(|err| ArchiveError::io("archive.flush", "", err))?;
                Ok(out)
            }
        }
    }

    fn add_directory(&mut self, path: &str) -> ArchiveResult<()> {
        match &mut self.backend {
            Backend::Zip { zip, .. } => zip
                .add_directory(path, zip_options().unix_permissions(DIR_MODE))
                .map_err(|err| ArchiveError::zip("archive.add_directory", path, err))?,
            Backend::TarGz(builder) => {
                let mut header = tar_header(tar::EntryType::Directory, 0, DIR_MODE);
                builder
                    .append_data(&mut header, path, io::empty())
                    .map_err(|err| ArchiveError::io("archive.add_directory", path, err))?;
            }
        }
        self.entries += 1;
        Ok(())
    }

    /// Entries are opened only after the whole content has been spooled, so a failed fetch
    /// never leaves a truncated entry behind.
    async fn add_file(&mut self, path: &str, content: ContentStream) -> ArchiveResult<u64> {
        let mut spooled = spool(content)
            .await
            .map_err(|err| ArchiveError::io("archive.spool", path, err))?;
        let written = match &mut self.backend {
            Backend::Zip { zip, .. } => {
                zip.start_file(path, zip_options())
                    .map_err(|err| ArchiveError::zip("archive.start_file", path, err))?;
                copy_chunked(&mut spooled.file, zip)
                    .map_err(|err| ArchiveError::io("archive.write_entry", path, err))?
            }
            Backend::TarGz(builder) => {
                let mut header = tar_header(tar::EntryType::Regular, spooled.len, FILE_MODE);
                builder
                    .append_data(&mut header, path, spooled.file)
                    .map_err(|err| ArchiveError::io("archive.write_entry", path, err))?;
                spooled.len
            }
        };
        self.entries += 1;
        Ok(written)
    }
}

#[async_trait]
impl<W: Write + Send> Sink for ArchiveSink<W> {
    fn label(&self) -> &'static str {
        SINK_LABEL
    }

    fn root(&self) -> SinkHandle {
        SinkHandle::new("")
    }

    fn name_policy(&self) -> NamePolicy {
        NamePolicy::ARCHIVE
    }

    async fn create_folder(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        _description: Option<&str>,
    ) -> SinkResult<SinkHandle> {
        let path = format!("{parent}{name}/");
        debug!(entry = %path, "archive folder entry");
        self.add_directory(&path).map_err(|err| {
            SinkError::backend("archive.create_folder", describe_error(&err))
        })?;
        Ok(SinkHandle::new(path))
    }

    async fn put_file(
        &mut self,
        parent: &SinkHandle,
        name: &str,
        content: ContentStream,
        _metadata: &FileMetadata,
    ) -> ItemStatus {
        let path = format!("{parent}{name}");
        match self.add_file(&path, content).await {
            Ok(written) => {
                debug!(entry = %path, bytes = written, "archive file entry");
                ItemStatus::ok("")
            }
            Err(err) => {
                warn!(entry = %path, error = %err, "archive entry failed");
                ItemStatus::failed(format!(
                    "problem writing archive entry {path}: {}",
                    describe_error(&err)
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use bytes::Bytes;
    use flate2::read::GzDecoder;
    use futures_util::stream;
    use sitemover_core::content_from_bytes;
    use std::io::{Cursor, Read};

    #[tokio::test]
    async fn zip_archive_reads_back() -> Result<()> {
        let mut sink = ArchiveSink::new(ArchiveFormat::Zip, Vec::new())?;
        let folder = sink
            .create_folder(&sink.root(), "Week 1", None)
            .await?;
        assert_eq!(folder.as_str(), "Week 1/");
        let status = sink
            .put_file(&folder, "notes.txt", content_from_bytes("hello"), &FileMetadata::default())
            .await;
        assert!(!status.failed);
        assert_eq!(sink.entries(), 2);

        let bytes = sink.finish()?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("Week 1/notes.txt")?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        assert_eq!(text, "hello");
        Ok(())
    }

    #[tokio::test]
    async fn tar_gz_archive_streams_entries() -> Result<()> {
        let mut sink = ArchiveSink::new(ArchiveFormat::TarGz, Vec::new())?;
        let folder = sink.create_folder(&sink.root(), "docs", None).await?;
        let status = sink
            .put_link(&folder, "Library.html", "Library", "https://library.test/")
            .await;
        assert!(!status.failed);

        let bytes = sink.finish()?;
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut names = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_string_lossy().into_owned();
            if path.ends_with(".html") {
                let mut page = String::new();
                entry.read_to_string(&mut page)?;
                assert!(page.contains("https://library.test/"));
            }
            names.push(path.trim_end_matches('/').to_string());
        }
        assert_eq!(names, vec!["docs", "docs/Library.html"]);
        Ok(())
    }

    fn interrupted_content() -> ContentStream {
        Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial-bytes")),
            Err(io::Error::other("reset")),
        ]))
    }

    #[tokio::test]
    async fn failed_stream_is_a_per_item_failure() -> Result<()> {
        let mut sink = ArchiveSink::new(ArchiveFormat::TarGz, Vec::new())?;
        let status = sink
            .put_file(&sink.root(), "broken.bin", interrupted_content(), &FileMetadata::default())
            .await;
        assert!(status.failed);
        assert!(status.detail.starts_with("problem writing archive entry broken.bin"));
        assert_eq!(sink.entries(), 0);

        let bytes = sink.finish()?;
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        assert_eq!(archive.entries()?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn interrupted_zip_entry_is_left_out() -> Result<()> {
        let mut sink = ArchiveSink::new(ArchiveFormat::Zip, Vec::new())?;
        let status = sink
            .put_file(&sink.root(), "broken.bin", interrupted_content(), &FileMetadata::default())
            .await;
        assert!(status.failed);
        assert!(status.detail.starts_with("problem writing archive entry broken.bin"));
        let status = sink
            .put_file(&sink.root(), "ok.txt", content_from_bytes("fine"), &FileMetadata::default())
            .await;
        assert!(!status.failed);
        assert_eq!(sink.entries(), 1);

        let bytes = sink.finish()?;
        let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["ok.txt"]);
        Ok(())
    }
}
