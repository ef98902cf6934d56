//! Byte streams flowing from the source system into sinks.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};

/// Fixed chunk size used when copying content into destinations.
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// Boxed stream of content chunks fetched from the source system.
pub type ContentStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Wrap an in-memory payload as a single-chunk content stream.
#[must_use]
pub fn content_from_bytes(payload: impl Into<Bytes>) -> ContentStream {
    let payload = payload.into();
    Box::pin(stream::once(async move { Ok(payload) }))
}

/// Content drained from a stream into an anonymous temporary file.
#[derive(Debug)]
pub struct SpooledContent {
    /// Temporary file positioned at offset zero.
    pub file: File,
    /// Number of bytes written.
    pub len: u64,
}

/// Drain `content` into an anonymous temporary file so it can be re-read with a known length.
///
/// The file is removed by the OS once the handle is dropped.
///
/// # Errors
///
/// Returns the first stream error or any IO failure while writing the spool file.
pub async fn spool(mut content: ContentStream) -> io::Result<SpooledContent> {
    let mut writer = BufWriter::with_capacity(STREAM_CHUNK_SIZE, tempfile::tempfile()?);
    let mut len = 0_u64;
    while let Some(chunk) = content.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk)?;
        len += chunk.len() as u64;
    }
    let mut file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(SpooledContent { file, len })
}

/// Copy `reader` into `writer` through a fixed [`STREAM_CHUNK_SIZE`] buffer.
///
/// # Errors
///
/// Returns the first read or write failure.
pub fn copy_chunked(reader: &mut impl Read, writer: &mut impl Write) -> io::Result<u64> {
    let mut buffer = vec![0_u8; STREAM_CHUNK_SIZE];
    let mut copied = 0_u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(copied),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
    }
}
