//! Supported archive containers.

use std::fmt;
use std::str::FromStr;

use crate::error::ArchiveError;

/// Container format of the produced archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// Deflate-compressed zip.
    #[default]
    Zip,
    /// Gzip-compressed tar stream.
    TarGz,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    /// MIME type for the archive body.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Zip => "application/zip",
            Self::TarGz => "application/gzip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zip => "zip",
            Self::TarGz => "tar-gz",
        })
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "tar-gz" | "tar.gz" | "tgz" => Ok(Self::TarGz),
            other => Err(ArchiveError::UnsupportedFormat {
                value: other.to_string(),
            }),
        }
    }
}
