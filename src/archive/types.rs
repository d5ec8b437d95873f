//! Archive Engine types

use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::result::ZipError;
use zip::CompressionMethod;

use crate::error::ErrorClass;

// ============================================================================
// Compression Policy
// ============================================================================

/// Compression preset for new archives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionPolicy {
    /// No compression
    Store,
    Faster,
    Fast,
    #[default]
    Normal,
    Maximum,
    Ultra,
}

impl CompressionPolicy {
    /// Lenient, case-insensitive parse; anything unrecognized is `Normal`
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::Normal;
        };

        match raw.to_ascii_uppercase().as_str() {
            "STORE" => Self::Store,
            "FASTER" => Self::Faster,
            "FAST" => Self::Fast,
            "NORMAL" => Self::Normal,
            "MAXIMUM" => Self::Maximum,
            "ULTRA" => Self::Ultra,
            _ => {
                if !raw.is_empty() {
                    tracing::debug!(value = %raw, "Unknown compression level, using NORMAL");
                }
                Self::Normal
            }
        }
    }

    pub fn method(&self) -> CompressionMethod {
        match self {
            Self::Store => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        }
    }

    /// Deflate level, `None` for stored entries
    pub fn level(&self) -> Option<i64> {
        match self {
            Self::Store => None,
            Self::Faster => Some(2),
            Self::Fast => Some(3),
            Self::Normal => Some(5),
            Self::Maximum => Some(7),
            Self::Ultra => Some(9),
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

/// One item inside a container, read from its header only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Last path segment
    pub name: String,

    /// Full path inside the archive
    pub path: String,

    /// Uncompressed size
    pub size: u64,

    #[serde(rename = "directory")]
    pub is_directory: bool,
}

/// A file to add to a new archive under `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInput {
    pub path: PathBuf,

    /// In-archive path, `/`-separated
    pub name: String,
}

impl ArchiveInput {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Use the file's own name as its in-archive path
    pub fn flat(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(path, name)
    }
}

/// A file written by an extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFile {
    /// Normalized path inside the source archive
    pub path_in_archive: String,

    #[serde(skip)]
    pub path: PathBuf,

    pub size: u64,
}

/// Summary of a freshly written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArchive {
    pub path: PathBuf,

    /// File entries written
    pub files: usize,

    /// Directory entries written
    pub directories: usize,

    /// Uncompressed bytes added
    pub bytes_in: u64,

    /// Size of the archive on disk
    pub size: u64,
}

/// Empty or absent passwords mean "not encrypted"
pub fn effective_password(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

// ============================================================================
// Error Types
// ============================================================================

/// Archive Engine error types
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("No files to archive")]
    Empty,

    #[error("Duplicate entry in archive: {0}")]
    DuplicateEntry(String),

    #[error("No paths selected")]
    EmptySelection,

    #[error("Invalid selection path: {0}")]
    InvalidSelection(String),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Unsafe entry path in archive: {0}")]
    UnsafeEntry(String),

    #[error("Archive is encrypted and no password was given")]
    PasswordRequired,

    #[error("Wrong password or damaged encrypted entry")]
    InvalidPassword,

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("Unsupported archive: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Empty
            | Self::DuplicateEntry(_)
            | Self::EmptySelection
            | Self::InvalidSelection(_) => ErrorClass::Input,
            Self::EntryNotFound(_) => ErrorClass::NotFound,
            Self::UnsafeEntry(_)
            | Self::PasswordRequired
            | Self::InvalidPassword
            | Self::Corrupt(_)
            | Self::Unsupported(_) => ErrorClass::Codec,
            Self::Io(_) => ErrorClass::Io,
        }
    }
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => Self::Io(e),
            ZipError::InvalidPassword => Self::InvalidPassword,
            ZipError::UnsupportedArchive(msg) => Self::Unsupported(msg.to_string()),
            ZipError::FileNotFound => Self::EntryNotFound("requested entry".to_string()),
            other => Self::Corrupt(other.to_string()),
        }
    }
}
