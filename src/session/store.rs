//! Filesystem-backed session store
//!
//! Every session is a directory `<root>/<session-id>/`. Creating `input/`
//! claims the session for a single operation. The other staging directories
//! are created lazily with `create_dir_all`, which is idempotent, so
//! concurrent first access from the transformer's workers is safe.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};

use super::sanitize::{resolve_within, sanitize_file_name};
use super::types::{SessionError, SessionId, StagedFile, StagingKind};

/// Chunk size for buffered staging copies: 8KB
pub const STAGING_BUFFER_SIZE: usize = 8 * 1024;

/// Upper bound on `name_1.ext`, `name_2.ext`, ... collision suffixes
const MAX_NAME_ATTEMPTS: usize = 10_000;

// ============================================================================
// Session Store
// ============================================================================

/// Maps session ids to their directory trees under a root temp directory
#[derive(Clone, Debug)]
pub struct SessionStore {
    root: Arc<PathBuf>,
}

impl SessionStore {
    /// Create a store rooted at `root` (created on first session)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Root temp directory holding every session
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a session (may not exist)
    pub fn session_dir(&self, id: SessionId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Canonical location download and extraction read from
    ///
    /// Not created here; callers check existence and treat absence as not found.
    pub fn output_dir(&self, id: SessionId) -> PathBuf {
        self.session_dir(id).join(StagingKind::Output.dir_name())
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Allocate a fresh session and create its root directory
    pub async fn create_session(&self) -> Result<SessionId, SessionError> {
        let id = SessionId::new();
        fs::create_dir_all(self.session_dir(id)).await?;

        tracing::info!(session_id = %id, "Created session");
        Ok(id)
    }

    /// Look up an existing session by its client-supplied id
    pub async fn open_session(&self, raw: &str) -> Result<SessionId, SessionError> {
        let id = SessionId::parse(raw)?;
        match fs::metadata(self.session_dir(id)).await {
            Ok(meta) if meta.is_dir() => Ok(id),
            Ok(_) => Err(SessionError::NotFound(raw.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SessionError::NotFound(raw.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reuse a pre-allocated session if one is named, otherwise create one,
    /// then claim it for the calling operation
    pub async fn open_or_create(&self, raw: Option<&str>) -> Result<SessionId, SessionError> {
        let id = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => self.open_session(raw).await?,
            None => self.create_session().await?,
        };
        self.claim(id).await?;
        Ok(id)
    }

    /// Reserve a session for exactly one operation
    ///
    /// Creating `input/` is the claim. It is atomic, so of two requests naming
    /// the same session only one gets through.
    pub async fn claim(&self, id: SessionId) -> Result<(), SessionError> {
        let input_dir = self.session_dir(id).join(StagingKind::Input.dir_name());
        match fs::create_dir(&input_dir).await {
            Ok(()) => {
                tracing::debug!(session_id = %id, "Claimed session");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(session_id = %id, "Session already claimed");
                Err(SessionError::InUse(id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SessionError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of a staging directory, created on first access
    pub async fn staging_dir(
        &self,
        id: SessionId,
        kind: StagingKind,
    ) -> Result<PathBuf, SessionError> {
        let dir = self.session_dir(id).join(kind.dir_name());
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    // ========================================================================
    // Staging
    // ========================================================================

    /// Open a new file under `input/` for an upload named `original_name`
    ///
    /// The name is sanitized and made unique within the session so it can
    /// serve as the file's identity through the rest of the pipeline.
    pub async fn begin_stage(
        &self,
        id: SessionId,
        original_name: &str,
    ) -> Result<StagingWriter, SessionError> {
        let input_dir = self.staging_dir(id, StagingKind::Input).await?;
        let base_name = sanitize_file_name(original_name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = numbered_name(&base_name, attempt);
            let path = input_dir.join(&name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(StagingWriter {
                        writer: BufWriter::with_capacity(STAGING_BUFFER_SIZE, file),
                        name,
                        upload_name: base_name,
                        path,
                        written: 0,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Too many uploads named {}", base_name),
        )))
    }

    /// Stage an upload from any async reader using 8KB chunks
    pub async fn stage_reader<R>(
        &self,
        id: SessionId,
        original_name: &str,
        mut reader: R,
    ) -> Result<StagedFile, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        let mut writer = self.begin_stage(id, original_name).await?;
        let mut buffer = vec![0u8; STAGING_BUFFER_SIZE];

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_chunk(&buffer[..read]).await?;
        }

        writer.finish().await
    }

    // ========================================================================
    // Output Lookup
    // ========================================================================

    /// Resolve a client-requested relative path against `output/`
    ///
    /// Rejects traversal lexically, then again after symlink resolution.
    pub async fn resolve_output(
        &self,
        id: SessionId,
        relative: &str,
    ) -> Result<PathBuf, SessionError> {
        let output_dir = self.output_dir(id);
        let candidate = resolve_within(&output_dir, relative)
            .ok_or_else(|| SessionError::PathEscape(relative.to_string()))?;

        let canonical_root = canonicalize_or_missing(&output_dir, relative).await?;
        let canonical = canonicalize_or_missing(&candidate, relative).await?;
        if !canonical.starts_with(&canonical_root) {
            return Err(SessionError::PathEscape(relative.to_string()));
        }

        match fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(canonical),
            Ok(_) => Err(SessionError::OutputNotFound(relative.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SessionError::OutputNotFound(relative.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// First regular file in `output/`, by name
    pub async fn first_output_file(&self, id: SessionId) -> Result<PathBuf, SessionError> {
        let output_dir = self.output_dir(id);
        let mut entries = match fs::read_dir(&output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SessionError::OutputNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        files
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::OutputNotFound(id.to_string()))
    }
}

// ============================================================================
// Staging Writer
// ============================================================================

/// Buffered writer for one upload being staged
pub struct StagingWriter {
    writer: BufWriter<File>,
    name: String,
    upload_name: String,
    path: PathBuf,
    written: u64,
}

impl StagingWriter {
    /// Identity the staged file will carry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one chunk of upload bytes
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SessionError> {
        self.writer.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and describe the staged file
    pub async fn finish(mut self) -> Result<StagedFile, SessionError> {
        self.writer.flush().await?;

        tracing::debug!(
            file = %self.name,
            bytes = self.written,
            "Staged upload"
        );

        Ok(StagedFile {
            name: self.name,
            upload_name: self.upload_name,
            size: self.written,
            path: self.path,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `photo.jpg`, `photo_1.jpg`, `photo_2.jpg`, ...
fn numbered_name(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    match base.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &base[..dot], attempt, &base[dot..]),
        _ => format!("{}_{}", base, attempt),
    }
}

async fn canonicalize_or_missing(path: &Path, requested: &str) -> Result<PathBuf, SessionError> {
    match fs::canonicalize(path).await {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(SessionError::OutputNotFound(requested.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
