//! Request-level orchestration
//!
//! Wires the session store, batch transformer, archive engine and progress
//! hub into the operations the HTTP layer exposes. Every operation ends with
//! exactly one terminal progress event: complete on success, error otherwise.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::archive::{
    ArchiveEngine, ArchiveEntry, ArchiveError, ArchiveInput, CompressionPolicy, ExtractedFile,
};
use crate::error::ErrorClass;
use crate::progress::{ProgressHub, ProgressReporter};
use crate::session::{normalize_entry_path, SessionError, SessionId, SessionStore, StagedFile, StagingKind};
use crate::transform::{
    image_ops::resized_name, BatchTransformer, ResizeSpec, TransformError, TransformOptions,
    TransformResult, TransformStatus,
};

/// Name of the archive a zip request produces under `output/`
pub const ARCHIVE_FILE_NAME: &str = "archive.zip";

/// Name of the re-packaged archive a selective extraction produces
pub const SELECTED_FILE_NAME: &str = "selected.zip";

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// Everything a zip request needs once uploads are staged
#[derive(Debug, Clone, Default)]
pub struct ZipRequest {
    /// Staged uploads, in upload order
    pub files: Vec<StagedFile>,

    /// Client-side relative paths, parallel to the uploads as sent
    pub paths: Vec<String>,

    pub password: Option<String>,
    pub options: TransformOptions,
    pub compression: CompressionPolicy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipOutcome {
    pub session_id: SessionId,
    pub status: &'static str,
    pub file_name: String,
    pub size: u64,
    pub total_files: usize,
    pub directories: usize,
    pub bytes_in: u64,
    pub encrypted: bool,

    /// Per-file transform results, when images were processed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOutcome {
    pub session_id: SessionId,
    pub status: &'static str,
    pub total_files: usize,
    pub total_bytes: u64,
    pub files: Vec<ExtractedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeekOutcome {
    pub session_id: SessionId,
    pub entries: Vec<ArchiveEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOutcome {
    pub session_id: SessionId,
    pub status: &'static str,
    pub file_name: String,
    pub size: u64,
    pub total_files: usize,
    pub files: Vec<ExtractedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutcome {
    pub session_id: SessionId,
    pub status: &'static str,
    pub total_files: usize,
    pub failed: usize,
    pub files: Vec<TransformResult>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("No files uploaded")]
    NoFiles,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Session(e) => e.class(),
            Self::Transform(e) => e.class(),
            Self::Archive(e) => e.class(),
            Self::NoFiles | Self::InvalidPath(_) => ErrorClass::Input,
            Self::Task(_) => ErrorClass::Io,
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Clone)]
pub struct Pipeline {
    sessions: SessionStore,
    transformer: BatchTransformer,
    archives: ArchiveEngine,
    progress: ProgressHub,
}

impl Pipeline {
    pub fn new(sessions: SessionStore, transformer: BatchTransformer, progress: ProgressHub) -> Self {
        Self {
            sessions,
            transformer,
            archives: ArchiveEngine,
            progress,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn progress(&self) -> &ProgressHub {
        &self.progress
    }

    /// Report a failure that happened before an operation could start
    pub fn abort(&self, session: SessionId, message: &str) {
        self.progress.fail(session, message);
    }

    /// Emit the terminal event matching `result`
    fn finish<T>(&self, session: SessionId, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        match &result {
            Ok(_) => {
                self.progress.complete(session);
            }
            Err(e) => {
                tracing::warn!(session_id = %session, error = %e, "Operation failed");
                self.progress.fail(session, &e.to_string());
            }
        }
        result
    }

    fn reporter(&self, session: SessionId, status: &'static str) -> Arc<ProgressReporter> {
        Arc::new(ProgressReporter::new(self.progress.clone(), session, status))
    }

    // ========================================================================
    // Archive Operations
    // ========================================================================

    /// Optionally transform the uploads, then build `output/archive.zip`
    pub async fn create_zip(&self, session: SessionId, request: ZipRequest) -> Result<ZipOutcome, PipelineError> {
        let result = self.create_zip_inner(session, request).await;
        self.finish(session, result)
    }

    async fn create_zip_inner(&self, session: SessionId, request: ZipRequest) -> Result<ZipOutcome, PipelineError> {
        if request.files.is_empty() {
            return Err(PipelineError::NoFiles);
        }

        // Pair client paths with staged identities once, before any parallel work
        let mut zip_paths: HashMap<&str, String> = HashMap::new();
        for (file, raw) in request.files.iter().zip(request.paths.iter()) {
            if raw.trim().is_empty() {
                continue;
            }
            let normalized = normalize_entry_path(raw)
                .ok_or_else(|| PipelineError::InvalidPath(raw.clone()))?;
            zip_paths.insert(file.name.as_str(), normalized);
        }

        let mut transforms = Vec::new();
        let inputs: Vec<ArchiveInput> = if request.options.touches_images() {
            let processed_dir = self.sessions.staging_dir(session, StagingKind::Processed).await?;
            let reporter = self.reporter(session, "Processing");
            transforms = self
                .transformer
                .transform(&request.files, request.options, &processed_dir, reporter.as_ref())
                .await?;

            let staged: HashMap<&str, &StagedFile> =
                request.files.iter().map(|f| (f.name.as_str(), f)).collect();

            let mut inputs = Vec::with_capacity(transforms.len());
            for result in &transforms {
                let Some(original) = staged.get(result.source.as_str()) else {
                    return Err(PipelineError::Task(format!("unknown transform source {}", result.source)));
                };
                let path = match &result.output {
                    Some(path) => path.clone(),
                    None => {
                        tracing::warn!(
                            session_id = %session,
                            file = %original.name,
                            "Transform failed, archiving original"
                        );
                        original.path.clone()
                    }
                };
                let resized = match result.status {
                    TransformStatus::Resized { .. } => request.options.resize,
                    _ => None,
                };
                let name = in_archive_name(zip_paths.get(original.name.as_str()), original, resized);
                inputs.push(ArchiveInput::new(path, name));
            }
            inputs
        } else {
            request
                .files
                .iter()
                .map(|f| ArchiveInput::new(&f.path, in_archive_name(zip_paths.get(f.name.as_str()), f, None)))
                .collect()
        };

        let output_dir = self.sessions.staging_dir(session, StagingKind::Output).await?;
        let target = output_dir.join(ARCHIVE_FILE_NAME);
        let password = request.password.clone();
        let compression = request.compression;
        let archives = self.archives;
        let reporter = self.reporter(session, "Compressing");

        let built = tokio::task::spawn_blocking(move || {
            archives.build(&inputs, password.as_deref(), compression, &target, reporter.as_ref())
        })
        .await??;

        tracing::info!(
            session_id = %session,
            files = built.files,
            size = %crate::progress::format_bytes(built.size),
            "Zip created"
        );

        Ok(ZipOutcome {
            session_id: session,
            status: "complete",
            file_name: ARCHIVE_FILE_NAME.to_string(),
            size: built.size,
            total_files: built.files,
            directories: built.directories,
            bytes_in: built.bytes_in,
            encrypted: crate::archive::effective_password(request.password.as_deref()).is_some(),
            transforms,
        })
    }

    /// Extract a staged archive into `output/`
    pub async fn extract_all(
        &self,
        session: SessionId,
        archive: StagedFile,
        password: Option<String>,
    ) -> Result<ExtractOutcome, PipelineError> {
        let result = self.extract_all_inner(session, archive, password).await;
        self.finish(session, result)
    }

    async fn extract_all_inner(
        &self,
        session: SessionId,
        archive: StagedFile,
        password: Option<String>,
    ) -> Result<ExtractOutcome, PipelineError> {
        let output_dir = self.sessions.staging_dir(session, StagingKind::Output).await?;
        let archives = self.archives;
        let reporter = self.reporter(session, "Extracting");

        let files = tokio::task::spawn_blocking(move || {
            archives.extract_all(&archive.path, password.as_deref(), &output_dir, reporter.as_ref())
        })
        .await??;

        Ok(ExtractOutcome {
            session_id: session,
            status: "complete",
            total_files: files.len(),
            total_bytes: files.iter().map(|f| f.size).sum(),
            files,
        })
    }

    /// List a staged archive's entries; never writes to `output/`
    pub async fn peek(
        &self,
        session: SessionId,
        archive: StagedFile,
        password: Option<String>,
    ) -> Result<PeekOutcome, PipelineError> {
        let archives = self.archives;
        let result = tokio::task::spawn_blocking(move || {
            archives.list_entries(&archive.path, password.as_deref())
        })
        .await
        .map_err(PipelineError::from)
        .and_then(|listed| listed.map_err(PipelineError::from))
        .map(|entries| PeekOutcome {
            session_id: session,
            entries,
        });

        self.finish(session, result)
    }

    /// Extract the selected paths, then re-package them as `output/selected.zip`
    ///
    /// The new archive uses the same password as the source.
    pub async fn extract_selected(
        &self,
        session: SessionId,
        archive: StagedFile,
        paths: Vec<String>,
        password: Option<String>,
    ) -> Result<SelectOutcome, PipelineError> {
        let result = self.extract_selected_inner(session, archive, paths, password).await;
        self.finish(session, result)
    }

    async fn extract_selected_inner(
        &self,
        session: SessionId,
        archive: StagedFile,
        paths: Vec<String>,
        password: Option<String>,
    ) -> Result<SelectOutcome, PipelineError> {
        let selected_dir = self.sessions.staging_dir(session, StagingKind::Selected).await?;
        let output_dir = self.sessions.staging_dir(session, StagingKind::Output).await?;
        let target: PathBuf = output_dir.join(SELECTED_FILE_NAME);
        let archives = self.archives;
        let extracting = self.reporter(session, "Extracting");
        let compressing = self.reporter(session, "Compressing");

        let (files, built) = tokio::task::spawn_blocking(move || {
            let files = archives.extract_selected(
                &archive.path,
                &paths,
                password.as_deref(),
                &selected_dir,
                extracting.as_ref(),
            )?;
            let built = archives.repackage(
                &files,
                password.as_deref(),
                CompressionPolicy::Normal,
                &target,
                compressing.as_ref(),
            )?;
            Ok::<_, ArchiveError>((files, built))
        })
        .await??;

        Ok(SelectOutcome {
            session_id: session,
            status: "complete",
            file_name: SELECTED_FILE_NAME.to_string(),
            size: built.size,
            total_files: files.len(),
            files,
        })
    }

    // ========================================================================
    // Image Operations
    // ========================================================================

    /// Resize (and optionally strip) images straight into `output/`
    pub async fn resize_images(
        &self,
        session: SessionId,
        files: Vec<StagedFile>,
        options: TransformOptions,
    ) -> Result<ImageOutcome, PipelineError> {
        let result = match options.resize {
            Some(_) => self.transform_to_output(session, files, options).await,
            None => Err(TransformError::InvalidResizeSpec(String::new()).into()),
        };
        self.finish(session, result)
    }

    /// Strip metadata from images straight into `output/`
    pub async fn strip_metadata(
        &self,
        session: SessionId,
        files: Vec<StagedFile>,
    ) -> Result<ImageOutcome, PipelineError> {
        let options = TransformOptions {
            resize: None,
            strip_metadata: true,
        };
        let result = self.transform_to_output(session, files, options).await;
        self.finish(session, result)
    }

    async fn transform_to_output(
        &self,
        session: SessionId,
        files: Vec<StagedFile>,
        options: TransformOptions,
    ) -> Result<ImageOutcome, PipelineError> {
        if files.is_empty() {
            return Err(PipelineError::NoFiles);
        }

        let output_dir = self.sessions.staging_dir(session, StagingKind::Output).await?;
        let reporter = self.reporter(session, "Processing");
        let results = self
            .transformer
            .transform(&files, options, &output_dir, reporter.as_ref())
            .await?;

        Ok(ImageOutcome {
            session_id: session,
            status: "complete",
            total_files: results.len(),
            failed: results.iter().filter(|r| r.is_failed()).count(),
            files: results,
        })
    }
}

/// In-archive name for a file: the client path if one was sent, otherwise
/// the name it was uploaded under
///
/// Resized outputs carry the resize suffix on the final segment. The
/// session's `_N` collision suffix never reaches the archive.
fn in_archive_name(client_path: Option<&String>, file: &StagedFile, resized: Option<ResizeSpec>) -> String {
    let base = client_path.map(String::as_str).unwrap_or(&file.upload_name);
    match resized {
        Some(spec) => match base.rsplit_once('/') {
            Some((dir, leaf)) => format!("{}/{}", dir, resized_name(leaf, spec)),
            None => resized_name(base, spec),
        },
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{EventKind, NoopProgress};
    use crate::transform::ResizeSpec;
    use futures::StreamExt;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn pipeline(root: &std::path::Path) -> Pipeline {
        Pipeline::new(SessionStore::new(root), BatchTransformer::new(2), ProgressHub::default())
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])))
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    async fn stage(pipeline: &Pipeline, session: SessionId, name: &str, body: &[u8]) -> StagedFile {
        pipeline.sessions().stage_reader(session, name, body).await.unwrap()
    }

    fn archive_paths(pipeline: &Pipeline, path: &std::path::Path, password: Option<&str>) -> Vec<String> {
        pipeline
            .archives
            .list_entries(path, password)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect()
    }

    #[tokio::test]
    async fn test_create_zip_rebuilds_folders_by_identity() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let files = vec![
            stage(&pipeline, session, "a.png", &png_bytes(40, 20)).await,
            stage(&pipeline, session, "b.png", &png_bytes(10, 10)).await,
            stage(&pipeline, session, "readme.txt", b"read me").await,
        ];
        let request = ZipRequest {
            files,
            paths: vec![
                "photos/a.png".to_string(),
                String::new(),
                "docs/readme.txt".to_string(),
            ],
            password: Some("pw".to_string()),
            options: TransformOptions {
                resize: Some(ResizeSpec::Percent(50)),
                strip_metadata: false,
            },
            compression: CompressionPolicy::Normal,
        };

        let outcome = pipeline.create_zip(session, request).await.unwrap();
        assert_eq!(outcome.file_name, "archive.zip");
        assert_eq!(outcome.total_files, 3);
        assert!(outcome.encrypted);
        assert_eq!(outcome.transforms.len(), 3);

        let archive = pipeline.sessions().output_dir(session).join("archive.zip");
        assert_eq!(
            archive_paths(&pipeline, &archive, Some("pw")),
            vec![
                "photos/",
                "photos/a_50pct.png",
                "b_50pct.png",
                "docs/",
                "docs/readme.txt"
            ]
        );
    }

    #[tokio::test]
    async fn test_create_zip_keeps_client_names_for_same_named_uploads() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let request = ZipRequest {
            files: vec![
                stage(&pipeline, session, "IMG_001.txt", b"first").await,
                stage(&pipeline, session, "IMG_001.txt", b"second").await,
            ],
            paths: vec!["2023/IMG_001.txt".to_string(), "2024/IMG_001.txt".to_string()],
            ..ZipRequest::default()
        };
        assert_eq!(request.files[1].name, "IMG_001_1.txt");
        pipeline.create_zip(session, request).await.unwrap();

        let archive = pipeline.sessions().output_dir(session).join(ARCHIVE_FILE_NAME);
        assert_eq!(
            archive_paths(&pipeline, &archive, None),
            vec!["2023/", "2023/IMG_001.txt", "2024/", "2024/IMG_001.txt"]
        );

        // Resized copies take the suffix on the client's own file name
        let session = pipeline.sessions().create_session().await.unwrap();
        let request = ZipRequest {
            files: vec![
                stage(&pipeline, session, "cat.png", &png_bytes(20, 20)).await,
                stage(&pipeline, session, "cat.png", &png_bytes(20, 20)).await,
            ],
            paths: vec!["a/cat.png".to_string(), "b/cat.png".to_string()],
            options: TransformOptions {
                resize: Some(ResizeSpec::Percent(50)),
                strip_metadata: false,
            },
            ..ZipRequest::default()
        };
        pipeline.create_zip(session, request).await.unwrap();

        let archive = pipeline.sessions().output_dir(session).join(ARCHIVE_FILE_NAME);
        assert_eq!(
            archive_paths(&pipeline, &archive, None),
            vec!["a/", "a/cat_50pct.png", "b/", "b/cat_50pct.png"]
        );
    }

    #[tokio::test]
    async fn test_create_zip_streams_progress_then_completes() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();
        let stream = pipeline.progress().subscribe(session);

        let files = vec![
            stage(&pipeline, session, "one.txt", &[1u8; 100]).await,
            stage(&pipeline, session, "two.txt", &[2u8; 300]).await,
        ];
        let request = ZipRequest {
            files,
            ..ZipRequest::default()
        };
        pipeline.create_zip(session, request).await.unwrap();

        let events: Vec<_> = stream.collect().await;
        let compressing: Vec<_> = events
            .iter()
            .filter(|e| e.status == "Compressing")
            .map(|e| e.bytes_processed)
            .collect();
        assert_eq!(compressing, vec![100, 400]);

        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::Complete);
        assert_eq!(last.percent, 100.0);
        assert!(!pipeline.progress().is_subscribed(session));
    }

    #[tokio::test]
    async fn test_failed_transform_archives_original() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let files = vec![
            stage(&pipeline, session, "good.png", &png_bytes(8, 8)).await,
            stage(&pipeline, session, "bad.png", b"\x89PNG broken").await,
        ];
        let request = ZipRequest {
            files,
            options: TransformOptions {
                resize: None,
                strip_metadata: true,
            },
            ..ZipRequest::default()
        };

        let outcome = pipeline.create_zip(session, request).await.unwrap();
        assert_eq!(outcome.transforms.iter().filter(|t| t.is_failed()).count(), 1);

        let archive = pipeline.sessions().output_dir(session).join(ARCHIVE_FILE_NAME);
        assert_eq!(archive_paths(&pipeline, &archive, None), vec!["good.png", "bad.png"]);
    }

    #[tokio::test]
    async fn test_create_zip_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let request = ZipRequest {
            files: vec![stage(&pipeline, session, "a.txt", b"a").await],
            paths: vec!["../../a.txt".to_string()],
            ..ZipRequest::default()
        };
        let err = pipeline.create_zip(session, request).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);
        assert!(!pipeline.sessions().output_dir(session).join(ARCHIVE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_extract_selected_repackages_subset() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());

        // Build a source archive in its own session
        let source_session = pipeline.sessions().create_session().await.unwrap();
        let request = ZipRequest {
            files: vec![
                stage(&pipeline, source_session, "a.txt", b"alpha").await,
                stage(&pipeline, source_session, "c.txt", b"charlie").await,
            ],
            paths: vec!["a.txt".to_string(), "b/c.txt".to_string()],
            password: Some("pw".to_string()),
            ..ZipRequest::default()
        };
        pipeline.create_zip(source_session, request).await.unwrap();
        let source = pipeline.sessions().output_dir(source_session).join(ARCHIVE_FILE_NAME);

        let session = pipeline.sessions().create_session().await.unwrap();
        let bytes = std::fs::read(&source).unwrap();
        let staged = stage(&pipeline, session, "upload.zip", &bytes).await;

        let outcome = pipeline
            .extract_selected(session, staged, vec!["a.txt".to_string()], Some("pw".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.total_files, 1);
        assert_eq!(outcome.files[0].path_in_archive, "a.txt");

        let repacked = pipeline.sessions().output_dir(session).join(SELECTED_FILE_NAME);
        assert_eq!(archive_paths(&pipeline, &repacked, Some("pw")), vec!["a.txt"]);

        let first = pipeline.sessions().first_output_file(session).await.unwrap();
        assert_eq!(first, repacked);
    }

    #[tokio::test]
    async fn test_extract_all_reports_codec_failure_on_channel() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();
        let stream = pipeline.progress().subscribe(session);

        let staged = stage(&pipeline, session, "junk.zip", b"definitely not a zip").await;
        let err = pipeline.extract_all(session, staged, None).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Codec);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert!(!events[0].current_file.is_empty());
    }

    #[tokio::test]
    async fn test_peek_leaves_output_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let a = stage(&pipeline, session, "a.txt", b"a").await;
        let zip_path = temp_dir.path().join("peek.zip");
        pipeline
            .archives
            .build(&[ArchiveInput::new(&a.path, "x/a.txt")], None, CompressionPolicy::Store, &zip_path, &NoopProgress)
            .unwrap();

        let staged = stage(&pipeline, session, "peek.zip", &std::fs::read(&zip_path).unwrap()).await;
        let outcome = pipeline.peek(session, staged, None).await.unwrap();

        assert_eq!(outcome.entries.len(), 2);
        assert!(!pipeline.sessions().output_dir(session).exists());
    }

    #[tokio::test]
    async fn test_image_operations_write_to_output() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(temp_dir.path());
        let session = pipeline.sessions().create_session().await.unwrap();

        let files = vec![stage(&pipeline, session, "pic.png", &png_bytes(20, 20)).await];
        let outcome = pipeline
            .resize_images(
                session,
                files.clone(),
                TransformOptions {
                    resize: Some(ResizeSpec::Fit { width: 5, height: 5 }),
                    strip_metadata: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.failed, 0);
        assert!(pipeline.sessions().output_dir(session).join("pic_5x5.png").exists());

        let err = pipeline
            .resize_images(session, files.clone(), TransformOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);

        let stripped = pipeline.strip_metadata(session, files).await.unwrap();
        assert_eq!(stripped.total_files, 1);
        assert!(pipeline.sessions().output_dir(session).join("pic.png").exists());
    }

    #[test]
    fn test_in_archive_name() {
        let file = StagedFile {
            name: "cat_1.jpg".to_string(),
            upload_name: "cat.jpg".to_string(),
            size: 0,
            path: PathBuf::from("cat_1.jpg"),
        };
        let nested = "photos/2024/Cat.jpg".to_string();
        let percent = Some(ResizeSpec::Percent(50));

        assert_eq!(in_archive_name(Some(&nested), &file, None), "photos/2024/Cat.jpg");
        assert_eq!(in_archive_name(Some(&nested), &file, percent), "photos/2024/Cat_50pct.jpg");
        assert_eq!(in_archive_name(None, &file, None), "cat.jpg");
        assert_eq!(in_archive_name(None, &file, percent), "cat_50pct.jpg");
    }
}
