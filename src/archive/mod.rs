//! Archive Engine
//!
//! Builds new ZIP containers (optionally AES-256 encrypted) and inspects or
//! extracts existing ones. Every operation here is blocking and touches a
//! single archive handle sequentially; callers run it on the blocking pool.

mod builder;
mod reader;
pub mod types;

use std::path::Path;

use crate::progress::ProgressSink;

pub use types::*;

/// Stateless entry point for archive work
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveEngine;

impl ArchiveEngine {
    /// Write `inputs` to a new archive at `target`
    pub fn build(
        &self,
        inputs: &[ArchiveInput],
        password: Option<&str>,
        compression: CompressionPolicy,
        target: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<BuiltArchive, ArchiveError> {
        builder::build(inputs, password, compression, target, progress)
    }

    /// Extract every entry of `archive` under `out_dir`
    pub fn extract_all(
        &self,
        archive: &Path,
        password: Option<&str>,
        out_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<ExtractedFile>, ArchiveError> {
        reader::extract_all(archive, password, out_dir, progress)
    }

    /// List entries without decompressing any entry body
    pub fn list_entries(
        &self,
        archive: &Path,
        password: Option<&str>,
    ) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        reader::list_entries(archive, password)
    }

    /// Extract the selected files and folders under `out_dir`
    pub fn extract_selected(
        &self,
        archive: &Path,
        paths: &[String],
        password: Option<&str>,
        out_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<ExtractedFile>, ArchiveError> {
        reader::extract_selected(archive, paths, password, out_dir, progress)
    }

    /// Package previously extracted files into a new archive at `target`,
    /// keeping their in-archive paths
    pub fn repackage(
        &self,
        files: &[ExtractedFile],
        password: Option<&str>,
        compression: CompressionPolicy,
        target: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<BuiltArchive, ArchiveError> {
        let inputs: Vec<ArchiveInput> = files
            .iter()
            .map(|f| ArchiveInput::new(&f.path, f.path_in_archive.clone()))
            .collect();
        builder::build(&inputs, password, compression, target, progress)
    }
}
