//! Writing new archives

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use crate::progress::ProgressSink;
use crate::session::{normalize_entry_path, STAGING_BUFFER_SIZE};

use super::types::{effective_password, ArchiveError, ArchiveInput, BuiltArchive, CompressionPolicy};

/// Entries at or above this size need ZIP64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Write `inputs` into a new archive at `target`, in input order
///
/// Parent folders of every in-archive path get explicit directory entries.
/// Progress advances after each file by its uncompressed size. On failure the
/// partial archive is removed.
pub fn build(
    inputs: &[ArchiveInput],
    password: Option<&str>,
    compression: CompressionPolicy,
    target: &Path,
    progress: &dyn ProgressSink,
) -> Result<BuiltArchive, ArchiveError> {
    if inputs.is_empty() {
        return Err(ArchiveError::Empty);
    }

    match write_archive(inputs, effective_password(password), compression, target, progress) {
        Ok(built) => Ok(built),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(target) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = ?target, error = %cleanup, "Failed to remove partial archive");
                }
            }
            Err(e)
        }
    }
}

fn write_archive(
    inputs: &[ArchiveInput],
    password: Option<&str>,
    compression: CompressionPolicy,
    target: &Path,
    progress: &dyn ProgressSink,
) -> Result<BuiltArchive, ArchiveError> {
    // Validate names and sizes before creating anything
    let mut seen = HashSet::new();
    let mut planned = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = normalize_entry_path(&input.name)
            .ok_or_else(|| ArchiveError::UnsafeEntry(input.name.clone()))?;
        if !seen.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        let size = fs::metadata(&input.path)?.len();
        planned.push((input, name, size));
    }

    let total: u64 = planned.iter().map(|(_, _, size)| size).sum();
    progress.start(total);

    let file_options = file_options(compression, password);
    let dir_options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Stored);

    let file = File::create(target)?;
    let mut writer = ZipWriter::new(BufWriter::with_capacity(STAGING_BUFFER_SIZE, file));
    let mut directories = HashSet::new();
    let mut bytes_in = 0u64;

    for (input, name, size) in &planned {
        for dir in parent_dirs(name) {
            if directories.insert(dir.clone()) {
                writer.add_directory(dir, dir_options)?;
            }
        }

        writer.start_file(name.as_str(), file_options.large_file(*size >= ZIP64_THRESHOLD))?;

        let mut source = File::open(&input.path)?;
        let copied = copy_into(&mut source, &mut writer)?;
        bytes_in += copied;

        tracing::debug!(entry = %name, bytes = copied, "Added archive entry");
        progress.advance(copied, name);
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    drop(inner);

    let size = fs::metadata(target)?.len();
    tracing::info!(
        path = ?target,
        files = planned.len(),
        directories = directories.len(),
        bytes_in = bytes_in,
        size = size,
        encrypted = password.is_some(),
        "Archive built"
    );

    Ok(BuiltArchive {
        path: target.to_path_buf(),
        files: planned.len(),
        directories: directories.len(),
        bytes_in,
        size,
    })
}

/// Entry options for `compression`, with AES-256 when a password is set
fn file_options<'a>(compression: CompressionPolicy, password: Option<&'a str>) -> FileOptions<'a, ()> {
    let options: FileOptions<'a, ()> = FileOptions::default()
        .compression_method(compression.method())
        .compression_level(compression.level());

    match password {
        Some(password) => options.with_aes_encryption(AesMode::Aes256, password),
        None => options,
    }
}

/// `a/b/c.txt` -> `["a/", "a/b/"]`
fn parent_dirs(name: &str) -> Vec<String> {
    let segments: Vec<&str> = name.split('/').collect();
    (1..segments.len())
        .map(|depth| format!("{}/", segments[..depth].join("/")))
        .collect()
}

/// Buffered copy from a source file into the current entry
fn copy_into<R: Read, W: Write>(source: &mut R, sink: &mut W) -> Result<u64, ArchiveError> {
    let mut buffer = vec![0u8; STAGING_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}
