//! Inspecting and extracting existing archives

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::progress::ProgressSink;
use crate::session::{normalize_entry_path, resolve_within, STAGING_BUFFER_SIZE};

use super::types::{effective_password, ArchiveEntry, ArchiveError, ExtractedFile};

/// Header-level facts about one entry
struct EntryInfo {
    index: usize,
    raw_name: String,
    /// `None` when the name would escape the extraction root
    normalized: Option<String>,
    size: u64,
    is_dir: bool,
    encrypted: bool,
}

// ============================================================================
// Inspect
// ============================================================================

/// List entries from the central directory without extracting anything
///
/// With a password, one encrypted entry is opened to check the key, so a
/// wrong password fails here instead of at extraction time.
pub fn list_entries(
    archive_path: &Path,
    password: Option<&str>,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = open_archive(archive_path)?;
    let infos = read_headers(&mut archive)?;

    if let Some(password) = effective_password(password) {
        if let Some(info) = infos.iter().find(|i| i.encrypted && !i.is_dir) {
            archive.by_index_decrypt(info.index, password.as_bytes())?;
        }
    }

    Ok(infos
        .into_iter()
        .map(|info| {
            let path = info.raw_name.trim_end_matches('/').to_string();
            let name = path.rsplit('/').next().unwrap_or_default().to_string();
            ArchiveEntry {
                name,
                path: info.raw_name,
                size: info.size,
                is_directory: info.is_dir,
            }
        })
        .collect())
}

// ============================================================================
// Extract
// ============================================================================

/// Extract every entry into `out_dir`, keeping relative paths
///
/// All entry paths are checked before anything is written; one unsafe path
/// rejects the whole archive.
pub fn extract_all(
    archive_path: &Path,
    password: Option<&str>,
    out_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut archive = open_archive(archive_path)?;
    let infos = read_headers(&mut archive)?;

    if let Some(unsafe_entry) = infos.iter().find(|i| i.normalized.is_none()) {
        return Err(ArchiveError::UnsafeEntry(unsafe_entry.raw_name.clone()));
    }

    let selected: Vec<&EntryInfo> = infos.iter().collect();
    extract_entries(&mut archive, &selected, effective_password(password), out_dir, progress)
}

/// Extract only `paths` (files, or folders with everything beneath them)
///
/// Every requested path must match at least one entry.
pub fn extract_selected(
    archive_path: &Path,
    paths: &[String],
    password: Option<&str>,
    out_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    if paths.iter().all(|p| p.trim().is_empty()) {
        return Err(ArchiveError::EmptySelection);
    }

    let mut wanted = Vec::new();
    for raw in paths.iter().filter(|p| !p.trim().is_empty()) {
        let normalized = normalize_entry_path(raw.trim())
            .ok_or_else(|| ArchiveError::InvalidSelection(raw.clone()))?;
        wanted.push(normalized);
    }

    let mut archive = open_archive(archive_path)?;
    let infos = read_headers(&mut archive)?;

    let mut chosen = BTreeSet::new();
    for selection in &wanted {
        let folder = format!("{}/", selection);
        let mut matched = false;
        for info in &infos {
            let Some(name) = info.normalized.as_deref() else {
                continue;
            };
            if name == selection || name.starts_with(&folder) {
                chosen.insert(info.index);
                matched = true;
            }
        }
        if !matched {
            return Err(ArchiveError::EntryNotFound(selection.clone()));
        }
    }

    let selected: Vec<&EntryInfo> = infos.iter().filter(|i| chosen.contains(&i.index)).collect();
    extract_entries(&mut archive, &selected, effective_password(password), out_dir, progress)
}

fn extract_entries(
    archive: &mut ZipArchive<File>,
    entries: &[&EntryInfo],
    password: Option<&str>,
    out_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    if password.is_none() && entries.iter().any(|e| e.encrypted && !e.is_dir) {
        return Err(ArchiveError::PasswordRequired);
    }

    progress.start(entries.iter().filter(|e| !e.is_dir).map(|e| e.size).sum());
    fs::create_dir_all(out_dir)?;

    let mut touched = Vec::new();
    match write_entries(archive, entries, password, out_dir, progress, &mut touched) {
        Ok(extracted) => {
            tracing::info!(
                archive_entries = entries.len(),
                files = extracted.len(),
                out_dir = ?out_dir,
                "Archive extracted"
            );
            Ok(extracted)
        }
        Err(e) => {
            discard_partial(out_dir, &touched);
            Err(e)
        }
    }
}

/// Write each entry under `out_dir`, recording every path created
fn write_entries(
    archive: &mut ZipArchive<File>,
    entries: &[&EntryInfo],
    password: Option<&str>,
    out_dir: &Path,
    progress: &dyn ProgressSink,
    touched: &mut Vec<PathBuf>,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut extracted = Vec::new();
    for info in entries {
        let relative = info
            .normalized
            .as_deref()
            .ok_or_else(|| ArchiveError::UnsafeEntry(info.raw_name.clone()))?;
        let target = resolve_within(out_dir, relative)
            .ok_or_else(|| ArchiveError::UnsafeEntry(info.raw_name.clone()))?;

        if info.is_dir {
            fs::create_dir_all(&target)?;
            touched.push(target);
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entry = match (info.encrypted, password) {
            (true, Some(password)) => archive.by_index_decrypt(info.index, password.as_bytes())?,
            _ => archive.by_index(info.index).map_err(|e| match e {
                ZipError::Io(io) => ArchiveError::Corrupt(io.to_string()),
                other => other.into(),
            })?,
        };

        let file = File::create(&target)?;
        touched.push(target.clone());
        let mut sink = BufWriter::with_capacity(STAGING_BUFFER_SIZE, file);
        let written = copy_entry(&mut entry, &mut sink, info.encrypted)?;
        sink.flush()?;

        tracing::debug!(entry = %relative, bytes = written, "Extracted archive entry");
        progress.advance(written, relative);

        extracted.push(ExtractedFile {
            path_in_archive: relative.to_string(),
            path: target,
            size: written,
        });
    }
    Ok(extracted)
}

/// Remove what a failed extraction wrote, then any folders it left empty
fn discard_partial(out_dir: &Path, touched: &[PathBuf]) {
    let mut dirs = BTreeSet::new();
    for path in touched {
        if path.is_file() {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = ?path, error = %e, "Failed to remove partial extraction");
            }
        } else {
            dirs.insert(path.clone());
        }
        for ancestor in path.ancestors().skip(1) {
            if ancestor == out_dir || !ancestor.starts_with(out_dir) {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    // Reverse order visits children before their parents; non-empty folders stay
    for dir in dirs.iter().rev() {
        let _ = fs::remove_dir(dir);
    }
    tracing::debug!(out_dir = ?out_dir, files = touched.len(), "Discarded partial extraction");
}

// ============================================================================
// Helpers
// ============================================================================

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| match e {
        // Short reads while locating the central directory mean a damaged file
        ZipError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            ArchiveError::Corrupt(io.to_string())
        }
        other => other.into(),
    })
}

fn read_headers(archive: &mut ZipArchive<File>) -> Result<Vec<EntryInfo>, ArchiveError> {
    let mut infos = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let raw_name = entry.name().to_string();
        infos.push(EntryInfo {
            index,
            normalized: normalize_entry_path(&raw_name),
            raw_name,
            size: entry.size(),
            is_dir: entry.is_dir(),
            encrypted: entry.encrypted(),
        });
    }
    Ok(infos)
}

/// Copy a decoded entry out, telling codec failures apart from disk failures
fn copy_entry<R: Read, W: Write>(
    entry: &mut R,
    sink: &mut W,
    encrypted: bool,
) -> Result<u64, ArchiveError> {
    let mut buffer = vec![0u8; STAGING_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match entry.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) if encrypted => return Err(ArchiveError::InvalidPassword),
            Err(e) => return Err(ArchiveError::Corrupt(e.to_string())),
        };
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}
