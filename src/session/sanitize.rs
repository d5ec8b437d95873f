//! Path sanitizing for upload names, in-archive paths and extraction targets.

use std::path::{Path, PathBuf};

/// Name used when an upload name sanitizes to nothing
const FALLBACK_NAME: &str = "upload";

/// Reduce an upload's declared file name to a single safe path component.
///
/// Browsers may send full client paths (`C:\Users\me\a.png`) or relative
/// folder paths (`photos/a.png`); only the final component survives.
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != ':')
        .collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Normalize a ZIP-style relative path (`a/b/c.txt`).
///
/// Backslashes become `/`, empty and `.` segments are dropped, and a trailing
/// slash is removed. Returns `None` for absolute paths, drive prefixes, any
/// `..` segment, or a path that normalizes to nothing.
pub fn normalize_entry_path(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return None;
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(':') || s.chars().any(char::is_control) => return None,
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Resolve a relative entry path under `base`, or `None` if it would escape.
pub fn resolve_within(base: &Path, relative: &str) -> Option<PathBuf> {
    let normalized = normalize_entry_path(relative)?;
    let mut resolved = base.to_path_buf();
    for segment in normalized.split('/') {
        resolved.push(segment);
    }
    Some(resolved)
}
