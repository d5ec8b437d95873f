//! Batch Transformer types

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ErrorClass;

// ============================================================================
// Resize Spec
// ============================================================================

/// How an image should be resized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSpec {
    /// Scale both dimensions by a percentage (values above 100 enlarge)
    Percent(u32),

    /// Fit inside a bounding box, preserving aspect ratio
    Fit { width: u32, height: u32 },
}

impl ResizeSpec {
    /// Parse a client-supplied resize option
    ///
    /// Accepts `""` (no resize), `"50"` (percent) or `"800x600"`.
    pub fn parse(raw: &str) -> Result<Option<Self>, TransformError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let invalid = || TransformError::InvalidResizeSpec(raw.to_string());

        if let Some((w, h)) = raw.split_once(['x', 'X']) {
            let width: u32 = w.trim().parse().map_err(|_| invalid())?;
            let height: u32 = h.trim().parse().map_err(|_| invalid())?;
            if width == 0 || height == 0 {
                return Err(invalid());
            }
            return Ok(Some(Self::Fit { width, height }));
        }

        let percent: u32 = raw.parse().map_err(|_| invalid())?;
        if percent == 0 {
            return Err(invalid());
        }
        Ok(Some(Self::Percent(percent)))
    }

    /// Suffix inserted before the extension of a resized output
    pub fn name_suffix(&self) -> String {
        match self {
            Self::Percent(p) => format!("_{}pct", p),
            Self::Fit { width, height } => format!("_{}x{}", width, height),
        }
    }
}

impl fmt::Display for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{}%", p),
            Self::Fit { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

/// What to do with each image in a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub resize: Option<ResizeSpec>,
    pub strip_metadata: bool,
}

impl TransformOptions {
    /// True when images need a decode/encode pass
    pub fn touches_images(&self) -> bool {
        self.resize.is_some() || self.strip_metadata
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome for one staged file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// Identity of the staged file this result came from
    pub source: String,

    /// Written file, absent when the item failed
    #[serde(skip)]
    pub output: Option<PathBuf>,

    /// File name under the output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    pub status: TransformStatus,
}

impl TransformResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, TransformStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum TransformStatus {
    Resized { width: u32, height: u32 },
    Stripped,
    Copied,
    Failed(String),
}

// ============================================================================
// Error Types
// ============================================================================

/// Batch-level failures
///
/// Per-image decode problems never show up here; they become
/// `TransformStatus::Failed` on the item instead.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid resize option: {0} (expected a percentage or WIDTHxHEIGHT)")]
    InvalidResizeSpec(String),

    #[error("No files to transform")]
    EmptyBatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl TransformError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidResizeSpec(_) | Self::EmptyBatch => ErrorClass::Input,
            Self::Io(_) | Self::Worker(_) => ErrorClass::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resize_spec() {
        assert_eq!(ResizeSpec::parse("").unwrap(), None);
        assert_eq!(ResizeSpec::parse("  ").unwrap(), None);
        assert_eq!(ResizeSpec::parse("50").unwrap(), Some(ResizeSpec::Percent(50)));
        assert_eq!(ResizeSpec::parse("250").unwrap(), Some(ResizeSpec::Percent(250)));
        assert_eq!(
            ResizeSpec::parse("800x600").unwrap(),
            Some(ResizeSpec::Fit { width: 800, height: 600 })
        );
        assert_eq!(
            ResizeSpec::parse("100X100").unwrap(),
            Some(ResizeSpec::Fit { width: 100, height: 100 })
        );
    }

    #[test]
    fn test_parse_resize_spec_rejects_garbage() {
        for raw in ["0", "-5", "abc", "x100", "100x", "0x10", "12.5"] {
            let err = ResizeSpec::parse(raw).unwrap_err();
            assert!(matches!(err, TransformError::InvalidResizeSpec(_)), "{raw}");
            assert_eq!(err.class(), ErrorClass::Input);
        }
    }

    #[test]
    fn test_name_suffix() {
        assert_eq!(ResizeSpec::Percent(50).name_suffix(), "_50pct");
        assert_eq!(
            ResizeSpec::Fit { width: 64, height: 32 }.name_suffix(),
            "_64x32"
        );
    }
}
