//! Session Store
//!
//! Maps an opaque session identifier to a set of on-disk staging directories:
//! - `input/` raw uploaded bytes, immutable after staging
//! - `processed/` transformer output
//! - `output/` the final artifact or extracted tree
//! - `selected/` loose files from a selective extraction
//!
//! The filesystem is the only persistence. Sessions are removed by the
//! retention sweeper once they age out.

pub mod sanitize;
pub mod store;
pub mod types;

pub use sanitize::{normalize_entry_path, resolve_within, sanitize_file_name};
pub use store::{SessionStore, StagingWriter, STAGING_BUFFER_SIZE};
pub use types::*;
