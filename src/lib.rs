//! Shrnk Server Library
//!
//! Session-scoped file pipeline: uploads are staged per session, optionally
//! resized or stripped of metadata, packed into (optionally AES-256
//! encrypted) ZIP archives or extracted from them, with live progress pushed
//! over server-sent events and abandoned sessions swept from disk.
//!
//! # Modules
//!
//! - `session`: Per-session staging directories and path sanitizing
//! - `transform`: Bounded, ordered batch image transforms
//! - `archive`: ZIP build, extract, peek and selective extraction
//! - `progress`: Per-session progress channel
//! - `janitor`: Retention sweeper for stale sessions
//! - `pipeline`: Request-level orchestration of the above
//! - `routes`: HTTP surface

pub mod archive;
pub mod config;
pub mod error;
pub mod janitor;
pub mod pipeline;
pub mod progress;
pub mod routes;
pub mod session;
pub mod state;
pub mod transform;
