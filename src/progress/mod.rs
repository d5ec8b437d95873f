//! Progress Channel
//!
//! Per-session, single-subscriber push channel carrying byte-level progress,
//! an ETA and a terminal complete/error event. Producers never block and
//! never fail because of the subscriber.

pub mod format;
pub mod hub;
pub mod reporter;
pub mod types;

pub use format::{estimate_eta, format_bytes};
pub use hub::{ProgressHub, ProgressStream, DEFAULT_BUFFER, DEFAULT_IDLE_TIMEOUT};
pub use reporter::{NoopProgress, ProgressReporter, ProgressSink};
pub use types::*;
