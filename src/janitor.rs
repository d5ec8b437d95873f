//! Retention Sweeper
//!
//! Periodically deletes session directories older than the configured age,
//! whether or not their work finished. Per-session failures are collected and
//! logged, never raised.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::{BoxFuture, FutureExt};
use tokio::fs;
use tokio::task::JoinHandle;

// ============================================================================
// Outcomes
// ============================================================================

/// Result of one sweep cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Root temp directory does not exist; nothing to do
    RootMissing,
    Swept(SweepReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Session directory names deleted this cycle
    pub removed: Vec<String>,

    /// Sessions younger than the max age
    pub retained: usize,

    pub failures: Vec<SweepFailure>,
}

/// A session directory that could not be inspected or deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub path: PathBuf,
    pub error: String,
}

// ============================================================================
// Janitor
// ============================================================================

/// Deletes one expired session directory
pub type Remover = Arc<dyn Fn(PathBuf) -> BoxFuture<'static, io::Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct Janitor {
    root: PathBuf,
    max_age: Duration,
    interval: Duration,
    remover: Remover,
}

impl fmt::Debug for Janitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Janitor")
            .field("root", &self.root)
            .field("max_age", &self.max_age)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Janitor {
    pub fn new(root: impl Into<PathBuf>, max_age: Duration, interval: Duration) -> Self {
        let remover: Remover = Arc::new(|path: PathBuf| fs::remove_dir_all(path).boxed());
        Self {
            root: root.into(),
            max_age,
            interval,
            remover,
        }
    }

    /// Replace how expired session directories are deleted
    pub fn with_remover(mut self, remover: Remover) -> Self {
        self.remover = remover;
        self
    }

    /// Run one cycle against the current time
    pub async fn sweep(&self) -> SweepOutcome {
        self.sweep_at(SystemTime::now()).await
    }

    /// Run one cycle as if the clock read `now`
    pub async fn sweep_at(&self, now: SystemTime) -> SweepOutcome {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(root = ?self.root, "Temp directory missing, skipping sweep");
                return SweepOutcome::RootMissing;
            }
            Err(e) => {
                tracing::error!(root = ?self.root, error = %e, "Cannot read temp directory");
                return SweepOutcome::Swept(SweepReport {
                    failures: vec![SweepFailure {
                        path: self.root.clone(),
                        error: e.to_string(),
                    }],
                    ..SweepReport::default()
                });
            }
        };

        let mut report = SweepReport::default();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report.failures.push(SweepFailure {
                        path: self.root.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            match self.sweep_entry(&entry, now).await {
                Ok(Some(true)) => {
                    tracing::info!(session_id = %name, "Removed expired session");
                    report.removed.push(name);
                }
                Ok(Some(false)) => report.retained += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to sweep session");
                    report.failures.push(SweepFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            removed = report.removed.len(),
            retained = report.retained,
            failures = report.failures.len(),
            "Sweep cycle complete"
        );

        SweepOutcome::Swept(report)
    }

    /// `Some(true)` removed, `Some(false)` kept, `None` skipped
    async fn sweep_entry(&self, entry: &fs::DirEntry, now: SystemTime) -> io::Result<Option<bool>> {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if !metadata.is_dir() {
            return Ok(None);
        }

        let created = metadata.created().or_else(|_| metadata.modified())?;
        let age = now.duration_since(created).unwrap_or(Duration::ZERO);
        if age <= self.max_age {
            return Ok(Some(false));
        }

        match (self.remover)(entry.path()).await {
            Ok(()) => Ok(Some(true)),
            // Deleted concurrently
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sweep on a fixed interval for the life of the process
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                root = ?self.root,
                max_age_secs = self.max_age.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Retention sweeper started"
            );

            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                self.sweep().await;
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
