//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::progress::{ProgressHub, DEFAULT_IDLE_TIMEOUT};
use crate::session::SessionStore;
use crate::transform::BatchTransformer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: Pipeline,
}

impl AppState {
    /// Wire the pipeline components from configuration
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(config.storage.temp_dir.clone());
        let transformer = BatchTransformer::new(config.processing.transform_workers);
        let progress = ProgressHub::new(config.processing.progress_buffer, DEFAULT_IDLE_TIMEOUT);

        Self {
            inner: Arc::new(AppStateInner {
                pipeline: Pipeline::new(sessions, transformer, progress),
                config,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the processing pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Get the session store
    pub fn sessions(&self) -> &SessionStore {
        self.inner.pipeline.sessions()
    }

    /// Get the progress hub
    pub fn progress(&self) -> &ProgressHub {
        self.inner.pipeline.progress()
    }
}
