//! Bounded, order-preserving batch execution

use std::path::Path;

use futures::stream::{self, StreamExt};

use crate::progress::ProgressSink;
use crate::session::StagedFile;

use super::image_ops::transform_one;
use super::types::{TransformError, TransformOptions, TransformResult, TransformStatus};

/// Applies resize and metadata stripping to a batch of staged files
///
/// At most `workers` files are decoded at once. Results come back in input
/// order, one per input, each tagged with its source file's identity.
#[derive(Debug, Clone)]
pub struct BatchTransformer {
    workers: usize,
}

impl Default for BatchTransformer {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }
}

impl BatchTransformer {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Transform `files` into `out_dir`
    ///
    /// `progress` advances by each source file's size as its result lands.
    pub async fn transform(
        &self,
        files: &[StagedFile],
        options: TransformOptions,
        out_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<TransformResult>, TransformError> {
        if files.is_empty() {
            return Err(TransformError::EmptyBatch);
        }

        tokio::fs::create_dir_all(out_dir).await?;
        progress.start(files.iter().map(|f| f.size).sum());

        tracing::debug!(
            files = files.len(),
            workers = self.workers,
            resize = ?options.resize,
            strip_metadata = options.strip_metadata,
            "Starting batch transform"
        );

        let mut pending = stream::iter(files.iter().cloned())
            .map(|file| {
                let out_dir = out_dir.to_path_buf();
                async move {
                    let name = file.name.clone();
                    let size = file.size;
                    let joined = tokio::task::spawn_blocking(move || {
                        transform_one(&file, &options, &out_dir)
                    })
                    .await;
                    (name, size, joined)
                }
            })
            .buffered(self.workers);

        let mut results = Vec::with_capacity(files.len());
        while let Some((name, size, joined)) = pending.next().await {
            let result = match joined {
                Ok(outcome) => outcome?,
                Err(e) => {
                    tracing::error!(file = %name, error = %e, "Transform worker panicked");
                    TransformResult {
                        source: name.clone(),
                        output: None,
                        output_name: None,
                        status: TransformStatus::Failed(format!("worker failed: {}", e)),
                    }
                }
            };

            progress.advance(size, &name);
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_failed()).count();
        tracing::info!(
            files = results.len(),
            failed = failed,
            "Batch transform finished"
        );

        Ok(results)
    }
}
