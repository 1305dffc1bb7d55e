//! Run orchestration: scanner → worker pool → reporter.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::codec::{CodecFactory, ImageCodec};
use crate::config::RunConfig;
use crate::convert::ConversionTask;
use crate::error::{AvifyError, Result};
use crate::pool::WorkerPool;
use crate::report::{Reporter, RunResult};
use crate::scanner::Scanner;

/// Wires the whole run together, holding the immutable configuration.
///
/// Scanning runs on a blocking task and feeds a bounded channel, so the
/// walk stays sequential while conversion is already underway and only a
/// bounded number of tasks are ever queued. Outcomes stream into the
/// reporter as workers finish them.
pub struct Pipeline {
    config: RunConfig,
}

impl Pipeline {
    /// Create a pipeline; invalid configuration is rejected here, before
    /// anything is scanned.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run a conversion over the given root with the default codec.
    pub async fn run<P: AsRef<Path>>(&self, root: P) -> Result<RunResult> {
        self.run_with_codec(root, CodecFactory::create_default())
            .await
    }

    /// Run with an explicit codec implementation; tests use this seam to
    /// substitute a stub codec.
    pub async fn run_with_codec<P: AsRef<Path>>(
        &self,
        root: P,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<RunResult> {
        let root = root.as_ref();
        info!("scanning {}", root.display());

        // a bad root is fatal before any task executes
        let sources = Scanner::new(root).scan()?;

        let capacity = self.config.jobs * 2;
        let (task_tx, task_rx) = mpsc::channel::<ConversionTask>(capacity);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(capacity);

        let quality = self.config.quality;
        let dryrun = self.config.dryrun;
        let feeder = tokio::task::spawn_blocking(move || {
            let mut queued = 0usize;
            for source in sources {
                let task = ConversionTask::new(source, quality, dryrun);
                if task_tx.blocking_send(task).is_err() {
                    break;
                }
                queued += 1;
            }
            debug!("scan finished, {} tasks queued", queued);
        });

        let pool = WorkerPool::new(self.config.jobs);
        let pool_run = pool.run(task_rx, outcome_tx, codec);

        let mut reporter = Reporter::new(self.config.verbose);
        let report_loop = async {
            while let Some(outcome) = outcome_rx.recv().await {
                reporter.record(&outcome);
            }
        };

        tokio::join!(pool_run, report_loop);
        feeder
            .await
            .map_err(|e| AvifyError::Scan(format!("scanner task failed: {e}")))?;

        let result = reporter.finish();
        info!(
            "run complete: {} converted, {} removed, {} failed",
            result.converted, result.removed, result.failed
        );
        Ok(result)
    }
}
