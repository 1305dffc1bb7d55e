//! Worker pool distributing conversion tasks across parallel workers.
//!
//! Workers pull tasks from a shared bounded channel and run the CPU-bound
//! conversion on the blocking thread pool, so codec work for different files
//! proceeds truly in parallel. Each task's success or failure is isolated:
//! a failing (even panicking) conversion becomes a `Failed` outcome and the
//! remaining tasks keep flowing.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::debug;

use crate::codec::ImageCodec;
use crate::convert::{ConversionOutcome, ConversionTask, ConversionUnit};
use crate::error::AvifyError;

pub struct WorkerPool {
    jobs: usize,
}

impl WorkerPool {
    pub fn new(jobs: usize) -> Self {
        Self { jobs }
    }

    /// Drain the task channel with `jobs` workers, sending one outcome per
    /// task. With a single worker, tasks execute sequentially in the order
    /// they were queued. Returns once every worker has finished.
    pub async fn run(
        &self,
        tasks: mpsc::Receiver<ConversionTask>,
        outcomes: mpsc::Sender<ConversionOutcome>,
        codec: Arc<dyn ImageCodec>,
    ) {
        let tasks = Arc::new(Mutex::new(tasks));
        let mut workers = JoinSet::new();

        for worker_id in 0..self.jobs {
            let tasks = Arc::clone(&tasks);
            let outcomes = outcomes.clone();
            let codec = Arc::clone(&codec);

            workers.spawn(async move {
                loop {
                    // hold the lock only while pulling the next task
                    let task = { tasks.lock().await.recv().await };
                    let Some(task) = task else { break };

                    let source = task.source.clone();
                    let unit = ConversionUnit::new(Arc::clone(&codec));
                    let outcome = tokio::task::spawn_blocking(move || unit.run(&task))
                        .await
                        .unwrap_or_else(|e| ConversionOutcome::Failed {
                            source,
                            cause: AvifyError::Codec(format!("conversion worker panicked: {e}")),
                        });

                    if outcomes.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!("worker {} finished", worker_id);
            });
        }
        drop(outcomes);

        while workers.join_next().await.is_some() {}
    }
}
