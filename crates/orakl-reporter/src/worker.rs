//! Worker pool consuming one queue.
//!
//! Each worker claims a job, runs the [`JobProcessor`], and records the
//! outcome: success completes the job, a permanent error fails it with the
//! error as reason. Other errors leave the job claimed; the pool's requeue
//! task redelivers it once the claim expires, until the job has been
//! claimed `max_attempts` times.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orakl_db::queries::jobs::JobRow;
use orakl_types::Job;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::channel::TxReceipt;
use crate::queue::SqliteQueue;
use crate::Result;

/// Turns one job into a confirmed transaction.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job_id: &str, job: &Job) -> Result<TxReceipt>;
}

/// What happened to a claimed job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(TxReceipt),
    Failed(String),
    /// Left claimed for redelivery.
    Retry(String),
}

/// Pool settings.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    pub concurrency: usize,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Claims older than this are redelivered.
    pub claim_timeout: Duration,
    /// Claims after which a retryable error fails the job. 0 disables the limit.
    pub max_attempts: u32,
}

pub struct WorkerPool {
    queue: SqliteQueue,
    processor: Arc<dyn JobProcessor>,
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(queue: SqliteQueue, processor: Arc<dyn JobProcessor>, config: PoolConfig) -> Self {
        Self {
            queue,
            processor,
            config,
        }
    }

    /// Spawn the workers and the requeue task. All of them stop when
    /// `shutdown` fires.
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.concurrency + 1);

        for worker in 0..self.config.concurrency.max(1) {
            let queue = self.queue.clone();
            let processor = self.processor.clone();
            let poll_interval = self.config.poll_interval;
            let max_attempts = self.config.max_attempts;
            let mut shutdown_rx = shutdown.subscribe();

            handles.push(tokio::spawn(async move {
                tracing::debug!(queue = %queue.name(), worker, "worker started");
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        drained = drain(&queue, processor.as_ref(), max_attempts) => {
                            if let Err(e) = drained {
                                tracing::error!(queue = %queue.name(), worker, error = %e, "queue error");
                            }
                        }
                    }
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                tracing::debug!(queue = %queue.name(), worker, "worker stopped");
            }));
        }

        let queue = self.queue.clone();
        let claim_timeout = self.config.claim_timeout.max(Duration::from_secs(1));
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(claim_timeout);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = queue.requeue_stale(claim_timeout.as_secs()).await {
                            tracing::error!(queue = %queue.name(), error = %e, "requeue failed");
                        }
                    }
                }
            }
        }));

        handles
    }
}

/// Process jobs until the queue is empty.
async fn drain(queue: &SqliteQueue, processor: &dyn JobProcessor, max_attempts: u32) -> Result<()> {
    while process_next(queue, processor, max_attempts).await?.is_some() {}
    Ok(())
}

/// Claim and process one job. `None` if the queue is empty.
pub async fn process_next(
    queue: &SqliteQueue,
    processor: &dyn JobProcessor,
    max_attempts: u32,
) -> Result<Option<JobOutcome>> {
    let Some(row) = queue.claim().await? else {
        return Ok(None);
    };
    Ok(Some(handle(queue, processor, row, max_attempts).await?))
}

async fn handle(
    queue: &SqliteQueue,
    processor: &dyn JobProcessor,
    row: JobRow,
    max_attempts: u32,
) -> Result<JobOutcome> {
    match processor.process(&row.job_id, &row.job).await {
        Ok(receipt) => {
            queue.complete(row.id).await?;
            Ok(JobOutcome::Completed(receipt))
        }
        Err(e) if e.is_permanent() => {
            let reason = e.to_string();
            tracing::error!(queue = %queue.name(), job_id = %row.job_id, error = %reason, "job failed");
            queue.fail(row.id, &reason).await?;
            Ok(JobOutcome::Failed(reason))
        }
        Err(e) if max_attempts > 0 && row.attempts >= max_attempts => {
            let reason = format!("gave up after {} attempts: {e}", row.attempts);
            tracing::error!(queue = %queue.name(), job_id = %row.job_id, error = %reason, "job failed");
            queue.fail(row.id, &reason).await?;
            Ok(JobOutcome::Failed(reason))
        }
        Err(e) => {
            tracing::warn!(
                queue = %queue.name(),
                job_id = %row.job_id,
                attempts = row.attempts,
                error = %e,
                "job left for redelivery"
            );
            Ok(JobOutcome::Retry(e.to_string()))
        }
    }
}
