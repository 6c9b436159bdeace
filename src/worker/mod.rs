//! Worker pools draining the crawl queues
//!
//! Every queue gets its own pool of identical workers. A worker takes one
//! delivery at a time, crawls it and settles the delivery with the queue:
//! acknowledged on success, rejected on failure. A fatal error cancels every
//! pool sharing the same token.

use crate::config::WorkersConfig;
use crate::crawler::Crawler;
use crate::queue::{Consumer, Delivery, MemoryQueue, QueueResult};
use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How often `wait_until_idle` samples the queues
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A bounded set of workers consuming one queue
pub struct WorkerPool {
    name: String,
    consumer: Arc<dyn Consumer>,
    workers: usize,
    requeue_on_error: bool,
}

/// What happened to a single delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Rejected { requeued: bool },
    Cancelled,
}

impl WorkerPool {
    pub fn new(
        name: impl Into<String>,
        consumer: Arc<dyn Consumer>,
        workers: usize,
        requeue_on_error: bool,
    ) -> Self {
        Self {
            name: name.into(),
            consumer,
            workers,
            requeue_on_error,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the pool until its queue closes or `token` is cancelled
    ///
    /// Returns the first fatal error any worker hit; the token is cancelled
    /// before it is returned so sibling pools stop too.
    pub async fn run(self, crawler: Arc<Crawler>, token: CancellationToken) -> Result<()> {
        tracing::info!(queue = %self.name, workers = self.workers, "Starting worker pool");

        let pool = Arc::new(self);
        let mut workers = JoinSet::new();
        for id in 0..pool.workers {
            let pool = pool.clone();
            let crawler = crawler.clone();
            let token = token.clone();
            workers.spawn(async move { pool.work(id, &crawler, &token).await });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(CrawlError::Fatal(format!("worker panicked: {}", e)))
            });

            if let Err(e) = result {
                token.cancel();
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(queue = %pool.name, "Worker pool stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn work(&self, id: usize, crawler: &Crawler, token: &CancellationToken) -> Result<()> {
        loop {
            let delivery = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                delivery = self.consumer.consume() => delivery?,
            };

            let Some(delivery) = delivery else {
                tracing::debug!(queue = %self.name, worker = id, "Queue closed");
                return Ok(());
            };

            if self.process(crawler, delivery, token).await? == Outcome::Cancelled {
                return Ok(());
            }
        }
    }

    /// Crawls one delivery and settles it with the queue
    pub async fn process(
        &self,
        crawler: &Crawler,
        mut delivery: Delivery,
        token: &CancellationToken,
    ) -> Result<Outcome> {
        let result = tokio::select! {
            _ = token.cancelled() => Err(CrawlError::Cancelled),
            result = crawler.crawl(&mut delivery.resource) => result,
        };

        match result {
            Ok(()) => {
                delivery.ack().await?;
                Ok(Outcome::Acked)
            }
            Err(CrawlError::Cancelled) => {
                tracing::debug!(queue = %self.name, cid = delivery.resource.id(), "Crawl cancelled, requeueing");
                delivery.reject(true).await?;
                Ok(Outcome::Cancelled)
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(queue = %self.name, cid = delivery.resource.id(), "{}", e);
                delivery.reject(false).await?;
                token.cancel();
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    queue = %self.name,
                    cid = delivery.resource.id(),
                    requeue = self.requeue_on_error,
                    "Crawl failed: {}",
                    e
                );
                delivery.reject(self.requeue_on_error).await?;
                Ok(Outcome::Rejected {
                    requeued: self.requeue_on_error,
                })
            }
        }
    }
}

/// The three pools draining the files, directories and hashes queues
pub fn pools(
    config: &WorkersConfig,
    files: &MemoryQueue,
    directories: &MemoryQueue,
    hashes: &MemoryQueue,
) -> Vec<WorkerPool> {
    vec![
        WorkerPool::new(
            files.name(),
            Arc::new(files.clone()),
            config.file_workers,
            config.requeue_on_error,
        ),
        WorkerPool::new(
            directories.name(),
            Arc::new(directories.clone()),
            config.directory_workers,
            config.requeue_on_error,
        ),
        WorkerPool::new(
            hashes.name(),
            Arc::new(hashes.clone()),
            config.hash_workers,
            config.requeue_on_error,
        ),
    ]
}

/// Runs all pools to completion; the first fatal error wins
pub async fn run_pools(
    pools: Vec<WorkerPool>,
    crawler: Arc<Crawler>,
    token: CancellationToken,
) -> Result<()> {
    let runs = pools
        .into_iter()
        .map(|pool| pool.run(crawler.clone(), token.clone()));

    futures::future::try_join_all(runs).await?;
    Ok(())
}

/// Total of settled deliveries, used to tell a quiet moment from real idleness
fn settled(queues: &[MemoryQueue]) -> QueueResult<u64> {
    let mut total = 0;
    for queue in queues {
        let stats = queue.stats()?;
        total += stats.acked + stats.rejected;
    }
    Ok(total)
}

fn all_idle(queues: &[MemoryQueue]) -> QueueResult<bool> {
    for queue in queues {
        if !queue.is_idle()? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Waits until no queue holds or processes anything, then closes them all
///
/// Idleness must hold for two consecutive samples with no delivery settled
/// in between; a worker can publish to one queue after it was sampled and
/// settle its own delivery before its queue is.
pub async fn wait_until_idle(
    queues: &[MemoryQueue],
    poll_interval: Duration,
    token: &CancellationToken,
) -> Result<()> {
    let mut previous: Option<u64> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let current = if all_idle(queues)? {
            Some(settled(queues)?)
        } else {
            None
        };

        if current.is_some() && current == previous {
            break;
        }
        previous = current;
    }

    tracing::info!("All queues idle, shutting down");
    for queue in queues {
        queue.close()?;
    }
    Ok(())
}
