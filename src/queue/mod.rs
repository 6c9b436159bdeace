//! Work queues distributing resources across worker pools
//!
//! A queue accepts `(AnnotatedResource, priority)` pairs and hands them out
//! again as deliveries, which must be acknowledged or rejected.

mod memory;

pub use memory::{MemoryQueue, QueueStats};

use crate::types::AnnotatedResource;
use async_trait::async_trait;
use thiserror::Error;

/// Lowest valid priority
pub const MIN_PRIORITY: u8 = 1;

/// Highest valid priority
pub const MAX_PRIORITY: u8 = 9;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue {0} is closed")]
    Closed(String),

    #[error("Priority {0} outside of {MIN_PRIORITY}..={MAX_PRIORITY}")]
    InvalidPriority(u8),

    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Accepts resources for later processing
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a resource. Priority is a scheduling hint, higher first.
    async fn publish(&self, resource: &AnnotatedResource, priority: u8) -> QueueResult<()>;
}

/// Hands out published resources
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Waits for the next delivery; `None` once the queue has been closed
    async fn consume(&self) -> QueueResult<Option<Delivery>>;
}

/// Settles a single delivery with its queue
#[async_trait]
pub trait Acknowledger: Send {
    async fn ack(self: Box<Self>) -> QueueResult<()>;
    async fn reject(self: Box<Self>, requeue: bool) -> QueueResult<()>;
}

/// One resource handed out by a consumer
pub struct Delivery {
    pub resource: AnnotatedResource,
    pub priority: u8,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(resource: AnnotatedResource, priority: u8, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            resource,
            priority,
            acker,
        }
    }

    /// Marks the delivery as successfully processed
    pub async fn ack(self) -> QueueResult<()> {
        self.acker.ack().await
    }

    /// Marks the delivery as failed; `requeue` redelivers it later,
    /// otherwise it is discarded
    pub async fn reject(self, requeue: bool) -> QueueResult<()> {
        self.acker.reject(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("resource", &self.resource)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Checks that a priority lies within the valid band
pub fn validate_priority(priority: u8) -> QueueResult<()> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(QueueError::InvalidPriority(priority))
    }
}
