//! In-process priority queue
//!
//! Deliveries come out highest priority first and in publish order within a
//! priority. Rejected deliveries can be requeued at their original priority.

use crate::queue::{
    validate_priority, Acknowledger, Consumer, Delivery, Publisher, QueueError, QueueResult,
};
use crate::types::{AnnotatedResource, Source};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// A resource waiting in the queue
#[derive(Debug, Clone)]
struct QueuedResource {
    resource: AnnotatedResource,
    priority: u8,
    /// Publish order, for FIFO within one priority
    seq: u64,
}

impl Ord for QueuedResource {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then lower sequence number first
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedResource {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedResource {}

/// Counters describing a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub acked: u64,
    pub rejected: u64,
    pub requeued: u64,
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<QueuedResource>,
    next_seq: u64,
    in_flight: usize,
    acked: u64,
    rejected: u64,
    requeued: u64,
    closed: bool,
}

impl State {
    fn push(&mut self, resource: AnnotatedResource, priority: u8) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedResource {
            resource,
            priority,
            seq,
        });
    }
}

struct Inner {
    name: String,
    state: Mutex<State>,
    notify: Notify,
}

impl Inner {
    fn lock(&self) -> QueueResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| QueueError::Backend(format!("queue {} lock poisoned", self.name)))
    }
}

/// Priority queue living in the current process
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Stops accepting publishes and wakes all waiting consumers
    pub fn close(&self) -> QueueResult<()> {
        self.inner.lock()?.closed = true;
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Returns true when nothing is waiting and nothing is being processed
    pub fn is_idle(&self) -> QueueResult<bool> {
        let state = self.inner.lock()?;
        Ok(state.heap.is_empty() && state.in_flight == 0)
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        let state = self.inner.lock()?;
        Ok(QueueStats {
            pending: state.heap.len(),
            in_flight: state.in_flight,
            acked: state.acked,
            rejected: state.rejected,
            requeued: state.requeued,
        })
    }

    /// Returns a non-blocking delivery if one is waiting
    pub fn try_consume(&self) -> QueueResult<Option<Delivery>> {
        let mut state = self.inner.lock()?;
        Ok(self.take(&mut state))
    }

    fn take(&self, state: &mut State) -> Option<Delivery> {
        let queued = state.heap.pop()?;
        state.in_flight += 1;

        let acker = MemoryAcker {
            inner: self.inner.clone(),
            resource: queued.resource.clone(),
            priority: queued.priority,
        };

        Some(Delivery::new(
            queued.resource,
            queued.priority,
            Box::new(acker),
        ))
    }
}

#[async_trait]
impl Publisher for MemoryQueue {
    async fn publish(&self, resource: &AnnotatedResource, priority: u8) -> QueueResult<()> {
        validate_priority(priority)?;

        {
            let mut state = self.inner.lock()?;
            if state.closed {
                return Err(QueueError::Closed(self.inner.name.clone()));
            }
            state.push(resource.clone(), priority);
        }

        tracing::trace!(queue = %self.inner.name, cid = resource.id(), priority, "Published");
        self.inner.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl Consumer for MemoryQueue {
    async fn consume(&self) -> QueueResult<Option<Delivery>> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting the state so a publish in between is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock()?;
                if let Some(delivery) = self.take(&mut state) {
                    return Ok(Some(delivery));
                }
                if state.closed {
                    return Ok(None);
                }
            }

            notified.await;
        }
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    resource: AnnotatedResource,
    priority: u8,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> QueueResult<()> {
        let mut state = self.inner.lock()?;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.acked += 1;
        Ok(())
    }

    async fn reject(self: Box<Self>, requeue: bool) -> QueueResult<()> {
        let requeued = {
            let mut state = self.inner.lock()?;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.rejected += 1;

            if requeue && !state.closed {
                let resource = self.resource.clone().with_source(Source::Retry);
                state.push(resource, self.priority);
                state.requeued += 1;
                true
            } else {
                false
            }
        };

        if requeued {
            self.inner.notify.notify_one();
        }
        Ok(())
    }
}
