//! Bounded FIFO of seed tasks shared between the worker pool and the
//! cancellation watcher.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use runsim_model::{RunLayout, Seed, SeedTask};
use tracing::debug;

use crate::error::CoreError;

/// Cloning shares the same queue.
///
/// The queue is filled once and closed before any worker starts. After that
/// an empty [`pop`](SeedQueue::pop) means end-of-queue. [`drain`](SeedQueue::drain)
/// empties it in one step, so a worker popping concurrently either gets a
/// task that was still queued or sees the end.
#[derive(Debug, Clone)]
pub struct SeedQueue {
    inner: Arc<Mutex<QueueInner>>,
}

#[derive(Debug)]
struct QueueInner {
    items: VecDeque<SeedTask>,
    capacity: usize,
    closed: bool,
}

impl SeedQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            })),
        }
    }

    /// One task per seed, in list order, capacity exactly `seeds.len()`.
    /// The returned queue is already closed.
    pub fn populate(seeds: &[Seed], layout: &RunLayout) -> Self {
        let items: VecDeque<SeedTask> = seeds.iter().map(|&s| layout.task(s)).collect();
        debug!(target: "runsim.queue", seeds = items.len(), "seed queue populated");
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                capacity: items.len(),
                items,
                closed: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, task: SeedTask) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(CoreError::QueueClosed);
        }
        if inner.items.len() >= inner.capacity {
            return Err(CoreError::QueueFull {
                capacity: inner.capacity,
            });
        }
        inner.items.push_back(task);
        Ok(())
    }

    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn pop(&self) -> Option<SeedTask> {
        self.lock().items.pop_front()
    }

    /// Remove every queued task and close the queue.
    pub fn drain(&self) -> Vec<SeedTask> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}
