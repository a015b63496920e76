//! Frontier: the FIFO work queue with completion tracking
//!
//! Every item put into the frontier counts as in flight until a matching
//! `task_done` acknowledges it. `join` waits for the in-flight count to reach
//! zero, and because every `put` clears the finished flag, a `join` cannot
//! return while a task that may still enqueue work is outstanding.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;

/// Errors raised by frontier operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrontierError {
    #[error("frontier is full")]
    Full,

    #[error("frontier is empty")]
    Empty,

    #[error("frontier is closed")]
    Closed,

    #[error("task_done() called more times than there were items")]
    UnbalancedCompletion,
}

impl FrontierError {
    /// Returns true for the conditions a caller may wait out (full or empty)
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Full | Self::Empty)
    }
}

/// Maximum number of pending items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Bounded(NonZeroUsize),
    Unbounded,
}

impl Capacity {
    fn admits(&self, len: usize) -> bool {
        match self {
            Self::Bounded(max) => len < max.get(),
            Self::Unbounded => true,
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    in_flight: usize,
    finished: bool,
    closed: bool,
}

/// A FIFO queue whose completion can be awaited
///
/// The frontier is meant to be shared behind an `Arc`; all operations take
/// `&self`.
#[derive(Debug)]
pub struct Frontier<T = String> {
    inner: Mutex<Inner<T>>,
    changed: Notify,
    capacity: Capacity,
}

impl<T> Frontier<T> {
    /// Creates an empty frontier
    pub fn new(capacity: Capacity) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                in_flight: 0,
                finished: true,
                closed: false,
            }),
            changed: Notify::new(),
            capacity,
        }
    }

    /// Creates a frontier already holding `items`
    ///
    /// All seed items are counted in flight before the frontier is visible to
    /// anyone, so no `join` can observe a partially seeded queue.
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - The seeded frontier
    /// * `Err(FrontierError::Full)` - More items than the capacity allows
    pub fn with_items<I>(capacity: Capacity, items: I) -> Result<Self, FrontierError>
    where
        I: IntoIterator<Item = T>,
    {
        let items: VecDeque<T> = items.into_iter().collect();
        if let Capacity::Bounded(max) = capacity {
            if items.len() > max.get() {
                return Err(FrontierError::Full);
            }
        }

        let in_flight = items.len();
        Ok(Self {
            inner: Mutex::new(Inner {
                items,
                in_flight,
                finished: in_flight == 0,
                closed: false,
            }),
            changed: Notify::new(),
            capacity,
        })
    }

    /// Appends an item, waiting for room if the frontier is bounded and full
    pub async fn put(&self, mut item: T) -> Result<(), FrontierError> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_put(item) {
                Ok(()) => return Ok(()),
                Err((FrontierError::Full, rejected)) => item = rejected,
                Err((e, _)) => return Err(e),
            }

            notified.await;
        }
    }

    /// Appends an item without waiting
    ///
    /// Fails with [`FrontierError::Full`] when no room is left.
    pub fn put_nowait(&self, item: T) -> Result<(), FrontierError> {
        self.try_put(item).map_err(|(e, _)| e)
    }

    /// Removes the oldest item, waiting until one is available
    pub async fn get(&self) -> Result<T, FrontierError> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.get_nowait() {
                Ok(item) => return Ok(item),
                Err(FrontierError::Empty) => {}
                Err(e) => return Err(e),
            }

            notified.await;
        }
    }

    /// Removes the oldest item without waiting
    ///
    /// The in-flight count is left unchanged; the caller owes a `task_done`.
    pub fn get_nowait(&self) -> Result<T, FrontierError> {
        let item = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(FrontierError::Closed);
            }
            inner.items.pop_front().ok_or(FrontierError::Empty)?
        };
        self.changed.notify_waiters();
        Ok(item)
    }

    /// Acknowledges that one item has been fully processed
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The count was decremented
    /// * `Err(FrontierError::UnbalancedCompletion)` - Nothing was in flight
    pub fn task_done(&self) -> Result<(), FrontierError> {
        {
            let mut inner = self.lock();
            if inner.in_flight == 0 {
                return Err(FrontierError::UnbalancedCompletion);
            }
            inner.in_flight -= 1;
            if inner.in_flight == 0 {
                inner.finished = true;
            }
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Waits until every item put so far has been acknowledged
    ///
    /// Also returns once the frontier is closed.
    pub async fn join(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let inner = self.lock();
                if inner.finished || inner.closed {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Closes the frontier; later `put` and `get` calls fail with `Closed`
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of items put but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn try_put(&self, item: T) -> Result<(), (FrontierError, T)> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err((FrontierError::Closed, item));
            }
            if !self.capacity.admits(inner.items.len()) {
                return Err((FrontierError::Full, item));
            }
            inner.items.push_back(item);
            inner.in_flight += 1;
            inner.finished = false;
        }
        self.changed.notify_waiters();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panic while holding the lock cannot leave Inner half-updated
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
