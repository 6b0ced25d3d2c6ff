//! Bounded single-producer / single-consumer ring buffer
//!
//! All state lives behind one mutex; the producer and the consumer each
//! wait on their own condition variable.
//!
//! - The producer inserts and, every few inserts, checks the fill level:
//!   the throttle budget is recomputed as `(capacity - size) / 3` and the
//!   producer waits while `size >= capacity - 1`. Inserting into a full
//!   buffer is an overflow and stops the session.
//! - The consumer waits while the buffer is empty and the producer is
//!   running, at most until the liveness timeout measured from the last
//!   insert has elapsed.
//!
//! States move from `Running` to `Finished` or `Stopped`; both are final.

use crate::entity::EntitySchema;
use crate::error::StreamError;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Producer still running
    Running,
    /// Producer done; remaining items may still be drained
    Finished,
    /// Aborted, cancelled or timed out
    Stopped,
}

struct Inner<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    size: usize,
    state: StreamState,
    last_insert: Instant,
    throttle: usize,
    failure: Option<StreamError>,
    schema: Option<Arc<EntitySchema>>,
}

impl<T> Inner<T> {
    /// Error reported to whoever observes the stopped state
    fn stop_error(&self) -> StreamError {
        self.failure.clone().unwrap_or(StreamError::Cancelled)
    }
}

/// Fixed capacity FIFO between one producer and one consumer
pub struct RingBuffer<T> {
    inner: Mutex<Inner<T>>,
    producer: Condvar,
    consumer: Condvar,
    capacity: usize,
    timeout: Duration,
}

impl<T> RingBuffer<T> {
    /// Create a buffer; `capacity` must be at least 2
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        let capacity = capacity.max(2);
        Self {
            inner: Mutex::new(Inner {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                size: 0,
                state: StreamState::Running,
                last_insert: Instant::now(),
                throttle: 0,
                failure: None,
                schema: None,
            }),
            producer: Condvar::new(),
            consumer: Condvar::new(),
            capacity,
            timeout,
        }
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Liveness timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.inner.lock().size
    }

    /// Whether no item is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.inner.lock().state
    }

    /// Whether the session was stopped
    pub fn is_stopped(&self) -> bool {
        self.state() == StreamState::Stopped
    }

    /// Failure that stopped the session, if any
    pub fn failure(&self) -> Option<StreamError> {
        self.inner.lock().failure.clone()
    }

    /// Insert an item (producer side).
    ///
    /// May block until the consumer has drained the buffer below
    /// `capacity - 1`. Fails once the session is stopped.
    pub fn put(&self, item: T) -> Result<(), StreamError> {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Stopped {
            return Err(inner.stop_error());
        }
        if inner.size == self.capacity {
            let err = StreamError::BufferOverflow(self.capacity);
            self.stop_locked(&mut inner, err.clone());
            return Err(err);
        }

        let tail = inner.tail;
        inner.slots[tail] = Some(item);
        inner.tail = (tail + 1) % self.capacity;
        inner.size += 1;
        inner.last_insert = Instant::now();
        self.consumer.notify_one();

        if inner.throttle == 0 {
            inner.throttle = (self.capacity - inner.size) / 3;
            log::trace!(
                "Throttle budget {} at size {}/{}",
                inner.throttle,
                inner.size,
                self.capacity
            );
            while inner.size >= self.capacity - 1 && inner.state != StreamState::Stopped {
                self.producer.wait(&mut inner);
            }
        } else {
            inner.throttle -= 1;
        }

        if inner.state == StreamState::Stopped {
            return Err(inner.stop_error());
        }
        Ok(())
    }

    /// Record the schema of the streamed items
    pub fn announce_schema(&self, schema: Arc<EntitySchema>) {
        let mut inner = self.inner.lock();
        inner.schema = Some(schema);
        self.consumer.notify_all();
    }

    /// Producer completed; the consumer may drain what is left
    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Running {
            inner.state = StreamState::Finished;
        }
        self.consumer.notify_all();
    }

    /// Stop the session with an error, waking both sides
    pub fn fail(&self, err: StreamError) {
        let mut inner = self.inner.lock();
        self.stop_locked(&mut inner, err);
    }

    /// Stop the session as cancelled
    pub fn close(&self) {
        self.fail(StreamError::Cancelled);
    }

    fn stop_locked(&self, inner: &mut MutexGuard<'_, Inner<T>>, err: StreamError) {
        if inner.state != StreamState::Stopped {
            log::debug!("Stopping stream: {}", err);
            inner.state = StreamState::Stopped;
            inner.failure = Some(err);
        }
        self.producer.notify_all();
        self.consumer.notify_all();
    }

    /// Whether an item can be popped (consumer side).
    ///
    /// Waits while the buffer is empty and the producer is running. A
    /// cancelled session reports `false`; any other stop is an error.
    pub fn has_next(&self) -> Result<bool, StreamError> {
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                StreamState::Stopped => {
                    return match inner.stop_error() {
                        StreamError::Cancelled => Ok(false),
                        err => Err(err),
                    }
                }
                _ if inner.size > 0 => return Ok(true),
                StreamState::Finished => return Ok(false),
                StreamState::Running => {}
            }

            let deadline = inner.last_insert + self.timeout;
            if Instant::now() >= deadline {
                let err = StreamError::Timeout(self.timeout);
                self.stop_locked(&mut inner, err.clone());
                return Err(err);
            }
            self.consumer.wait_until(&mut inner, deadline);
        }
    }

    /// Remove the head item (consumer side)
    pub fn pop(&self) -> Result<T, StreamError> {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Stopped {
            return Err(inner.stop_error());
        }
        if inner.size == 0 {
            return Err(StreamError::Exhausted);
        }

        let head = inner.head;
        let item = inner.slots[head].take().ok_or(StreamError::Exhausted)?;
        inner.head = (head + 1) % self.capacity;
        inner.size -= 1;
        if inner.size < self.capacity - 1 {
            self.producer.notify_one();
        }
        Ok(item)
    }

    /// Wait for the announced schema, bounded by the liveness timeout
    pub fn schema(&self) -> Result<Arc<EntitySchema>, StreamError> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(schema) = &inner.schema {
                return Ok(Arc::clone(schema));
            }
            match inner.state {
                StreamState::Stopped => return Err(inner.stop_error()),
                StreamState::Finished => return Err(StreamError::Exhausted),
                StreamState::Running => {}
            }

            let deadline = inner.last_insert + self.timeout;
            if Instant::now() >= deadline {
                let err = StreamError::Timeout(self.timeout);
                self.stop_locked(&mut inner, err.clone());
                return Err(err);
            }
            self.consumer.wait_until(&mut inner, deadline);
        }
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the head item without removing it
    pub fn peek(&self) -> Result<Option<T>, StreamError> {
        let inner = self.inner.lock();
        if inner.state == StreamState::Stopped {
            return Err(inner.stop_error());
        }
        Ok(if inner.size == 0 {
            None
        } else {
            inner.slots[inner.head].clone()
        })
    }
}
