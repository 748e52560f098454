//! Outbound queue - unbounded FIFO of encoded datagrams
//!
//! Many producers, exactly one consumer. The mutex only guards the container;
//! an unbounded channel of unit tokens acts as the counting wake primitive so
//! the consumer blocks instead of polling. Each token matches one queued
//! datagram, plus the single terminal token posted by
//! [`OutboundQueue::flush_and_signal_shutdown`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec;
use crate::error::QueueError;

/// One queued, already encoded message
#[derive(Debug, Clone)]
pub struct Datagram {
    seq: u64,
    payload: Bytes,
    enqueued_at: Instant,
}

impl Datagram {
    /// Position in enqueue order (starts at 0)
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Encoded bytes, sent as-is
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// When the datagram entered the queue
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}

/// Result of a consumer wake
#[derive(Debug)]
pub enum Dequeued {
    /// Next datagram in FIFO order
    Datagram(Datagram),
    /// Shutdown was requested; the consumer must stop
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Datagram>,
    next_seq: u64,
    closed: bool,
}

/// Producer side, shared by every producer
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    wake_tx: mpsc::UnboundedSender<()>,
}

/// Consumer side; not `Clone`, so there is exactly one
#[derive(Debug)]
pub struct QueueConsumer {
    queue: Arc<OutboundQueue>,
    wake_rx: mpsc::UnboundedReceiver<()>,
}

/// Create a queue and its single consumer
pub fn outbound_queue() -> (Arc<OutboundQueue>, QueueConsumer) {
    let (wake_tx, wake_rx) = mpsc::unbounded_channel();
    let queue = Arc::new(OutboundQueue {
        state: Mutex::new(QueueState::default()),
        wake_tx,
    });
    let consumer = QueueConsumer {
        queue: Arc::clone(&queue),
        wake_rx,
    };
    (queue, consumer)
}

impl OutboundQueue {
    /// Encode and append a float message, then wake the consumer.
    ///
    /// Encoding happens before the lock is taken. Returns the sequence number.
    pub fn enqueue(&self, address: &str, value: f32) -> Result<u64, QueueError> {
        let payload = codec::encode_float_message(address, value)?;
        self.push(payload)
    }

    /// Append an already encoded datagram, then wake the consumer
    pub fn push(&self, payload: Bytes) -> Result<u64, QueueError> {
        let seq = {
            let mut state = self.lock()?;
            if state.closed {
                return Err(QueueError::Closed);
            }
            if self.wake_tx.is_closed() {
                return Err(QueueError::ConsumerGone);
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.items.push_back(Datagram {
                seq,
                payload,
                enqueued_at: Instant::now(),
            });
            seq
        };

        // A consumer that vanished after the check leaves the datagram for the
        // termination flush.
        let _ = self.wake_tx.send(());
        Ok(seq)
    }

    /// Discard every pending datagram, close the queue and post one terminal wake.
    ///
    /// Returns the number of datagrams discarded. Only the first call succeeds.
    pub fn flush_and_signal_shutdown(&self) -> Result<usize, QueueError> {
        let dropped = {
            let mut state = self.lock()?;
            if state.closed {
                return Err(QueueError::AlreadyClosed);
            }
            state.closed = true;

            let dropped = state.items.len();
            state.items.clear();
            dropped
        };

        // The consumer may already have exited on its error path.
        let _ = self.wake_tx.send(());
        Ok(dropped)
    }

    /// Number of datagrams waiting for the consumer
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the termination flush has run
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state.lock().map_err(|_| QueueError::Poisoned)
    }
}

impl QueueConsumer {
    /// Block until a datagram is available or shutdown is signalled.
    ///
    /// `self.queue` owns the only wake sender, so the channel cannot close
    /// while we wait. Every token follows a push or the terminal flush, and
    /// pops never outrun tokens, so a wake that finds the queue empty means
    /// it was flushed.
    pub fn dequeue_one(&mut self) -> Result<Dequeued, QueueError> {
        let _ = self.wake_rx.blocking_recv();

        let mut state = self.queue.lock()?;
        match state.items.pop_front() {
            Some(datagram) => Ok(Dequeued::Datagram(datagram)),
            None => {
                debug_assert!(state.closed, "woken on an open, empty queue");
                Ok(Dequeued::Closed)
            }
        }
    }

    /// Producer side of this consumer's queue
    pub fn queue(&self) -> &Arc<OutboundQueue> {
        &self.queue
    }
}
