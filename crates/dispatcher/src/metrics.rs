//! Per-dispatcher metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use observability::StatsSummary;

/// Counters shared by the producers, the dispatch thread and the foreground
///
/// Every update is also mirrored to the global `metrics` recorder.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Datagrams waiting in the queue
    queue_len: AtomicUsize,
    /// Messages accepted by enqueue
    enqueued: AtomicU64,
    /// Datagrams handed to the transport
    sent: AtomicU64,
    bytes_sent: AtomicU64,
    /// Datagrams discarded by the termination flush
    dropped: AtomicU64,
    encode_failures: AtomicU64,
    /// Fatal dispatch thread exits (0 or 1)
    failures: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        observability::record_queue_depth(len);
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        observability::record_message_enqueued();
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Count one transmitted datagram of `bytes` length
    pub fn record_sent(&self, bytes: usize) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        observability::record_datagram_sent(bytes);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn add_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
        observability::record_messages_dropped(count);
    }

    pub fn encode_failures(&self) -> u64 {
        self.encode_failures.load(Ordering::Relaxed)
    }

    pub fn inc_encode_failures(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
        observability::record_encode_failure();
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self, reason: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        observability::record_dispatch_failure(reason);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            enqueued: self.enqueued(),
            sent: self.sent(),
            bytes_sent: self.bytes_sent(),
            dropped: self.dropped(),
            encode_failures: self.encode_failures(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub enqueued: u64,
    pub sent: u64,
    pub bytes_sent: u64,
    pub dropped: u64,
    pub encode_failures: u64,
    pub failures: u64,
}

/// What a cleanly exiting dispatch thread reports through its join handle
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    /// Time each datagram spent queued before transmission
    pub latency_ms: StatsSummary,
}
