//! DispatchHandle - cloneable producer side of a dispatcher

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DispatchError, QueueError};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::queue::OutboundQueue;

/// Producer handle
///
/// Cheap to clone and safe to use from any thread. Enqueue never touches the
/// network; it only holds the queue mutex briefly.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    /// `None` when dispatching is disabled
    queue: Option<Arc<OutboundQueue>>,
    metrics: Arc<DispatchMetrics>,
}

impl DispatchHandle {
    pub(crate) fn new(queue: Arc<OutboundQueue>, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            queue: Some(queue),
            metrics,
        }
    }

    /// A handle with no transport behind it; every enqueue fails with
    /// [`DispatchError::Disabled`].
    pub fn disabled() -> Self {
        Self {
            queue: None,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Queue `value` for `address`. Returns the datagram's sequence number.
    pub fn enqueue(&self, address: &str, value: f32) -> Result<u64, DispatchError> {
        let queue = self.queue.as_ref().ok_or(DispatchError::Disabled)?;

        match queue.enqueue(address, value) {
            Ok(seq) => {
                self.metrics.inc_enqueued();
                self.metrics.set_queue_len(queue.len());
                debug!(seq, address, value, "Message enqueued");
                Ok(seq)
            }
            Err(QueueError::Encode(e)) => {
                self.metrics.inc_encode_failures();
                warn!(address = %address.escape_default(), error = %e, "Message not encodable");
                Err(DispatchError::Encode(e))
            }
            Err(e) => Err(DispatchError::Queue(e)),
        }
    }

    /// Datagrams waiting for the dispatch thread
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, |q| q.len())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
