//! Session statistics.

use std::net::SocketAddr;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::StatsSummary;

/// Statistics from a controller session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Wall time from connect to disconnect
    pub duration: Duration,

    /// Remote listener, `None` when dispatching was disabled
    pub peer: Option<SocketAddr>,

    /// Value changes read from input
    pub values_read: u64,

    /// Value changes refused before reaching the queue
    pub values_rejected: u64,

    /// Dispatcher counters at shutdown
    pub metrics: MetricsSnapshot,

    /// Time datagrams spent queued
    pub latency_ms: StatsSummary,
}

impl SessionStats {
    /// Datagrams sent per second
    pub fn send_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===\n");

        match self.peer {
            Some(peer) => println!("Target: {peer}"),
            None => println!("Target: (dispatch disabled)"),
        }
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Values read: {}", self.values_read);
        println!("   └─ Values rejected: {}", self.values_rejected);

        println!("\nDispatch");
        println!("   ├─ Enqueued: {}", self.metrics.enqueued);
        println!("   ├─ Sent: {} ({} bytes)", self.metrics.sent, self.metrics.bytes_sent);
        println!("   ├─ Dropped at shutdown: {}", self.metrics.dropped);
        println!("   ├─ Encode failures: {}", self.metrics.encode_failures);
        println!("   ├─ Send rate: {:.2}/s", self.send_rate());
        println!("   └─ Queue latency (ms): {}", self.latency_ms);

        println!();
    }
}
