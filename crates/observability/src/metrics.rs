//! Dispatch metrics recording
//!
//! Thin wrappers over the `metrics` facade so every crate uses the same
//! metric names, plus an online statistics helper for per-session summaries.

use metrics::{counter, gauge, histogram};

/// Record a message accepted into the outbound queue
pub fn record_message_enqueued() {
    counter!("osc_controller_messages_enqueued_total").increment(1);
}

/// Record a message rejected by the encoder
pub fn record_encode_failure() {
    counter!("osc_controller_encode_failures_total").increment(1);
}

/// Record one datagram handed to the transport
pub fn record_datagram_sent(bytes: usize) {
    counter!("osc_controller_datagrams_sent_total").increment(1);
    counter!("osc_controller_bytes_sent_total").increment(bytes as u64);
}

/// Record messages discarded by the termination flush
pub fn record_messages_dropped(count: usize) {
    if count > 0 {
        counter!("osc_controller_messages_dropped_total").increment(count as u64);
    }
}

/// Record a fatal dispatch failure
pub fn record_dispatch_failure(reason: &str) {
    counter!(
        "osc_controller_dispatch_failures_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record current outbound queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("osc_controller_queue_depth").set(depth as f64);
}

/// Record time a message spent queued before transmission
pub fn record_queue_latency_ms(latency_ms: f64) {
    histogram!("osc_controller_queue_latency_ms").record(latency_ms);
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
