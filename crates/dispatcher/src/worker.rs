//! Dispatch thread body

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use contracts::{FatalEvent, FatalNotify};
use observability::RunningStats;
use tracing::{debug, error, info, instrument, trace};

use crate::error::DispatchError;
use crate::metrics::{DispatchMetrics, DispatchSummary};
use crate::queue::{Datagram, Dequeued, QueueConsumer};
use crate::transport::DatagramTransport;

/// Thread entry point: drain the queue, escalate a failure once, report.
///
/// A panic in the loop is caught and escalated like any other failure.
pub(crate) fn run_dispatch_thread<T, N>(
    consumer: QueueConsumer,
    transport: Arc<T>,
    write_timeout: Duration,
    metrics: Arc<DispatchMetrics>,
    mut notifier: N,
) -> Result<DispatchSummary, DispatchError>
where
    T: DatagramTransport + ?Sized,
    N: FatalNotify,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatch_loop(consumer, transport.as_ref(), write_timeout, &metrics)
    }))
    .unwrap_or_else(|payload| {
        error!(panic = panic_message(payload.as_ref()), "Dispatch loop panicked");
        Err(DispatchError::ThreadPanicked)
    });

    match &result {
        Ok(summary) => {
            info!(
                sent = summary.datagrams_sent,
                bytes = summary.bytes_sent,
                "Dispatch thread stopped"
            );
        }
        Err(e) => {
            metrics.record_failure(e.reason());
            error!(error = %e, "Dispatch thread failed");
            notifier.notify(FatalEvent::dispatch_failed(e.to_string()));
        }
    }

    result
}

#[instrument(
    name = "dispatch_thread_loop",
    skip(consumer, transport, metrics)
)]
fn dispatch_loop<T>(
    mut consumer: QueueConsumer,
    transport: &T,
    write_timeout: Duration,
    metrics: &DispatchMetrics,
) -> Result<DispatchSummary, DispatchError>
where
    T: DatagramTransport + ?Sized,
{
    debug!("Dispatch thread started");

    let mut summary = DispatchSummary::default();
    let mut latency = RunningStats::default();

    loop {
        let datagram = match consumer.dequeue_one()? {
            Dequeued::Datagram(datagram) => datagram,
            Dequeued::Closed => break,
        };
        metrics.set_queue_len(consumer.queue().len());

        let queued_ms = datagram.enqueued_at().elapsed().as_secs_f64() * 1000.0;
        latency.push(queued_ms);
        observability::record_queue_latency_ms(queued_ms);

        transmit(transport, &datagram, write_timeout)?;

        metrics.record_sent(datagram.len());
        summary.datagrams_sent += 1;
        summary.bytes_sent += datagram.len() as u64;

        debug!(
            seq = datagram.seq(),
            bytes = datagram.len(),
            queued_ms,
            "Datagram sent"
        );
    }

    summary.latency_ms = latency.summary();
    Ok(summary)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Send one whole datagram, retrying only interrupted calls
fn transmit<T>(transport: &T, datagram: &Datagram, write_timeout: Duration) -> Result<(), DispatchError>
where
    T: DatagramTransport + ?Sized,
{
    let payload = datagram.payload();
    loop {
        match transport.send_datagram(payload) {
            Ok(sent) if sent == payload.len() => return Ok(()),
            Ok(sent) => {
                return Err(DispatchError::ShortSend {
                    sent,
                    expected: payload.len(),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!(seq = datagram.seq(), "Send interrupted, retrying");
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(DispatchError::WriteTimeout {
                    timeout: write_timeout,
                });
            }
            Err(e) => return Err(DispatchError::Transmit(e)),
        }
    }
}
