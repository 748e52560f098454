//! Dispatcher - owns the dispatch thread and runs the termination protocol

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::FatalNotify;
use tracing::{debug, info, instrument, warn};

use crate::error::{DispatchError, QueueError};
use crate::handle::DispatchHandle;
use crate::metrics::{DispatchMetrics, DispatchSummary, MetricsSnapshot};
use crate::queue::{outbound_queue, OutboundQueue};
use crate::transport::{DatagramTransport, OscSocket};
use crate::worker::run_dispatch_thread;

/// Writability ceiling for a single send
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Reported as the timeout in [`DispatchError::WriteTimeout`]
    pub write_timeout: Duration,
    /// OS thread name
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            thread_name: "osc-dispatch".to_string(),
        }
    }
}

/// Result of a completed termination protocol
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Datagrams discarded without transmission
    pub dropped: usize,
    pub summary: DispatchSummary,
}

/// A running dispatch thread and its queue
pub struct Dispatcher {
    queue: Arc<OutboundQueue>,
    metrics: Arc<DispatchMetrics>,
    worker: Option<JoinHandle<Result<DispatchSummary, DispatchError>>>,
}

impl Dispatcher {
    /// Start dispatching on a connected socket
    pub fn start<N: FatalNotify>(socket: &OscSocket, notifier: N) -> Result<Self, DispatchError> {
        let config = DispatcherConfig {
            write_timeout: socket.write_timeout(),
            ..DispatcherConfig::default()
        };
        Self::spawn(socket.shared(), config, notifier)
    }

    /// Start dispatching on any transport.
    ///
    /// If the thread cannot be started nothing is left running.
    #[instrument(
        name = "dispatcher_spawn",
        skip(transport, config, notifier),
        fields(thread = %config.thread_name)
    )]
    pub fn spawn<T, N>(
        transport: Arc<T>,
        config: DispatcherConfig,
        notifier: N,
    ) -> Result<Self, DispatchError>
    where
        T: DatagramTransport + ?Sized,
        N: FatalNotify,
    {
        let (queue, consumer) = outbound_queue();
        let metrics = Arc::new(DispatchMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let write_timeout = config.write_timeout;

        let worker = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || {
                run_dispatch_thread(consumer, transport, write_timeout, worker_metrics, notifier)
            })
            .map_err(DispatchError::Spawn)?;

        info!(?write_timeout, "Dispatcher started");

        Ok(Self {
            queue,
            metrics,
            worker: Some(worker),
        })
    }

    /// Cloneable producer handle
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle::new(Arc::clone(&self.queue), Arc::clone(&self.metrics))
    }

    /// Queue `value` for `address`
    pub fn enqueue(&self, address: &str, value: f32) -> Result<u64, DispatchError> {
        self.handle().enqueue(address, value)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether the dispatch thread is still alive
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Discard pending datagrams and wake the dispatch thread so it stops.
    ///
    /// Does not block. Returns the number of datagrams discarded.
    #[instrument(name = "dispatcher_request_shutdown", skip(self))]
    pub fn request_shutdown(&self) -> Result<usize, DispatchError> {
        let dropped = self.queue.flush_and_signal_shutdown()?;
        self.metrics.add_dropped(dropped);
        self.metrics.set_queue_len(0);
        if dropped > 0 {
            warn!(dropped, "Discarded unsent datagrams on shutdown");
        }
        Ok(dropped)
    }

    /// Block until the dispatch thread has exited and return its outcome
    #[instrument(name = "dispatcher_join", skip(self))]
    pub fn join(mut self) -> Result<DispatchSummary, DispatchError> {
        let worker = self.worker.take().ok_or(DispatchError::ThreadPanicked)?;
        let result = worker.join().map_err(|_| DispatchError::ThreadPanicked)?;
        debug!(ok = result.is_ok(), "Dispatch thread joined");
        result
    }

    /// Run the whole termination protocol: flush, wake, join.
    ///
    /// A flush already done through [`Dispatcher::request_shutdown`] is fine.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub fn shutdown(self) -> Result<ShutdownReport, DispatchError> {
        let dropped = match self.request_shutdown() {
            Ok(dropped) => dropped,
            Err(DispatchError::Queue(QueueError::AlreadyClosed)) => 0,
            Err(e) => return Err(e),
        };

        let summary = self.join()?;
        info!(
            sent = summary.datagrams_sent,
            dropped,
            "Dispatcher shutdown complete"
        );
        Ok(ShutdownReport { dropped, summary })
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Never joins; an unjoined thread is only told to stop.
        if self.worker.is_some() {
            if let Ok(dropped) = self.queue.flush_and_signal_shutdown() {
                self.metrics.add_dropped(dropped);
                debug!(dropped, "Dispatcher dropped without shutdown");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.queue.len())
            .field("closed", &self.queue.is_closed())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_float_message;
    use crate::fatal::{fatal_channel, FatalForwarder};
    use contracts::{FatalEvent, FatalKind};
    use std::io;
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc as std_mpsc, Mutex};

    /// Records every payload it is asked to send
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl DatagramTransport for RecordingTransport {
        fn send_datagram(&self, payload: &[u8]) -> io::Result<usize> {
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(payload.len())
        }
    }

    /// Never becomes writable
    struct StalledTransport {
        attempts: AtomicUsize,
    }

    impl DatagramTransport for StalledTransport {
        fn send_datagram(&self, _payload: &[u8]) -> io::Result<usize> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from(io::ErrorKind::TimedOut))
        }
    }

    /// Panics on the first send
    struct PanickingTransport;

    impl DatagramTransport for PanickingTransport {
        fn send_datagram(&self, _payload: &[u8]) -> io::Result<usize> {
            panic!("transport exploded");
        }
    }

    /// Blocks inside the first send until released
    struct GatedTransport {
        entered: Mutex<Option<std_mpsc::Sender<()>>>,
        release: Mutex<std_mpsc::Receiver<()>>,
        sent: AtomicUsize,
    }

    impl DatagramTransport for GatedTransport {
        fn send_datagram(&self, payload: &[u8]) -> io::Result<usize> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(payload.len())
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            write_timeout: Duration::from_millis(50),
            thread_name: "osc-dispatch-test".to_string(),
        }
    }

    #[test]
    fn test_enqueue_and_shutdown_sends_in_order() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), test_config(), ()).unwrap();

        for i in 0..10 {
            dispatcher.enqueue("/fader", i as f32).unwrap();
        }
        // Let the thread drain before the flush discards anything
        while dispatcher.metrics().sent < 10 {
            thread::sleep(Duration::from_millis(1));
        }

        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(report.summary.datagrams_sent, 10);
        assert_eq!(report.summary.latency_ms.count, 10);

        let sent = transport.sent.lock().unwrap();
        let values: Vec<f32> = sent
            .iter()
            .map(|p| decode_float_message(p).unwrap().value)
            .collect();
        assert_eq!(values, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_on_empty_queue() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), test_config(), ()).unwrap();
        assert!(dispatcher.is_running());

        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(report.summary.datagrams_sent, 0);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_request_shutdown_twice() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::spawn(transport, test_config(), ()).unwrap();

        assert_eq!(dispatcher.request_shutdown().unwrap(), 0);
        assert!(matches!(
            dispatcher.request_shutdown(),
            Err(DispatchError::Queue(QueueError::AlreadyClosed))
        ));
        assert!(matches!(
            dispatcher.enqueue("/late", 1.0),
            Err(DispatchError::Queue(QueueError::Closed))
        ));

        // shutdown() tolerates the earlier flush
        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn test_queued_datagrams_dropped_on_terminate() {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let transport = Arc::new(GatedTransport {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
            sent: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), test_config(), ()).unwrap();

        dispatcher.enqueue("/a", 1.0).unwrap();
        entered_rx.recv().unwrap();

        // A is in flight; B and C are still queued
        dispatcher.enqueue("/b", 2.0).unwrap();
        dispatcher.enqueue("/c", 3.0).unwrap();
        assert_eq!(dispatcher.request_shutdown().unwrap(), 2);

        release_tx.send(()).unwrap();
        let summary = dispatcher.join().unwrap();

        assert_eq!(summary.datagrams_sent, 1);
        assert_eq!(transport.sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_timeout_raises_one_fatal_event() {
        let transport = Arc::new(StalledTransport {
            attempts: AtomicUsize::new(0),
        });
        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel::<FatalEvent>();
        let dispatcher = Dispatcher::spawn(
            Arc::clone(&transport),
            test_config(),
            FatalForwarder::new(events_tx),
        )
        .unwrap();

        dispatcher.enqueue("/a", 1.0).unwrap();

        let event = events_rx.blocking_recv().unwrap();
        assert_eq!(event.kind, FatalKind::DispatchThreadFailed);

        // The thread exited; the forwarder went with it
        assert!(events_rx.blocking_recv().is_none());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);

        let err = dispatcher.shutdown().unwrap_err();
        assert!(matches!(err, DispatchError::WriteTimeout { .. }));
    }

    #[test]
    fn test_fatal_channel_reports_failure() {
        let transport = Arc::new(StalledTransport {
            attempts: AtomicUsize::new(0),
        });
        let (notifier, fatal_rx) = fatal_channel();
        let dispatcher = Dispatcher::spawn(transport, test_config(), notifier).unwrap();

        dispatcher.enqueue("/a", 1.0).unwrap();
        let event = fatal_rx.blocking_recv().unwrap();
        assert!(event.message.contains("not writable"), "got: {event}");

        assert!(dispatcher.join().is_err());
    }

    #[test]
    fn test_panicking_thread_raises_fatal_event() {
        let (notifier, fatal_rx) = fatal_channel();
        let dispatcher =
            Dispatcher::spawn(Arc::new(PanickingTransport), test_config(), notifier).unwrap();

        dispatcher.enqueue("/a", 1.0).unwrap();
        let event = fatal_rx
            .blocking_recv()
            .expect("panicked thread must send a fatal event");
        assert_eq!(event.kind, FatalKind::DispatchThreadFailed);
        assert!(event.message.contains("panicked"), "got: {event}");

        assert!(matches!(dispatcher.join(), Err(DispatchError::ThreadPanicked)));
    }

    #[test]
    fn test_enqueue_after_thread_failure() {
        let transport = Arc::new(StalledTransport {
            attempts: AtomicUsize::new(0),
        });
        let (notifier, fatal_rx) = fatal_channel();
        let dispatcher = Dispatcher::spawn(transport, test_config(), notifier).unwrap();

        dispatcher.enqueue("/a", 1.0).unwrap();
        fatal_rx.blocking_recv().unwrap();
        while dispatcher.is_running() {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(matches!(
            dispatcher.enqueue("/b", 2.0),
            Err(DispatchError::Queue(QueueError::ConsumerGone))
        ));
        assert_eq!(dispatcher.metrics().failures, 1);
    }

    #[test]
    fn test_producers_race_consumer() {
        const PRODUCERS: usize = 6;
        const PER_PRODUCER: usize = 200;

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), test_config(), ()).unwrap();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let handle = dispatcher.handle();
                thread::spawn(move || {
                    let mut accepted = 0usize;
                    for i in 0..PER_PRODUCER {
                        if handle.enqueue(&format!("/p{p}"), i as f32).is_ok() {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        let dropped = dispatcher.request_shutdown().unwrap();
        let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
        let summary = dispatcher.join().unwrap();

        assert_eq!(summary.datagrams_sent as usize + dropped, accepted);
        assert_eq!(transport.sent.lock().unwrap().len(), summary.datagrams_sent as usize);
    }

    #[test]
    fn test_start_over_loopback_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        assert!(dispatcher.is_running());

        dispatcher.enqueue("/tab1/slider1", 0.5).unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(n, 24);
        assert_eq!(&buf[20..24], &[0x3F, 0x00, 0x00, 0x00]);

        dispatcher.shutdown().unwrap();
        socket.disconnect().unwrap();
    }

    #[test]
    fn test_drop_without_shutdown_stops_thread() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::spawn(Arc::clone(&transport), test_config(), ()).unwrap();
        let handle = dispatcher.handle();
        drop(dispatcher);

        // Thread exits and releases its transport reference
        while Arc::strong_count(&transport) > 1 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.enqueue("/a", 1.0).is_err());
    }
}
