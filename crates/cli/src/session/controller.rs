//! Session - connect, start dispatching, feed values, shut down, disconnect.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use contracts::{ControllerConfig, FatalEvent};
use dispatcher::{
    fatal_channel, DispatchError, DispatchHandle, Dispatcher, FatalReceiver, OscSocket,
    ShutdownReport,
};
use tracing::{debug, info, instrument, warn};

use super::SessionStats;

/// Poll interval while waiting for the queue to drain
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// One controller run against one remote listener
pub struct Session {
    config: ControllerConfig,
    socket: Option<OscSocket>,
    dispatcher: Option<Dispatcher>,
    handle: DispatchHandle,
    started: Instant,
    values_read: u64,
    values_rejected: u64,
}

impl Session {
    /// Connect and start the dispatch thread.
    ///
    /// With dispatching disabled nothing touches the network and no fatal
    /// receiver is returned.
    #[instrument(
        name = "session_open",
        skip(config),
        fields(host = %config.osc.host, port = config.osc.port, enabled = config.osc.enabled)
    )]
    pub fn open(config: ControllerConfig) -> Result<(Self, Option<FatalReceiver>)> {
        if !config.osc.enabled {
            info!("OSC dispatch disabled, value changes will not be sent");
            let session = Self::new(config, None, None, DispatchHandle::disabled());
            return Ok((session, None));
        }

        let write_timeout = Duration::from_secs(config.osc.write_timeout_secs);
        let socket = OscSocket::connect(&config.osc.host, config.osc.port, write_timeout)
            .with_context(|| {
                format!(
                    "Failed to connect to OSC listener at {}:{}",
                    config.osc.host, config.osc.port
                )
            })?;

        let (notifier, fatal_rx) = fatal_channel();
        let dispatcher =
            Dispatcher::start(&socket, notifier).context("Failed to start dispatch thread")?;
        let handle = dispatcher.handle();

        info!(peer = %socket.peer(), "OSC session connected");

        let session = Self::new(config, Some(socket), Some(dispatcher), handle);
        Ok((session, Some(fatal_rx)))
    }

    fn new(
        config: ControllerConfig,
        socket: Option<OscSocket>,
        dispatcher: Option<Dispatcher>,
        handle: DispatchHandle,
    ) -> Self {
        Self {
            config,
            socket,
            dispatcher,
            handle,
            started: Instant::now(),
            values_read: 0,
            values_rejected: 0,
        }
    }

    pub fn is_dispatching(&self) -> bool {
        self.handle.is_enabled()
    }

    /// Queue the initial value of every transmittable control
    #[instrument(name = "session_enqueue_all_controls", skip(self))]
    pub fn enqueue_all_controls(&mut self) -> Result<usize> {
        if !self.is_dispatching() {
            return Ok(0);
        }

        let mut queued = 0;
        for control in self.config.transmittable_controls() {
            self.handle
                .enqueue(&control.address, control.value as f32)
                .with_context(|| format!("Failed to queue initial value of {}", control.address))?;
            queued += 1;
        }

        let skipped = self.config.controls.len() - queued;
        if skipped > 0 {
            debug!(skipped, "String controls not transmitted");
        }
        info!(queued, "Initial control values queued");
        Ok(queued)
    }

    /// Record a value change and queue it for transmission.
    ///
    /// Returns the datagram sequence number, or `None` when dispatching is
    /// disabled.
    pub fn set_value(&mut self, address: &str, value: f64) -> Result<Option<u64>> {
        self.values_read += 1;

        if let Some(control) = self.config.control(address) {
            if !control.data_type.is_numeric() {
                self.values_rejected += 1;
                bail!("Control {address} has type {:?} and is not transmitted", control.data_type);
            }
        } else if !self.config.controls.is_empty() {
            debug!(address, "Value for unconfigured address");
        }

        if !self.is_dispatching() {
            info!(address, value, "Value changed (dispatch disabled)");
            return Ok(None);
        }

        match self.handle.enqueue(address, value as f32) {
            Ok(seq) => Ok(Some(seq)),
            Err(e) => {
                self.values_rejected += 1;
                Err(e).with_context(|| format!("Failed to queue value for {address}"))
            }
        }
    }

    /// Wait until everything queued so far has been sent.
    ///
    /// Gives up when `limit` elapses or the dispatch thread reports a failure.
    pub async fn drain(&self, fatal: &mut Option<FatalReceiver>, limit: Duration) -> Result<()> {
        if !self.is_dispatching() {
            return Ok(());
        }

        let all_sent = async {
            loop {
                let metrics = self.handle.metrics();
                if metrics.sent >= metrics.enqueued {
                    return;
                }
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };

        tokio::select! {
            result = tokio::time::timeout(limit, all_sent) => {
                result.with_context(|| format!("Queue not drained within {limit:?}"))
            }
            event = wait_for_fatal(fatal) => {
                bail!("{event}")
            }
        }
    }

    /// Run the termination protocol, then close the socket.
    ///
    /// Fails when the dispatch thread had stopped on its error path.
    #[instrument(name = "session_close", skip(self))]
    pub async fn close(mut self) -> Result<SessionStats> {
        let mut stats = SessionStats {
            duration: Duration::ZERO,
            peer: self.socket.as_ref().map(OscSocket::peer),
            values_read: self.values_read,
            values_rejected: self.values_rejected,
            ..SessionStats::default()
        };

        let shutdown = match self.dispatcher.take() {
            Some(dispatcher) => Some(
                tokio::task::spawn_blocking(move || dispatcher.shutdown())
                    .await
                    .context("Dispatcher shutdown task failed")?,
            ),
            None => None,
        };

        let disconnected = match self.socket.take() {
            Some(socket) => socket.disconnect(),
            None => Ok(()),
        };

        stats.metrics = self.handle.metrics();
        stats.duration = self.started.elapsed();

        settle_close(stats, shutdown, disconnected)
    }
}

/// Combine the shutdown and disconnect outcomes; a dispatch failure wins
fn settle_close(
    mut stats: SessionStats,
    shutdown: Option<Result<ShutdownReport, DispatchError>>,
    disconnected: Result<(), DispatchError>,
) -> Result<SessionStats> {
    match shutdown {
        Some(Ok(report)) => {
            stats.latency_ms = report.summary.latency_ms;
            info!(
                sent = report.summary.datagrams_sent,
                dropped = report.dropped,
                "Session closed"
            );
        }
        Some(Err(e)) => {
            if let Err(ref close_err) = disconnected {
                warn!(error = %close_err, "OSC socket close also failed");
            }
            warn!(error = %e, "Dispatch thread had stopped on an error");
            return Err(e).context("OSC dispatch failed");
        }
        None => {}
    }

    disconnected.context("Failed to close OSC socket")?;
    Ok(stats)
}

/// Resolve with the dispatch thread's fatal event.
///
/// Pends forever when there is no receiver or the thread exited cleanly.
pub async fn wait_for_fatal(fatal: &mut Option<FatalReceiver>) -> FatalEvent {
    if let Some(rx) = fatal.as_mut() {
        if let Some(event) = rx.recv().await {
            return event;
        }
        *fatal = None;
    }
    std::future::pending().await
}

/// Parse a control value: a number, or `true`/`false`
pub fn parse_value(raw: &str) -> Result<f64> {
    let value = match raw {
        "true" | "on" => 1.0,
        "false" | "off" => 0.0,
        _ => raw
            .parse::<f64>()
            .with_context(|| format!("Invalid value '{raw}'"))?,
    };
    if !value.is_finite() {
        bail!("Value must be finite, got '{raw}'");
    }
    Ok(value)
}
