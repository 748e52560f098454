//! One-shot fatal notification channel
//!
//! The dispatch thread raises at most one [`FatalEvent`]. [`fatal_channel`]
//! gives the host a receiver it can poll, await, or block on.

use contracts::{FatalEvent, FatalNotify};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Create a connected sender/receiver pair
pub fn fatal_channel() -> (FatalSender, FatalReceiver) {
    let (tx, rx) = oneshot::channel();
    (FatalSender { tx: Some(tx) }, FatalReceiver { rx: Some(rx) })
}

/// Sending half, handed to the dispatcher as its notifier
#[derive(Debug)]
pub struct FatalSender {
    tx: Option<oneshot::Sender<FatalEvent>>,
}

impl FatalNotify for FatalSender {
    fn notify(&mut self, event: FatalEvent) {
        match self.tx.take() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("Fatal event receiver dropped before notification");
                }
            }
            None => warn!(%event, "Fatal event already delivered, ignoring"),
        }
    }
}

/// Receiving half, kept by the foreground
#[derive(Debug)]
pub struct FatalReceiver {
    rx: Option<oneshot::Receiver<FatalEvent>>,
}

impl FatalReceiver {
    /// Non-blocking poll.
    ///
    /// Returns the event once; after that, or when the sender is gone, always `None`.
    pub fn try_recv(&mut self) -> Option<FatalEvent> {
        let rx = self.rx.as_mut()?;
        match rx.try_recv() {
            Ok(event) => {
                self.rx = None;
                Some(event)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.rx = None;
                None
            }
        }
    }

    /// Wait for the event.
    ///
    /// Resolves to `None` when the sender is dropped without notifying, which
    /// is what a cleanly exiting dispatch thread does. Cancel safe.
    pub async fn recv(&mut self) -> Option<FatalEvent> {
        let rx = self.rx.as_mut()?;
        let result = rx.await;
        self.rx = None;
        result.ok()
    }

    /// Block the current thread until the event arrives or the sender is dropped.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(mut self) -> Option<FatalEvent> {
        self.rx.take()?.blocking_recv().ok()
    }

    /// Whether the channel can still yield an event
    pub fn is_pending(&self) -> bool {
        self.rx.is_some()
    }
}

/// Routes the fatal event into a host's own unbounded event channel
#[derive(Debug)]
pub struct FatalForwarder<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> FatalForwarder<E> {
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        Self { tx }
    }
}

impl<E> FatalNotify for FatalForwarder<E>
where
    E: From<FatalEvent> + Send + 'static,
{
    fn notify(&mut self, event: FatalEvent) {
        if self.tx.send(E::from(event)).is_err() {
            warn!("Host event channel closed, fatal event lost");
        }
    }
}
