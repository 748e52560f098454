//! Fatal notification contract
//!
//! The dispatch thread reports an unrecoverable failure exactly once through
//! an injected [`FatalNotify`] capability. What the host does with it is the
//! host's business.

use std::fmt;

/// Kind of fatal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    /// The background dispatch thread stopped on an I/O or synchronization error
    DispatchThreadFailed,
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DispatchThreadFailed => f.write_str("dispatch thread failed"),
        }
    }
}

/// A fatal occurrence raised by the dispatch thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    pub kind: FatalKind,
    /// Human readable cause, for logging
    pub message: String,
}

impl FatalEvent {
    /// Create a `DispatchThreadFailed` event
    pub fn dispatch_failed(message: impl Into<String>) -> Self {
        Self {
            kind: FatalKind::DispatchThreadFailed,
            message: message.into(),
        }
    }
}

impl fmt::Display for FatalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Fire-and-forget sink for fatal events
///
/// Called at most once per dispatcher, from the dispatch thread, right before
/// it exits.
pub trait FatalNotify: Send + 'static {
    fn notify(&mut self, event: FatalEvent);
}

/// Discards the event; the host only inspects the join result.
impl FatalNotify for () {
    fn notify(&mut self, _event: FatalEvent) {}
}

impl<F> FatalNotify for Option<F>
where
    F: FnOnce(FatalEvent) + Send + 'static,
{
    fn notify(&mut self, event: FatalEvent) {
        if let Some(callback) = self.take() {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn display_includes_kind_and_message() {
        let event = FatalEvent::dispatch_failed("write timed out");
        assert_eq!(event.to_string(), "dispatch thread failed: write timed out");
    }

    #[test]
    fn callback_notifier_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut notifier = Some(move |_event: FatalEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(FatalEvent::dispatch_failed("first"));
        notifier.notify(FatalEvent::dispatch_failed("second"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
