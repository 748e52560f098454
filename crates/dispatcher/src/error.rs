//! Dispatcher error types

use std::collections::TryReserveError;
use std::time::Duration;

use thiserror::Error;

/// Errors building an OSC datagram
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Address is the empty string
    #[error("OSC address cannot be empty")]
    EmptyAddress,

    /// Address would not survive NUL termination
    #[error("OSC address '{address}' contains a NUL byte")]
    InvalidAddress { address: String },

    /// Buffer allocation failed
    #[error("failed to allocate {size} bytes for OSC message")]
    Alloc {
        size: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Errors parsing an OSC datagram
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram ended before a field was complete
    #[error("datagram truncated: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// String field without NUL terminator
    #[error("string field is not NUL terminated")]
    MissingTerminator,

    /// Padding bytes after a terminator were not zero
    #[error("string field has non-zero padding")]
    NonZeroPadding,

    /// Address is not valid UTF-8
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// Type tag other than the single float tag
    #[error("unsupported type tag '{0}'")]
    UnsupportedTypeTag(String),

    /// Bytes left after the float argument
    #[error("{0} trailing bytes after argument")]
    TrailingBytes(usize),
}

/// Errors raised by the outbound queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// Enqueue after the termination flush
    #[error("outbound queue is closed")]
    Closed,

    /// Termination flush requested twice
    #[error("outbound queue was already flushed for shutdown")]
    AlreadyClosed,

    /// The consumer end is gone (dispatch thread exited)
    #[error("dispatch thread is no longer consuming")]
    ConsumerGone,

    /// Queue mutex poisoned by a panicking thread
    #[error("outbound queue mutex poisoned")]
    Poisoned,

    /// Message could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Dispatcher-level errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Host name did not resolve to a usable address
    #[error("failed to resolve '{host}:{port}': {message}")]
    Resolve {
        host: String,
        port: u16,
        message: String,
    },

    /// Socket creation or connect failure
    #[error("failed to connect datagram socket to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Dispatching disabled, no transport configured
    #[error("OSC dispatch is disabled (no transport configured)")]
    Disabled,

    /// Message could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Queue failure
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Dispatch thread could not be started
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Socket did not become writable in time
    #[error("socket not writable within {timeout:?}")]
    WriteTimeout { timeout: Duration },

    /// Non-interrupt send failure
    #[error("datagram send failed: {0}")]
    Transmit(#[source] std::io::Error),

    /// Datagram only partially written
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },

    /// Dispatch thread panicked
    #[error("dispatch thread panicked")]
    ThreadPanicked,

    /// Write half-close failed; the socket is closed regardless
    #[error("failed to shut down socket writes: {0}")]
    Disconnect(#[source] std::io::Error),

    /// Disconnect while a dispatch thread still holds the socket
    #[error("socket is still in use by a dispatch thread")]
    SocketInUse,
}

impl DispatchError {
    /// Create a resolution error
    pub fn resolve(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::Resolve {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Create a connect error
    pub fn connect(host: impl Into<String>, port: u16, source: std::io::Error) -> Self {
        Self::Connect {
            host: host.into(),
            port,
            source,
        }
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Resolve { .. } => "resolve",
            Self::Connect { .. } => "connect",
            Self::Disabled => "disabled",
            Self::Encode(_) => "encode",
            Self::Queue(_) => "queue",
            Self::Spawn(_) => "spawn",
            Self::WriteTimeout { .. } => "write_timeout",
            Self::Transmit(_) => "transmit",
            Self::ShortSend { .. } => "short_send",
            Self::ThreadPanicked => "panic",
            Self::Disconnect(_) => "disconnect",
            Self::SocketInUse => "socket_in_use",
        }
    }
}
