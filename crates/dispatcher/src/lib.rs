//! # Dispatcher
//!
//! Background OSC dispatch engine.
//!
//! - Encodes `(address, f32)` pairs into single-float OSC datagrams
//! - Queues them in strict FIFO order for one dedicated dispatch thread
//! - Keeps the foreground off the network: enqueue only takes a short lock
//! - Stops cooperatively, discarding anything still queued
//! - Escalates a transport failure exactly once through a [`FatalNotify`]

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod fatal;
pub mod handle;
pub mod metrics;
pub mod queue;
pub mod transport;
mod worker;

pub use codec::{
    decode_float_message, encode_float_message, encoded_len, padded_len, FloatMessage,
    FLOAT_TYPE_TAG,
};
pub use contracts::{FatalEvent, FatalKind, FatalNotify};
pub use dispatcher::{Dispatcher, DispatcherConfig, ShutdownReport, DEFAULT_WRITE_TIMEOUT};
pub use error::{DecodeError, DispatchError, EncodeError, QueueError};
pub use fatal::{fatal_channel, FatalForwarder, FatalReceiver, FatalSender};
pub use handle::DispatchHandle;
pub use metrics::{DispatchMetrics, DispatchSummary, MetricsSnapshot};
pub use queue::{outbound_queue, Datagram, Dequeued, OutboundQueue, QueueConsumer};
pub use transport::{DatagramTransport, OscSocket};
