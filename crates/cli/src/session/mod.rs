//! Controller session - dispatcher lifecycle as seen by the foreground.

mod controller;
mod stats;

pub use controller::{parse_value, wait_for_fatal, Session};
pub use stats::SessionStats;
