//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the controller:
//! configuration model, fatal notification capability and the common error type.
//! Business crates depend on this crate only; reverse dependencies are prohibited.

mod controller;
mod error;
mod fatal;

pub use controller::*;
pub use error::*;
pub use fatal::*;
