//! The `utils` module provides definitions shared across `chanbroker`:
//! error types and logging setup.

pub mod error;
pub mod logging;

pub use error::{BrokerError, BrokerResult, FrameError, ServerError};
