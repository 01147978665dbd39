//! The `broker` module holds the channel registry and fan-out delivery.
//!
//! - `engine`: the [`Broker`] registry (subscribe, publish, unsubscribe,
//!   deregister).
//! - `channel`: per-channel history and subscriber set, plus the history
//!   retention policy.
//! - `fanout`: delivery of one frame to many connections.
//! - `message`: the history entry type.

pub mod channel;
pub mod engine;
pub mod fanout;
pub mod message;

pub use channel::HistoryPolicy;
pub use engine::{Broker, Delivery};
