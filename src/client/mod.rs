//! The `client` module defines how a connected client is represented in the
//! broker.
//!
//! It provides the [`Identity`] handed out to every connection, the
//! [`IdentityAssigner`] that issues it, and the [`Client`] handle the
//! registry stores in subscriber sets to push frames to a connection.

pub mod identity;
pub mod pubsub_client;

pub use identity::{Identity, IdentityAssigner};
pub use pubsub_client::{Client, ConnectionId};
