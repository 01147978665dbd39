//! # chanbroker
//!
//! `chanbroker` is a minimal, in-memory publish/subscribe broker. Clients
//! connect over WebSocket, receive an opaque identity, subscribe to named
//! channels and publish text messages that are fanned out to every current
//! subscriber. New subscribers get the channel's history replayed first.
//!
//! ## Core Modules
//!
//! - `broker`: the channel registry, history retention and fan-out delivery.
//! - `client`: connection identity and the handle used to push frames.
//! - `config`: loading server configuration from file and environment.
//! - `transport`: the text protocol, per-connection sessions and the
//!   WebSocket server.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
