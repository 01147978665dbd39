//! The `transport` module handles network communication with clients over
//! WebSockets.
//!
//! It defines the colon-delimited text protocol spoken between clients and
//! the server (`message`), the per-connection command dispatcher
//! (`session`) and the WebSocket server itself (`websocket`).

pub mod message;
pub mod session;
pub mod websocket;

pub use message::{ClientFrame, ServerFrame};
pub use session::Session;
pub use websocket::{serve, start_websocket_server};

#[cfg(test)]
mod websocket_tests;
