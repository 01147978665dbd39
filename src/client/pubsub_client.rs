//! Client representation
//!
//! `Client` models one live connection as seen by the broker: the identity
//! assigned to it, a process-unique connection id and the sending side of
//! the connection's outbound queue. The WebSocket writer task owns the
//! receiving side; once it exits, every `send` on the handle fails.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::client::identity::Identity;
use crate::transport::message::ServerFrame;
use crate::utils::{BrokerError, BrokerResult};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Key of a subscriber-set entry. Unique per connection for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: ConnectionId,
    pub identity: Identity,
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    /// Create a handle for a freshly accepted connection.
    pub fn new(identity: Identity, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: ConnectionId::next(),
            identity,
            sender,
        }
    }

    /// Queue an already-encoded message. Fails only when the connection's
    /// writer has gone away.
    pub fn send_raw(&self, msg: WsMessage) -> BrokerResult<()> {
        self.sender
            .send(msg)
            .map_err(|_| BrokerError::DeliveryFailure(self.id))
    }

    pub fn send(&self, frame: &ServerFrame) -> BrokerResult<()> {
        self.send_raw(WsMessage::text(frame.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
