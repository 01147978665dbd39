//! Fan-out delivery
//!
//! Pushes one frame to many connections. Each send is independent: a closed
//! connection is recorded in the report and delivery carries on with the
//! rest. The caller decides what to do with failures (the registry evicts
//! them from the live subscriber set).

use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::HistoryEntry;
use crate::client::{Client, ConnectionId};
use crate::transport::message::ServerFrame;
use crate::utils::BrokerResult;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

/// Deliver `frame` to every subscriber. The frame is encoded once so every
/// recipient gets byte-identical content.
pub fn deliver<'a>(
    subscribers: impl IntoIterator<Item = &'a Client>,
    frame: &ServerFrame,
) -> FanoutReport {
    let ws_msg = WsMessage::text(frame.to_string());
    let mut report = FanoutReport::default();

    for client in subscribers {
        match client.send_raw(ws_msg.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(identity = %client.identity, "{e}");
                report.failed.push(client.id);
            }
        }
    }

    report
}

/// Queue `SUB-ACK` followed by the history snapshot, oldest first.
pub fn replay(client: &Client, channel: &str, history: &[HistoryEntry]) -> BrokerResult<()> {
    client.send(&ServerFrame::SubAck {
        channel: channel.to_string(),
    })?;
    for entry in history {
        client.send(&entry.to_frame(channel))?;
    }
    debug!(identity = %client.identity, channel, replayed = history.len(), "history replayed");
    Ok(())
}
