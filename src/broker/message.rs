//! History entries
//!
//! A `HistoryEntry` is one published message as kept in a channel's history:
//! who published it, what they sent and when the broker accepted it. The
//! channel name is not stored; entries always live inside their channel.

use chrono::{DateTime, Utc};

use crate::client::Identity;
use crate::transport::message::ServerFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sender: Identity,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(sender: Identity, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            published_at: Utc::now(),
        }
    }

    /// The `MSG` frame used both for live delivery and history replay.
    pub fn to_frame(&self, channel: &str) -> ServerFrame {
        ServerFrame::Msg {
            channel: channel.to_string(),
            sender: self.sender.clone(),
            content: self.content.clone(),
        }
    }
}
