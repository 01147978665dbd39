//! Broker engine
//!
//! The channel registry shared by every connection task. It owns:
//! - the map of channel name → `Channel` (history + subscriber set)
//! - the history retention policy applied to every channel
//!
//! Concurrency and usage notes:
//! - The broker is shared as `Arc<Broker>`; all methods take `&self`.
//! - The channel map sits behind a `RwLock` and each channel behind its own
//!   `Mutex`, so operations on different channels do not serialize. A
//!   channel lock is never held while the map's write lock is requested.
//! - Sends to subscribers only push onto unbounded per-connection queues, so
//!   fan-out runs under the channel lock without waiting on the network.
//!   This is what keeps per-channel delivery order equal to publish order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::broker::channel::{Channel, HistoryPolicy};
use crate::broker::fanout;
use crate::broker::message::HistoryEntry;
use crate::client::{Client, ConnectionId, Identity};
use crate::utils::{BrokerError, BrokerResult};

/// Outcome of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: usize,
}

#[derive(Debug, Default)]
pub struct Broker {
    channels: RwLock<HashMap<String, Arc<Mutex<Channel>>>>,
    policy: HistoryPolicy,
}

/// Channel names must be non-empty and purely alphanumeric.
pub fn validate_channel_name(name: &str) -> BrokerResult<()> {
    if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
        return Err(BrokerError::InvalidChannelName(name.to_string()));
    }
    Ok(())
}

impl Broker {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> &HistoryPolicy {
        &self.policy
    }

    fn channel(&self, name: &str) -> Option<Arc<Mutex<Channel>>> {
        self.channels.read().get(name).cloned()
    }

    fn channel_or_insert(&self, name: &str) -> Arc<Mutex<Channel>> {
        if let Some(channel) = self.channel(name) {
            return channel;
        }
        self.channels
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(channel = name, "channel created");
                Arc::new(Mutex::new(Channel::new(name)))
            })
            .clone()
    }

    /// Subscribe a connection and replay the channel's history to it.
    ///
    /// `SUB-ACK` and the replayed `MSG` frames are queued before the channel
    /// lock is released, so no live publish can overtake them. Subscribing an
    /// already-subscribed connection only replays again. Returns a copy of
    /// the history that was replayed, or `DeliveryFailure` if the connection's
    /// queue is closed, in which case it is not left subscribed.
    pub fn subscribe(&self, channel: &str, client: &Client) -> BrokerResult<Vec<HistoryEntry>> {
        validate_channel_name(channel)?;

        let handle = self.channel_or_insert(channel);
        let mut ch = handle.lock();

        let expired = ch.prune_expired(&self.policy, Utc::now());
        if expired > 0 {
            debug!(channel, expired, "expired history entries dropped");
        }

        if !ch.subscribe(client) {
            debug!(identity = %client.identity, channel, "already subscribed");
        }

        let snapshot: Vec<HistoryEntry> = ch.history().cloned().collect();
        if let Err(e) = fanout::replay(client, channel, &snapshot) {
            warn!(identity = %client.identity, channel, "replay failed: {e}");
            ch.remove_connection(client.id);
            return Err(e);
        }

        Ok(snapshot)
    }

    /// Append to history and fan out to the current subscribers.
    ///
    /// Only identities subscribed to `channel` may publish to it. Publishing
    /// to a channel that was never subscribed to creates no state.
    pub fn publish(&self, channel: &str, identity: &Identity, content: &str) -> BrokerResult<Delivery> {
        let not_subscribed = || BrokerError::NotSubscribed(channel.to_string());

        let handle = self.channel(channel).ok_or_else(not_subscribed)?;
        let mut ch = handle.lock();
        if !ch.has_identity(identity) {
            return Err(not_subscribed());
        }

        let entry = HistoryEntry::new(identity.clone(), content);
        let frame = entry.to_frame(channel);
        ch.append(entry, &self.policy);

        let report = fanout::deliver(ch.subscribers(), &frame);
        for id in &report.failed {
            ch.remove_connection(*id);
            debug!(channel, connection = %id, "evicted unreachable subscriber");
        }

        Ok(Delivery {
            delivered: report.delivered,
            evicted: report.failed.len(),
        })
    }

    /// Remove every entry for `identity` from `channel`. Unknown channels
    /// and non-subscribers are a silent no-op.
    pub fn unsubscribe(&self, channel: &str, identity: &Identity) -> usize {
        match self.channel(channel) {
            Some(handle) => handle.lock().unsubscribe(identity),
            None => 0,
        }
    }

    /// Purge a connection from every channel. Called once when it closes.
    /// Returns the number of channels it was removed from.
    pub fn deregister(&self, id: ConnectionId) -> usize {
        let channels: Vec<_> = self.channels.read().values().cloned().collect();

        let removed = channels
            .iter()
            .filter(|handle| handle.lock().remove_connection(id))
            .count();

        debug!(connection = %id, channels = removed, "connection deregistered");
        removed
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channel(channel)
            .map(|handle| handle.lock().subscriber_count())
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, channel: &str, id: ConnectionId) -> bool {
        self.channel(channel)
            .is_some_and(|handle| handle.lock().contains(id))
    }

    /// A copy of the channel's unexpired history, oldest first.
    pub fn history(&self, channel: &str) -> Vec<HistoryEntry> {
        let Some(handle) = self.channel(channel) else {
            return Vec::new();
        };
        let mut ch = handle.lock();
        ch.prune_expired(&self.policy, Utc::now());
        ch.history().cloned().collect()
    }
}
