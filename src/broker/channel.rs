//! Channel state
//!
//! A `Channel` holds the ordered message history for a channel name and the
//! set of connections currently subscribed to it. Subscribers are keyed by
//! `ConnectionId`, so one connection appears at most once and re-subscribing
//! is a no-op.
//!
//! Concurrency note: a `Channel` has no internal locking. The registry keeps
//! each channel behind its own mutex and every method here runs under it.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};

use crate::broker::message::HistoryEntry;
use crate::client::{Client, ConnectionId, Identity};

/// Retention rules applied to every channel's history.
///
/// The default keeps everything for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryPolicy {
    pub max_entries: Option<usize>,
    pub ttl: Option<TimeDelta>,
}

impl HistoryPolicy {
    /// Build a policy from raw settings, where `0` disables a limit.
    pub fn from_limits(max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            max_entries: (max_entries > 0).then_some(max_entries),
            ttl: i64::try_from(ttl_secs)
                .ok()
                .filter(|secs| *secs > 0)
                .and_then(TimeDelta::try_seconds),
        }
    }
}

#[derive(Debug)]
pub struct Channel {
    pub name: String,
    history: VecDeque<HistoryEntry>,
    subscribers: HashMap<ConnectionId, Client>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            history: VecDeque::new(),
            subscribers: HashMap::new(),
        }
    }

    /// Add a connection. Returns `false` if it was already subscribed.
    pub fn subscribe(&mut self, client: &Client) -> bool {
        if self.subscribers.contains_key(&client.id) {
            return false;
        }
        self.subscribers.insert(client.id, client.clone());
        true
    }

    /// Remove every entry carrying `identity`. Returns how many were removed.
    pub fn unsubscribe(&mut self, identity: &Identity) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|_, c| &c.identity != identity);
        before - self.subscribers.len()
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn has_identity(&self, identity: &Identity) -> bool {
        self.subscribers.values().any(|c| &c.identity == identity)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &Client> {
        self.subscribers.values()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Append to history, then drop expired entries and the oldest entries
    /// beyond the cap.
    pub fn append(&mut self, entry: HistoryEntry, policy: &HistoryPolicy) {
        let now = entry.published_at;
        self.history.push_back(entry);
        self.prune_expired(policy, now);
        if let Some(max) = policy.max_entries {
            while self.history.len() > max {
                self.history.pop_front();
            }
        }
    }

    /// Drop entries published before `now - ttl`.
    pub fn prune_expired(&mut self, policy: &HistoryPolicy, now: DateTime<Utc>) -> usize {
        let Some(ttl) = policy.ttl else {
            return 0;
        };
        let cutoff = now - ttl;
        let before = self.history.len();
        // history is chronological, so expired entries form a prefix
        while self
            .history
            .front()
            .is_some_and(|entry| entry.published_at < cutoff)
        {
            self.history.pop_front();
        }
        before - self.history.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
