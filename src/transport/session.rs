//! Connection session
//!
//! A `Session` is the per-connection state machine sitting between the
//! WebSocket reader and the broker. It owns the connection's identity and a
//! local record of the channels it subscribed to, turns each inbound text
//! frame into a registry call and answers on the connection's own queue.
//!
//! Dropping a session deregisters its connection from every channel. The
//! reader task owns the session, so cleanup runs exactly once whichever way
//! the connection ends.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::broker::Broker;
use crate::client::{Client, ConnectionId, Identity};
use crate::transport::message::{ClientFrame, ServerFrame};
use crate::utils::BrokerError;

pub struct Session {
    broker: Arc<Broker>,
    client: Client,
    subscriptions: BTreeSet<String>,
}

impl Session {
    pub fn new(broker: Arc<Broker>, client: Client) -> Self {
        Self {
            broker,
            client,
            subscriptions: BTreeSet::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.client.identity
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.client.id
    }

    /// Channels this connection subscribed to and has not left. The registry
    /// is authoritative; a subscriber evicted by fan-out stays listed here.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Send the `IDENTITY` frame. Must be the first frame on the connection.
    pub fn start(&self) {
        self.reply(&ServerFrame::Identity(self.client.identity.clone()));
        info!(identity = %self.client.identity, connection = %self.client.id, "client connected");
    }

    /// Parse and dispatch one inbound text frame. Bad frames are answered
    /// with an `ERROR` frame and never end the session.
    pub fn handle_text(&mut self, text: &str) {
        match text.parse::<ClientFrame>() {
            Ok(frame) => self.dispatch(frame),
            Err(e) => {
                debug!(identity = %self.client.identity, "rejected frame: {e}");
                self.reply(&ServerFrame::from(&e));
            }
        }
    }

    pub fn dispatch(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::Subscribe { channel } => {
                match self.broker.subscribe(&channel, &self.client) {
                    Ok(history) => {
                        info!(identity = %self.client.identity, channel = %channel, replayed = history.len(), "subscribed");
                        self.subscriptions.insert(channel);
                    }
                    Err(e) => self.reject(&e),
                }
            }
            ClientFrame::Publish { channel, content } => {
                match self.broker.publish(&channel, &self.client.identity, &content) {
                    Ok(delivery) => {
                        debug!(
                            identity = %self.client.identity,
                            channel = %channel,
                            delivered = delivery.delivered,
                            evicted = delivery.evicted,
                            "published"
                        );
                    }
                    Err(e) => self.reject(&e),
                }
            }
            ClientFrame::Unsubscribe { channel } => {
                self.broker.unsubscribe(&channel, &self.client.identity);
                self.subscriptions.remove(&channel);
                info!(identity = %self.client.identity, channel = %channel, "unsubscribed");
                self.reply(&ServerFrame::UnsubAck { channel });
            }
        }
    }

    fn reject(&self, err: &BrokerError) {
        info!(identity = %self.client.identity, "command rejected: {err}");
        self.reply(&ServerFrame::from(err));
    }

    fn reply(&self, frame: &ServerFrame) {
        // the writer is gone; the reader will notice and end the session
        if let Err(e) = self.client.send(frame) {
            debug!(identity = %self.client.identity, "reply dropped: {e}");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let removed = self.broker.deregister(self.connection_id());
        let subscribed: Vec<&str> = self.subscriptions().collect();
        info!(
            identity = %self.client.identity,
            connection = %self.connection_id(),
            channels = removed,
            ?subscribed,
            "client disconnected"
        );
    }
}
