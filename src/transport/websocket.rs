//! WebSocket transport
//!
//! This file implements the WebSocket server that connects clients to the
//! broker. Responsibilities:
//! - Accept TCP/WebSocket connections, refusing any beyond
//!   `broker.max_connections` and dropping any that do not finish the
//!   handshake within `server.handshake_timeout_ms`
//! - Assign each connection an identity and announce it with `IDENTITY`
//! - Run one reader loop per connection feeding a `Session`, and one writer
//!   task draining the connection's outbound queue into the socket
//! - Deregister the connection once either side ends

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::client::{Client, Identity, IdentityAssigner};
use crate::config::Settings;
use crate::transport::session::Session;
use crate::utils::ServerError;

/// Bind `server.host:server.port` and serve until the listener fails.
pub async fn start_websocket_server(
    settings: Settings,
    broker: Arc<Broker>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(settings.bind_addr()).await?;
    serve(listener, broker, settings).await
}

/// Serve WebSocket clients on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: Settings,
) -> Result<(), ServerError> {
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);

    let active = Arc::new(AtomicUsize::new(0));
    let max_connections = settings.broker.max_connections;
    let timeouts = Timeouts {
        handshake: Duration::from_millis(settings.server.handshake_timeout_ms),
        write: Duration::from_millis(settings.server.write_timeout_ms),
    };
    let assigner = IdentityAssigner;

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let Some(slot) = ConnectionSlot::acquire(&active, max_connections) else {
            warn!(%peer, max_connections, "connection limit reached, refusing");
            continue;
        };

        let broker = broker.clone();
        let identity = assigner.assign();

        tokio::spawn(async move {
            let _slot = slot;
            if let Err(e) = handle_connection(stream, peer, broker, identity, timeouts).await {
                warn!(%peer, "connection failed: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    identity: Identity,
    timeouts: Timeouts,
) -> Result<(), ServerError> {
    // a connection slot is held from here on, including during the handshake
    let ws_stream = timeout(timeouts.handshake, accept_async(stream))
        .await
        .map_err(|_| ServerError::HandshakeTimeout(timeouts.handshake))??;
    debug!(%peer, %identity, "handshake complete");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let write_timeout = timeouts.write;
    let mut session = Session::new(broker, Client::new(identity.clone(), tx));
    session.start();

    // Forward queued frames broker → client. Ends when every sender is
    // dropped or a write fails or stalls past `write_timeout`.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match timeout(write_timeout, ws_sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(%identity, "failed to send: {e}");
                    return;
                }
                Err(_) => {
                    warn!(%identity, "write timed out after {write_timeout:?}");
                    return;
                }
            }
        }
        let _ = timeout(write_timeout, ws_sender.close()).await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => session.handle_text(text.as_str()),
                Some(Ok(WsMessage::Binary(_))) => {
                    debug!(identity = %session.identity(), "binary frame ignored");
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(identity = %session.identity(), "read failed: {e}");
                    break;
                }
            },
            _ = &mut writer, if !writer_done => {
                writer_done = true;
                break;
            }
        }
    }

    // Deregisters the connection and drops the last live sender, which lets
    // the writer flush and close the socket.
    drop(session);

    if !writer_done && timeout(write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    handshake: Duration,
    write: Duration,
}

/// Counts a live connection against `max_connections` until dropped.
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()?;
        Some(Self {
            active: active.clone(),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
