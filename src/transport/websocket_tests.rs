use crate::broker::Broker;
use crate::client::{Client, Identity};
use crate::config::Settings;
use crate::transport::message::ServerFrame;
use crate::transport::websocket::serve;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn setup_server(settings: Settings) -> (String, Arc<Broker>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let broker = Arc::new(Broker::new(settings.history_policy()));

    tokio::spawn(serve(listener, broker.clone(), settings));

    (format!("ws://{addr}"), broker)
}

async fn recv_text(ws: &mut Ws) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("Read failed");
        if let WsMessage::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(WsMessage::text(text.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Connects and returns the stream along with the assigned identity.
async fn connect_client(url: &str) -> (Ws, String) {
    let (mut ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
    let first = recv_text(&mut ws).await;
    match first.parse::<ServerFrame>() {
        Ok(ServerFrame::Identity(id)) => (ws, id.to_string()),
        other => panic!("Expected IDENTITY frame, got {other:?}"),
    }
}

async fn subscribe(ws: &mut Ws, channel: &str) {
    send_text(ws, &format!("SUBSCRIBE:{channel}")).await;
    assert_eq!(recv_text(ws).await, format!("SUB-ACK:{channel}"));
}

#[tokio::test]
async fn test_each_connection_gets_a_distinct_identity() {
    let (url, _broker) = setup_server(Settings::default()).await;
    let (_a, id_a) = connect_client(&url).await;
    let (_b, id_b) = connect_client(&url).await;

    assert!(!id_a.is_empty());
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn test_publish_reaches_subscribers_and_replays_to_late_joiner() {
    let (url, _broker) = setup_server(Settings::default()).await;
    let (mut a, id_a) = connect_client(&url).await;
    let (mut b, id_b) = connect_client(&url).await;

    subscribe(&mut a, "reports").await;
    subscribe(&mut b, "reports").await;

    send_text(&mut a, "PUBLISH:reports:hello").await;
    let hello = format!("MSG:reports:{id_a}:hello");
    assert_eq!(recv_text(&mut a).await, hello);
    assert_eq!(recv_text(&mut b).await, hello);

    // history replay comes right after SUB-ACK, before any live traffic
    let (mut c, _) = connect_client(&url).await;
    subscribe(&mut c, "reports").await;
    assert_eq!(recv_text(&mut c).await, hello);

    send_text(&mut b, "PUBLISH:reports:live: with colons").await;
    let live = format!("MSG:reports:{id_b}:live: with colons");
    assert_eq!(recv_text(&mut a).await, live);
    assert_eq!(recv_text(&mut b).await, live);
    assert_eq!(recv_text(&mut c).await, live);
}

#[tokio::test]
async fn test_invalid_channel_is_rejected_and_connection_stays_open() {
    let (url, broker) = setup_server(Settings::default()).await;
    let (mut ws, _) = connect_client(&url).await;

    send_text(&mut ws, "SUBSCRIBE:sales-report").await;
    let reply = recv_text(&mut ws).await;
    assert!(reply.starts_with("ERROR:400:"), "got {reply}");
    assert_eq!(broker.channel_count(), 0);

    subscribe(&mut ws, "sales").await;
}

#[tokio::test]
async fn test_publish_without_subscription_is_rejected() {
    let (url, broker) = setup_server(Settings::default()).await;
    let (mut ws, _) = connect_client(&url).await;

    send_text(&mut ws, "PUBLISH:reports:hello").await;
    let reply = recv_text(&mut ws).await;
    assert!(reply.starts_with("ERROR:401:"), "got {reply}");
    assert!(broker.history("reports").is_empty());
}

#[tokio::test]
async fn test_unsubscribe_is_always_acknowledged() {
    let (url, _broker) = setup_server(Settings::default()).await;
    let (mut ws, _) = connect_client(&url).await;

    send_text(&mut ws, "UNSUBSCRIBE:ghosts").await;
    assert_eq!(recv_text(&mut ws).await, "UNSUB-ACK:ghosts");

    subscribe(&mut ws, "reports").await;
    send_text(&mut ws, "UNSUBSCRIBE:reports").await;
    assert_eq!(recv_text(&mut ws).await, "UNSUB-ACK:reports");
}

#[tokio::test]
async fn test_unknown_command_is_reported() {
    let (url, _broker) = setup_server(Settings::default()).await;
    let (mut ws, _) = connect_client(&url).await;

    send_text(&mut ws, "HELLO").await;
    let reply = recv_text(&mut ws).await;
    assert!(reply.starts_with("ERROR:400:"), "got {reply}");
}

#[tokio::test]
async fn test_disconnect_removes_client_from_channels() {
    let (url, broker) = setup_server(Settings::default()).await;
    let (mut publisher, id) = connect_client(&url).await;
    let (mut leaver, _) = connect_client(&url).await;
    subscribe(&mut publisher, "reports").await;

    send_text(&mut publisher, "PUBLISH:reports:one").await;
    send_text(&mut publisher, "PUBLISH:reports:two").await;
    recv_text(&mut publisher).await;
    recv_text(&mut publisher).await;

    subscribe(&mut leaver, "reports").await;
    assert_eq!(recv_text(&mut leaver).await, format!("MSG:reports:{id}:one"));
    assert_eq!(recv_text(&mut leaver).await, format!("MSG:reports:{id}:two"));
    assert_eq!(broker.subscriber_count("reports"), 2);

    leaver.close(None).await.expect("Failed to close WebSocket");

    let mut remaining = broker.subscriber_count("reports");
    for _ in 0..100 {
        if remaining == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = broker.subscriber_count("reports");
    }
    assert_eq!(remaining, 1);

    send_text(&mut publisher, "PUBLISH:reports:three").await;
    assert_eq!(recv_text(&mut publisher).await, format!("MSG:reports:{id}:three"));
    assert_eq!(broker.subscriber_count("reports"), 1);
    assert_eq!(broker.history("reports").len(), 3);
}

#[tokio::test]
async fn test_connections_beyond_limit_are_refused() {
    let mut settings = Settings::default();
    settings.broker.max_connections = 1;
    let (url, _broker) = setup_server(settings).await;

    let (_first, _) = connect_client(&url).await;
    let second = tokio::time::timeout(Duration::from_secs(2), connect_async(url.as_str()))
        .await
        .expect("Refusal should be immediate");
    assert!(second.is_err());
}

#[tokio::test]
async fn test_idle_socket_releases_slot_after_handshake_timeout() {
    let mut settings = Settings::default();
    settings.broker.max_connections = 1;
    settings.server.handshake_timeout_ms = 200;
    let (url, _broker) = setup_server(settings).await;

    // a raw TCP connection that never sends the upgrade request
    let addr = url.trim_start_matches("ws://");
    let _idle = TcpStream::connect(addr).await.expect("Failed to connect");

    tokio::time::sleep(Duration::from_millis(500)).await;
    let (_ws, id) = connect_client(&url).await;
    assert!(!id.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_reader_is_dropped_after_write_timeout() {
    let mut settings = Settings::default();
    settings.server.write_timeout_ms = 100;
    settings.broker.history_limit = 1;
    let (url, broker) = setup_server(settings).await;

    let (mut stalled, _) = connect_client(&url).await;
    subscribe(&mut stalled, "reports").await;

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let publisher = Client::new(Identity::from("publisher"), tx);
    broker
        .subscribe("reports", &publisher)
        .expect("Failed to subscribe publisher");
    assert_eq!(broker.subscriber_count("reports"), 2);

    // `stalled` never reads again, so large frames back up its socket
    let payload = "x".repeat(64 * 1024);
    let mut dropped = false;
    for _ in 0..2000 {
        broker
            .publish("reports", &publisher.identity, &payload)
            .expect("Publisher should stay subscribed");
        while rx.try_recv().is_ok() {}
        if broker.subscriber_count("reports") == 1 {
            dropped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(dropped, "stalled connection was never dropped");

    let delivery = broker
        .publish("reports", &publisher.identity, "still flowing")
        .expect("Publisher should stay subscribed");
    assert_eq!(delivery.delivered, 1);
    assert_eq!(delivery.evicted, 0);
}
