//! CLI for chanbroker
//!
//! Subcommands:
//! - `server`: run the WebSocket broker
//! - `client`: run a small demo client (useful for smoke tests)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chanbroker::broker::Broker;
use chanbroker::config::{Settings, load_config, load_config_from};
use chanbroker::transport::{ClientFrame, ServerFrame, start_websocket_server};
use chanbroker::utils::{ServerError, logging};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "chanbroker", version, about = "Minimal WebSocket pub/sub broker")]
struct Cli {
    /// Configuration file (extension optional). Defaults to `config/default`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WebSocket broker
    Server,
    /// Run the demo client (connect, subscribe, optionally publish, print messages)
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8765")]
        url: String,
        /// Channel to subscribe to
        #[arg(long, default_value = "reports")]
        channel: String,
        /// Message to publish once subscribed
        #[arg(long)]
        publish: Option<String>,
        /// How long to keep printing incoming messages
        #[arg(long, default_value_t = 5)]
        listen_secs: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&settings.log.level));

    let result = match cli.command {
        Command::Server => run_server(settings)
            .await
            .inspect_err(|e| error!("Server failed: {e}")),
        Command::Client {
            url,
            channel,
            publish,
            listen_secs,
        } => run_client(&url, &channel, publish, Duration::from_secs(listen_secs))
            .await
            .inspect_err(|e| error!("Client failed: {e}")),
    };

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_server(settings: Settings) -> Result<(), ServerError> {
    let broker = Arc::new(Broker::new(settings.history_policy()));
    info!(
        history_limit = settings.broker.history_limit,
        history_ttl_secs = settings.broker.history_ttl_secs,
        max_connections = settings.broker.max_connections,
        "starting broker"
    );

    tokio::select! {
        res = start_websocket_server(settings, broker) => {
            if res.is_ok() {
                error!("WebSocket server exited unexpectedly.");
            }
            res
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    }
}

async fn run_client(
    url: &str,
    channel: &str,
    publish: Option<String>,
    listen_for: Duration,
) -> Result<(), ServerError> {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    // 1. Identity is always the first frame
    let identity = match ws_stream.next().await {
        Some(Ok(WsMessage::Text(text))) => match text.parse::<ServerFrame>() {
            Ok(ServerFrame::Identity(id)) => id,
            _ => return Err(ServerError::UnexpectedFrame(text.as_str().to_string())),
        },
        Some(Err(e)) => return Err(e.into()),
        _ => return Err(ServerError::UnexpectedFrame("connection closed".to_string())),
    };
    println!("Connected as {identity}");

    // 2. Subscribe
    let subscribe = ClientFrame::Subscribe {
        channel: channel.to_string(),
    };
    ws_stream.send(WsMessage::text(subscribe.to_string())).await?;

    // 3. Publish
    if let Some(content) = publish {
        let publish = ClientFrame::Publish {
            channel: channel.to_string(),
            content,
        };
        ws_stream.send(WsMessage::text(publish.to_string())).await?;
    }

    // 4. Print whatever arrives until the window closes
    let listen = async {
        while let Some(Ok(msg)) = ws_stream.next().await {
            let WsMessage::Text(text) = msg else { continue };
            match text.parse::<ServerFrame>() {
                Ok(ServerFrame::Msg {
                    channel,
                    sender,
                    content,
                }) => println!("[{channel}] {sender}: {content}"),
                Ok(ServerFrame::Error { code, message }) => {
                    warn!("server rejected command ({code}): {message}")
                }
                Ok(other) => println!("{other}"),
                Err(_) => println!("{}", text.as_str()),
            }
        }
    };
    let _ = tokio::time::timeout(listen_for, listen).await;

    ws_stream.close(None).await?;
    Ok(())
}
