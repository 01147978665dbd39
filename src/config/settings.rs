use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server, the channel registry and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the address the WebSocket listener binds to, how long a new
/// connection may take to complete the WebSocket handshake and how long a
/// single outbound write may take before the connection is dropped.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub handshake_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

/// Configuration settings for the broker.
///
/// `history_limit` caps the entries kept per channel and `history_ttl_secs`
/// expires old entries; `0` disables either limit.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub history_limit: usize,
    pub history_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub handshake_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub history_limit: Option<usize>,
    pub history_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8765,
                handshake_timeout_ms: 5000,
                write_timeout_ms: 5000,
            },
            broker: BrokerSettings {
                max_connections: 1000,
                history_limit: 1000,
                history_ttl_secs: 0,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let broker = self.broker;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                handshake_timeout_ms: server
                    .as_ref()
                    .and_then(|s| s.handshake_timeout_ms)
                    .unwrap_or(default.server.handshake_timeout_ms),
                write_timeout_ms: server
                    .as_ref()
                    .and_then(|s| s.write_timeout_ms)
                    .unwrap_or(default.server.write_timeout_ms),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                history_limit: broker
                    .as_ref()
                    .and_then(|b| b.history_limit)
                    .unwrap_or(default.broker.history_limit),
                history_ttl_secs: broker
                    .as_ref()
                    .and_then(|b| b.history_ttl_secs)
                    .unwrap_or(default.broker.history_ttl_secs),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
