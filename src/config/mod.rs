mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use crate::broker::HistoryPolicy;
use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `CHANBROKER__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "CHANBROKER";

const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from `config/default.*` (if present) and the
/// environment, merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Same as [`load_config`] but reads the optional file at `path`. The
/// extension may be omitted; the `config` crate probes the known formats.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        HistoryPolicy::from_limits(self.broker.history_limit, self.broker.history_ttl_secs)
    }
}
