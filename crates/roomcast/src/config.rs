//! Server configuration and its environment-variable source.

use roomcast_liveness::LivenessConfig;

use crate::RelayError;

/// Environment variable holding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable holding the listen host.
pub const ENV_HOST: &str = "ROOMCAST_HOST";
/// Environment variable holding the liveness interval in seconds
/// (`0` disables liveness sweeps).
pub const ENV_PING_INTERVAL: &str = "ROOMCAST_PING_INTERVAL_SECS";

/// Everything needed to start a relay server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind, e.g. `0.0.0.0`.
    pub host: String,
    /// TCP port to bind. `0` lets the OS pick one.
    pub port: u16,
    /// Liveness sweep settings.
    pub liveness: LivenessConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            liveness: LivenessConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The `host:port` string handed to the transport.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a key lookup, starting from the defaults.
    ///
    /// Unset or empty variables keep their default; unparseable values are
    /// an error rather than silently ignored.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RelayError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get(ENV_HOST) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = get(ENV_PORT) {
            config.port = port.trim().parse().map_err(|_| {
                RelayError::Config(format!("{ENV_PORT}={port:?} is not a port number"))
            })?;
        }
        if let Some(secs) = get(ENV_PING_INTERVAL) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                RelayError::Config(format!(
                    "{ENV_PING_INTERVAL}={secs:?} is not a whole number of seconds"
                ))
            })?;
            config.liveness = LivenessConfig::from_secs(secs);
        }

        Ok(config)
    }
}
