use orbitwatch_core::{env_override, load_toml, ConfigError, LogFormat};
use orbitwatch_live_feed::FeedConfig;
use orbitwatch_proximity::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// HTTP and WebSocket listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub feed_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 4000,
            feed_port: 4001,
        }
    }
}

impl ServerConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn feed_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.feed_port)
    }
}

/// Storage backend and startup data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; in-memory store when unset
    pub database_path: Option<PathBuf>,
    /// Legacy satellite JSON loaded at startup
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub scanner: ScannerConfig,
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// File (if any), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => load_toml(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_override::<u16>("PORT")? {
            self.server.port = port;
        }
        if let Some(port) = env_override::<u16>("FEED_PORT")? {
            self.server.feed_port = port;
        }
        if let Some(secs) = env_override::<u64>("SCAN_INTERVAL_SECS")? {
            self.scanner.interval_secs = secs;
        }
        if let Some(path) = env_override::<PathBuf>("DATABASE_PATH")? {
            self.store.database_path = Some(path);
        }
        if let Some(path) = env_override::<PathBuf>("SEED_PATH")? {
            self.store.seed_path = Some(path);
        }
        if let Some(format) = env_override::<LogFormat>("LOG_FORMAT")? {
            self.logging.format = format;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == self.server.feed_port && self.server.port != 0 {
            return Err(ConfigError::Validation(format!(
                "HTTP and feed ports must differ (both {})",
                self.server.port
            )));
        }
        self.scanner
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.feed
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitwatch_domain::AlertLevel;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.scanner.interval_secs, 30);
        assert_eq!(config.feed.tick_ms, 1000);
        assert!(config.store.database_path.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scanner]
            interval_secs = 10

            [scanner.policy]
            open_level = "info"
            resolve_km = 12.0

            [store]
            database_path = "/var/lib/orbitwatch/alerts.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.scanner.interval_secs, 10);
        assert_eq!(config.scanner.policy.open_level, AlertLevel::Info);
        assert_eq!(config.feed.jitter_deg, 0.025);
        assert_eq!(config.server.feed_port, 4001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_without_gap_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [scanner.policy]
            open_level = "info"
            resolve_km = 8.0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_same_ports_are_rejected() {
        let mut config = Config::default();
        config.server.feed_port = config.server.port;
        assert!(config.validate().is_err());
    }
}
