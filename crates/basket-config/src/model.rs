use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "basket.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to create config directory: {0}")]
    Mkdir(std::io::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BasketConfig {
    pub bridge: BridgeSection,
    pub server: ServerSection,
    pub broker: BrokerSection,
    pub topics: TopicsSection,
    pub outputs: OutputsSection,
}

/// Identity fields for the retained device-info announcement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSection {
    /// Stable bridge id; empty = a fresh UUID per run.
    pub id: String,
    pub city: String,
    pub manufacturer: String,
    pub software_version: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            city: "unknown".to_string(),
            manufacturer: "basket-devices".to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub addr: String,
    pub buf: usize,
    /// Humantime string; empty = no idle timeout.
    pub idle_timeout: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:2323".to_string(),
            buf: 256,
            idle_timeout: String::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerSection {
    pub host: String,
    pub port: u16,
    /// Empty = reuse the bridge id.
    pub client_id: String,
    pub keep_alive: String,
    pub connect_timeout: String,
    pub request_buf: usize,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: String::new(),
            keep_alive: "30s".to_string(),
            connect_timeout: "10s".to_string(),
            request_buf: 64,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TopicsSection {
    pub base: String,
    pub basket: String,
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self {
            base: "court".to_string(),
            basket: "basket".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OutputsSection {
    pub jsonl: JsonlSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JsonlSection {
    pub enabled: bool,
    /// Empty = stdout.
    pub path: String,
}

impl Default for JsonlSection {
    fn default() -> Self {
        Self {
            enabled: false,
            path: String::new(),
        }
    }
}
