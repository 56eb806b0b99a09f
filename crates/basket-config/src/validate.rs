use std::time::Duration;

use crate::{BasketConfig, BridgeSection, BrokerSection, ConfigError, ServerSection, TopicsSection};

impl BasketConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.addr.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.addr must not be empty".to_string(),
            ));
        }
        if self.server.buf == 0 {
            return Err(ConfigError::Validation(
                "server.buf must be > 0".to_string(),
            ));
        }
        self.server.idle_timeout_duration()?;

        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "broker.host must not be empty".to_string(),
            ));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Validation(
                "broker.port must be > 0".to_string(),
            ));
        }
        if self.broker.request_buf == 0 {
            return Err(ConfigError::Validation(
                "broker.request_buf must be > 0".to_string(),
            ));
        }
        self.broker.keep_alive_duration()?;
        self.broker.connect_timeout_duration()?;

        if self.topics.base.is_empty() {
            return Err(ConfigError::Validation(
                "topics.base must not be empty".to_string(),
            ));
        }
        if self.topics.basket.is_empty() {
            return Err(ConfigError::Validation(
                "topics.basket must not be empty".to_string(),
            ));
        }
        if self.topics.basket.contains('/') {
            return Err(ConfigError::Validation(
                "topics.basket must be a single topic segment".to_string(),
            ));
        }
        if self.bridge.city.trim().is_empty()
            || self.bridge.manufacturer.trim().is_empty()
            || self.bridge.software_version.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "bridge.city, bridge.manufacturer and bridge.software_version must not be empty"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn normalize(&mut self) {
        if self.server.addr.trim().is_empty() {
            self.server.addr = ServerSection::default().addr;
        }
        if self.broker.host.trim().is_empty() {
            self.broker.host = BrokerSection::default().host;
        }
        if self.broker.keep_alive.trim().is_empty() {
            self.broker.keep_alive = BrokerSection::default().keep_alive;
        }
        if self.broker.connect_timeout.trim().is_empty() {
            self.broker.connect_timeout = BrokerSection::default().connect_timeout;
        }
        if self.bridge.city.trim().is_empty() {
            self.bridge.city = BridgeSection::default().city;
        }
        if self.bridge.manufacturer.trim().is_empty() {
            self.bridge.manufacturer = BridgeSection::default().manufacturer;
        }
        if self.bridge.software_version.trim().is_empty() {
            self.bridge.software_version = BridgeSection::default().software_version;
        }

        let defaults = TopicsSection::default();
        self.topics.base = normalize_topic(&self.topics.base, &defaults.base);
        self.topics.basket = normalize_topic(&self.topics.basket, &defaults.basket);
    }
}

fn normalize_topic(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

impl ServerSection {
    /// Empty string = disabled.
    pub fn idle_timeout_duration(&self) -> Result<Option<Duration>, ConfigError> {
        if self.idle_timeout.trim().is_empty() {
            return Ok(None);
        }
        parse_duration_value("server.idle_timeout", &self.idle_timeout).map(Some)
    }
}

impl BrokerSection {
    pub fn keep_alive_duration(&self) -> Result<Duration, ConfigError> {
        parse_duration_value("broker.keep_alive", &self.keep_alive)
    }

    pub fn connect_timeout_duration(&self) -> Result<Duration, ConfigError> {
        parse_duration_value("broker.connect_timeout", &self.connect_timeout)
    }
}

fn parse_duration_value(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigError::Validation(format!("{field} must be a valid duration string ({err})"))
    })
}
