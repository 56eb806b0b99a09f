use std::fs;
use std::path::{Path, PathBuf};

use crate::{BasketConfig, ConfigError, DEFAULT_CONFIG_PATH};

#[derive(Clone, Debug)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let config_path = if path.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        } else {
            path.to_path_buf()
        };
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Missing file is not an error: defaults are returned with `false`.
    pub fn load_or_default(&self) -> Result<(BasketConfig, bool), ConfigError> {
        match fs::read_to_string(&self.config_path) {
            Ok(raw) => {
                let mut cfg: BasketConfig = toml::from_str(&raw).map_err(ConfigError::Parse)?;
                cfg.normalize();
                cfg.validate()?;
                Ok((cfg, true))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let mut cfg = BasketConfig::default();
                cfg.normalize();
                cfg.validate()?;
                Ok((cfg, false))
            }
            Err(err) => Err(ConfigError::Read(err)),
        }
    }

    pub fn load(&self) -> Result<BasketConfig, ConfigError> {
        let (cfg, exists) = self.load_or_default()?;
        if exists {
            Ok(cfg)
        } else {
            Err(ConfigError::Validation(
                "config file does not exist".to_string(),
            ))
        }
    }

    pub fn save(&self, cfg: &BasketConfig) -> Result<(), ConfigError> {
        let mut normalized = cfg.clone();
        normalized.normalize();
        normalized.validate()?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Mkdir)?;
        }

        let out = toml::to_string_pretty(&normalized).map_err(ConfigError::Serialize)?;
        fs::write(&self.config_path, out).map_err(ConfigError::Write)
    }
}

pub fn load_or_default(path: impl AsRef<Path>) -> Result<(BasketConfig, bool), ConfigError> {
    ConfigStore::new(path).load_or_default()
}

pub fn load(path: impl AsRef<Path>) -> Result<BasketConfig, ConfigError> {
    ConfigStore::new(path).load()
}
