use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::config::{RiskConfig, StoreConfig};

/// Top-level configuration file layout.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub risk: RiskConfig,
    pub store: StoreConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging TOML and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or
    /// if the risk section fails startup validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration from a specific TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or
    /// if the risk section fails startup validation.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()?;

        config.risk.validate()?;
        Ok(config)
    }
}
