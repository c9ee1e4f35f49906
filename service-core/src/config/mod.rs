use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings shared by every service in the workspace. Service-specific
/// configuration layers on top of this via `#[serde(flatten)]`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Load from an optional `configuration` file, overridden by
    /// `APP__`-prefixed environment variables. A `.env` file is read
    /// first so local development does not need exported vars.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let sources = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(sources.try_deserialize()?)
    }
}
