//! Handles settings for the application. Configuration is written in
//! `settings.toml` and every key can be overridden with an `ALLOTMENT_`
//! environment variable (`ALLOTMENT_APP__LEVEL=debug`).
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Allocation {
    #[serde(default = "engine::default_epsilon")]
    pub epsilon: Decimal,
    /// Used when a group request carries no bias factor.
    pub default_bias_factor: Option<Decimal>,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            epsilon: engine::default_epsilon(),
            default_bias_factor: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    #[serde(default)]
    pub allocation: Allocation,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", default_level())?
            .set_default("database", "memory")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("ALLOTMENT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

fn default_level() -> String {
    String::from("info")
}
