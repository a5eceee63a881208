//! Configuration management for the SPPG procurement back-office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SPPG_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, staging, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Notification gateway configuration
    pub notification: NotificationConfig,

    /// Procurement rules
    pub procurement: ProcurementConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key shared with the identity service that signs tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Queue notifications at all
    pub enabled: bool,

    /// WhatsApp/email gateway that receives queued notifications
    pub gateway_url: Option<String>,

    /// HMAC key used to sign gateway payloads
    pub gateway_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcurementConfig {
    /// Tax applied to order subtotals, in percent
    pub tax_rate_percent: Decimal,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SPPG_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("notification.enabled", true)?
            .set_default("procurement.tax_rate_percent", "11")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SPPG_ prefix)
            .add_source(
                Environment::with_prefix("SPPG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
