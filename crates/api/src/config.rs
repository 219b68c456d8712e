use serde::Deserialize;
use std::collections::HashMap;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use persistence::db::PoolSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub aws: AwsConfig,
    pub marketplace: MarketplaceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Only enable behind a TLS-terminating load balancer.
    #[serde(default)]
    pub hsts_enabled: bool,
}

/// AWS SDK settings shared by the metering and entitlement clients.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_aws_region")]
    pub region: String,

    /// Overrides the service endpoint, e.g. for a local AWS emulator.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    /// Public path prefix of the marketplace routes, used to build redirects.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Page size for GetEntitlements.
    #[serde(default = "default_max_results")]
    pub max_results: i32,

    /// Display names keyed by product code.
    #[serde(default)]
    pub product_names: HashMap<String, String>,
}

impl MarketplaceConfig {
    /// Location of the onboarding form for a customer.
    pub fn onboarding_path(&self, customer_identifier: &str) -> String {
        format!(
            "{}/onboarding/{}",
            self.base_path.trim_end_matches('/'),
            customer_identifier
        )
    }

    pub fn product_name(&self, product_code: &str) -> Option<&str> {
        self.product_names.get(product_code).map(String::as_str)
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_aws_region() -> String {
    "us-east-1".to_string()
}
fn default_base_path() -> String {
    "/aws-marketplace".to_string()
}
fn default_max_results() -> i32 {
    25
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with MB__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("MB").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration with embedded defaults and the given overrides.
    ///
    /// Does not touch the file system and skips validation, so tests can
    /// build partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            hsts_enabled = false

            [aws]
            region = "us-east-1"

            [marketplace]
            base_path = "/aws-marketplace"
            max_results = 25
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "MB__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.aws.region.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "aws.region must be set".to_string(),
            ));
        }

        if !self.marketplace.base_path.starts_with('/') {
            return Err(ConfigValidationError::InvalidValue(
                "marketplace.base_path must start with '/'".to_string(),
            ));
        }

        if !(1..=25).contains(&self.marketplace.max_results) {
            return Err(ConfigValidationError::InvalidValue(
                "marketplace.max_results must be between 1 and 25".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
