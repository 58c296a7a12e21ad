//! Configuration for the auth service and the API gateway.
//!
//! Values come from a TOML file (optional) and are then overridden by
//! environment variables. See [`ConfigLoader`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::{parse_duration, ConfigLoader};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable {name}: {message}")]
    EnvError { name: String, message: String },
}

/// Longest accepted token lifetime. Keeps `exp` representable.
pub const MAX_TOKEN_EXPIRY_SECS: u64 = 365 * 24 * 3600;

/// Longest accepted edge request deadline (one hour).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 3_600_000;

/// Auth backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthServiceConfig {
    /// Deployment environment name (development, staging, production)
    pub environment: String,
    pub service: ServiceConfig,
    pub mongodb: MongoConfig,
    pub consul: ConsulConfig,
    pub health_check: HealthCheckConfig,
    pub token: TokenConfig,
    pub argon2: Argon2Settings,
    pub auth: AuthPolicyConfig,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service: ServiceConfig::default(),
            mongodb: MongoConfig::default(),
            consul: ConsulConfig::default(),
            health_check: HealthCheckConfig::default(),
            token: TokenConfig::default(),
            argon2: Argon2Settings::default(),
            auth: AuthPolicyConfig::default(),
        }
    }
}

/// Identity of this backend instance in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// `host:port` the RPC server binds to and advertises
    pub address: String,
    /// Registry instance id; defaults to `{name}-1`
    pub instance_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "auth-service".to_string(),
            address: "127.0.0.1:50051".to_string(),
            instance_id: String::new(),
        }
    }
}

impl ServiceConfig {
    pub fn instance_id(&self) -> String {
        if self.instance_id.is_empty() {
            format!("{}-1", self.name)
        } else {
            self.instance_id.clone()
        }
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub connect_timeout_secs: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "auth".to_string(),
            connect_timeout_secs: 20,
        }
    }
}

impl MongoConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Consul agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent address, with or without scheme (`localhost:8500`)
    pub address: String,
    pub request_timeout_ms: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8500".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl ConsulConfig {
    /// Agent base URL with a scheme and without a trailing slash.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Active health probe attached to the registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub deregister_after_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
            deregister_after_secs: 60,
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_secs: u64,
    pub refresh_token_expiry_secs: u64,
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_token_expiry_secs: 900,          // 15 minutes
            refresh_token_expiry_secs: 7 * 24 * 3600, // 7 days
            issuer: "optimize-api".to_string(),
        }
    }
}

impl TokenConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expiry_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiry_secs)
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Settings {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Orchestrator behaviour switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthPolicyConfig {
    /// Log and continue when the last-login timestamp cannot be recorded
    pub last_login_best_effort: bool,
}

/// Edge gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub environment: String,
    /// `host:port` the HTTP server binds to
    pub address: String,
    /// Logical name the auth backend registers under
    pub auth_service_name: String,
    pub consul: ConsulConfig,
    /// Deadline applied to every inbound request
    pub request_timeout_ms: u64,
    /// How often the discovery connection re-resolves its endpoints
    pub resolver_refresh_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            address: "0.0.0.0:8080".to_string(),
            auth_service_name: "auth-service".to_string(),
            consul: ConsulConfig::default(),
            request_timeout_ms: 10_000,
            resolver_refresh_secs: 5,
            max_body_bytes: 1_048_576,
        }
    }
}

impl GatewayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn resolver_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.resolver_refresh_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address("address", &self.address)?;
        if self.auth_service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth_service_name must not be empty".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be between 1 and 3600000".to_string(),
            ));
        }
        if self.resolver_refresh_secs == 0 {
            return Err(ConfigError::ValidationError(
                "resolver_refresh_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl AuthServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.service.name.is_empty() {
            return invalid("service.name must not be empty");
        }
        validate_address("service.address", &self.service.address)?;

        if self.mongodb.uri.is_empty() {
            return invalid("mongodb.uri must not be empty");
        }
        if self.mongodb.database.is_empty() {
            return invalid("mongodb.database must not be empty");
        }

        let token = &self.token;
        if token.access_token_secret.is_empty() || token.refresh_token_secret.is_empty() {
            return invalid("token secrets must not be empty");
        }
        if token.access_token_secret == token.refresh_token_secret {
            return invalid("access and refresh token secrets must differ");
        }
        if token.access_token_expiry_secs == 0 {
            return invalid("token.access_token_expiry_secs must be greater than zero");
        }
        if token.access_token_expiry_secs > token.refresh_token_expiry_secs {
            return invalid("access token expiry must not exceed refresh token expiry");
        }
        if token.refresh_token_expiry_secs > MAX_TOKEN_EXPIRY_SECS {
            return invalid("token expiry must not exceed 365 days");
        }
        if token.issuer.is_empty() {
            return invalid("token.issuer must not be empty");
        }

        let hc = &self.health_check;
        if hc.interval_secs == 0 || hc.timeout_secs == 0 {
            return invalid("health_check interval and timeout must be greater than zero");
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Auth service configuration
# Environment variables override these settings

environment = "development"

[service]
name = "auth-service"
address = "127.0.0.1:50051"
instance_id = ""  # defaults to "<name>-1"

[mongodb]
uri = "mongodb://localhost:27017"
database = "auth"
connect_timeout_secs = 20

[consul]
address = "http://127.0.0.1:8500"
request_timeout_ms = 5000

[health_check]
interval_secs = 30
timeout_secs = 5
deregister_after_secs = 60

[token]
access_token_secret = "change-me-access"
refresh_token_secret = "change-me-refresh"
access_token_expiry_secs = 900
refresh_token_expiry_secs = 604800
issuer = "optimize-api"

[argon2]
memory_cost_kib = 65536
time_cost = 3
parallelism = 4

[auth]
last_login_best_effort = false
"#
        .to_string()
    }
}

fn validate_address(field: &str, address: &str) -> Result<(), ConfigError> {
    let valid = match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be host:port, got '{}'",
            field, address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_auth_config() -> AuthServiceConfig {
        let mut config = AuthServiceConfig::default();
        config.token.access_token_secret = "access".to_string();
        config.token.refresh_token_secret = "refresh".to_string();
        config
    }

    #[test]
    fn test_example_toml_parses_and_validates() {
        let config: AuthServiceConfig = toml::from_str(&AuthServiceConfig::example_toml()).unwrap();
        assert_eq!(config.service.name, "auth-service");
        assert_eq!(config.health_check.deregister_after_secs, 60);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_instance_id() {
        let mut service = ServiceConfig::default();
        assert_eq!(service.instance_id(), "auth-service-1");
        service.instance_id = "auth-7".to_string();
        assert_eq!(service.instance_id(), "auth-7");
    }

    #[test]
    fn test_validate_rejects_missing_secrets() {
        let config = AuthServiceConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = valid_auth_config();
        config.token.refresh_token_secret = "access".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_access_outliving_refresh() {
        let mut config = valid_auth_config();
        config.token.access_token_expiry_secs = 3600;
        config.token.refresh_token_expiry_secs = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_expiry() {
        let mut config = valid_auth_config();
        config.token.refresh_token_expiry_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.token.refresh_token_expiry_secs = MAX_TOKEN_EXPIRY_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn test_gateway_rejects_unbounded_timeout() {
        let mut config = GatewayConfig::default();
        config.request_timeout_ms = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let mut config = valid_auth_config();
        config.service.address = "localhost".to_string();
        assert!(config.validate().is_err());
        config.service.address = "localhost:http".to_string();
        assert!(config.validate().is_err());
        config.service.address = "10.0.0.5:9000".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_consul_base_url() {
        let mut consul = ConsulConfig::default();
        consul.address = "localhost:8500".to_string();
        assert_eq!(consul.base_url(), "http://localhost:8500");
        consul.address = "https://consul.internal/".to_string();
        assert_eq!(consul.base_url(), "https://consul.internal");
    }

    #[test]
    fn test_gateway_defaults_validate() {
        let config = GatewayConfig::default();
        config.validate().unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }
}
