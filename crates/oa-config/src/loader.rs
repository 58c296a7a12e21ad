//! Configuration loader with file and environment variable support

use crate::{AuthServiceConfig, ConfigError, GatewayConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const AUTH_CONFIG_PATHS: &[&str] = &[
    "auth-service.toml",
    "./config/auth-service.toml",
    "/etc/optimize-api/auth-service.toml",
];

const GATEWAY_CONFIG_PATHS: &[&str] = &[
    "api-gateway.toml",
    "./config/api-gateway.toml",
    "/etc/optimize-api/api-gateway.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load the auth service configuration: defaults, then file, then
    /// process environment, then validation.
    pub fn load_auth_service(&self) -> Result<AuthServiceConfig, ConfigError> {
        self.load_auth_service_with(|name| env::var(name).ok())
    }

    /// As [`load_auth_service`](Self::load_auth_service) with an explicit
    /// variable lookup.
    pub fn load_auth_service_with<F>(&self, lookup: F) -> Result<AuthServiceConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file("OA_AUTH_CONFIG", AUTH_CONFIG_PATHS) {
            Some(path) => {
                info!(?path, "Loading auth service configuration from file");
                AuthServiceConfig::from_file(&path)?
            }
            None => AuthServiceConfig::default(),
        };

        apply_auth_overrides(&mut config, &lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_gateway(&self) -> Result<GatewayConfig, ConfigError> {
        self.load_gateway_with(|name| env::var(name).ok())
    }

    pub fn load_gateway_with<F>(&self, lookup: F) -> Result<GatewayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file("OA_GATEWAY_CONFIG", GATEWAY_CONFIG_PATHS) {
            Some(path) => {
                info!(?path, "Loading gateway configuration from file");
                GatewayConfig::from_file(&path)?
            }
            None => GatewayConfig::default(),
        };

        apply_gateway_overrides(&mut config, &lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self, env_var: &str, search_paths: &[&str]) -> Option<PathBuf> {
        // Explicit path wins
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(env_var) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        search_paths
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_auth_overrides<F>(config: &mut AuthServiceConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ENVIRONMENT") {
        config.environment = val;
    }

    // Service identity
    if let Some(val) = lookup("SERVICE_NAME") {
        config.service.name = val;
    }
    if let Some(val) = lookup("SERVICE_ADDRESS") {
        config.service.address = val;
    }
    if let Some(val) = lookup("SERVICE_INSTANCE_ID") {
        config.service.instance_id = val;
    }

    // Tokens
    if let Some(val) = lookup("ACCESS_TOKEN_SECRET") {
        config.token.access_token_secret = val;
    }
    if let Some(val) = lookup("REFRESH_TOKEN_SECRET") {
        config.token.refresh_token_secret = val;
    }
    if let Some(val) = lookup("ACCESS_TOKEN_EXPIRES_IN") {
        config.token.access_token_expiry_secs =
            duration_var("ACCESS_TOKEN_EXPIRES_IN", &val)?.as_secs();
    }
    if let Some(val) = lookup("REFRESH_TOKEN_EXPIRES_IN") {
        config.token.refresh_token_expiry_secs =
            duration_var("REFRESH_TOKEN_EXPIRES_IN", &val)?.as_secs();
    }
    if let Some(val) = lookup("TOKEN_ISSUER") {
        config.token.issuer = val;
    }

    // MongoDB
    if let Some(val) = lookup("MONGO_URI") {
        config.mongodb.uri = val;
    }
    if let Some(val) = lookup("MONGO_DB") {
        config.mongodb.database = val;
    }

    // Consul
    if let Some(val) = lookup("CONSUL_ADDRESS") {
        config.consul.address = val;
    }

    if let Some(val) = lookup("LAST_LOGIN_BEST_EFFORT") {
        config.auth.last_login_best_effort = bool_var("LAST_LOGIN_BEST_EFFORT", &val)?;
    }

    Ok(())
}

fn apply_gateway_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ENVIRONMENT") {
        config.environment = val;
    }
    if let Some(val) = lookup("API_GATEWAY_ADDRESS") {
        config.address = val;
    }
    if let Some(val) = lookup("AUTH_SERVICE_NAME") {
        config.auth_service_name = val;
    }
    if let Some(val) = lookup("CONSUL_ADDRESS") {
        config.consul.address = val;
    }
    if let Some(val) = lookup("REQUEST_TIMEOUT") {
        let millis = duration_var("REQUEST_TIMEOUT", &val)?.as_millis();
        config.request_timeout_ms = u64::try_from(millis).map_err(|_| ConfigError::EnvError {
            name: "REQUEST_TIMEOUT".to_string(),
            message: format!("duration '{}' is out of range", val),
        })?;
    }
    Ok(())
}

/// Parse `900`, `500ms`, `30s`, `15m`, `1h` or `7d`. A bare number is seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount.checked_mul(60)?),
        "h" => Duration::from_secs(amount.checked_mul(3600)?),
        "d" => Duration::from_secs(amount.checked_mul(86_400)?),
        _ => return None,
    };
    Some(duration)
}

fn duration_var(name: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::EnvError {
        name: name.to_string(),
        message: format!("invalid duration '{}'", value),
    })
}

fn bool_var(name: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvError {
        name: name.to_string(),
        message: format!("expected true or false, got '{}'", value),
    })
}
