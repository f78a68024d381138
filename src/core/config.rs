//! # Configuration Module
//!
//! This module holds the engine configuration and its loading mechanisms.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable overrides (`CTRL_ROUTER_<SECTION>_<FIELD>`)
//! - Validation that reports every problem at once

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{RouterError, RouterResult};
use crate::middleware::cors::CorsConfig;
use crate::middleware::interceptor::InterceptorRule;
use crate::middleware::rate_limiting::IpLimitConfig;
use crate::middleware::request_logging::RequestLoggingConfig;
use crate::openapi::DEFAULT_OUTPUT_PATH;
use crate::routing::dispatch::DEFAULT_BODY_LIMIT;
use crate::routing::naming::{default_prefixes, HttpMethodPrefix, Verb};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "CTRL_ROUTER";

/// Complete engine configuration
///
/// Every section has defaults, so an empty document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Route derivation settings
    pub routing: RoutingConfig,

    /// Document generation settings
    pub openapi: OpenApiConfig,

    /// Bundled middleware settings
    pub middleware: MiddlewareConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> RouterResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RouterError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: EngineConfig = serde_yaml::from_str(&content)
            .map_err(|e| RouterError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> RouterResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RouterError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| RouterError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML or JSON, chosen by file extension
    pub async fn load<P: AsRef<Path>>(path: P) -> RouterResult<Self> {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::load_from_json(path).await,
            _ => Self::load_from_file(path).await,
        }
    }

    /// Apply overrides from the process environment
    ///
    /// Environment variables follow the pattern: CTRL_ROUTER_<SECTION>_<FIELD>
    /// For example: CTRL_ROUTER_SERVER_PORT=8080
    pub fn apply_env_overrides(&mut self) -> RouterResult<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> RouterResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}_{}", ENV_PREFIX, suffix));
        let invalid = |suffix: &str, e: &dyn std::fmt::Display| {
            RouterError::config(format!("Invalid {}_{}: {}", ENV_PREFIX, suffix, e))
        };

        // Server configuration overrides
        if let Some(addr) = var("SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = var("SERVER_PORT") {
            self.server.port = port.parse().map_err(|e| invalid("SERVER_PORT", &e))?;
        }

        if let Some(timeout) = var("SERVER_SHUTDOWN_TIMEOUT") {
            self.server.shutdown_timeout =
                humantime::parse_duration(&timeout).map_err(|e| invalid("SERVER_SHUTDOWN_TIMEOUT", &e))?;
        }

        if let Some(size) = var("SERVER_MAX_BODY_SIZE") {
            self.server.max_body_size = size.parse().map_err(|e| invalid("SERVER_MAX_BODY_SIZE", &e))?;
        }

        // Routing overrides
        if let Some(base_path) = var("ROUTING_BASE_PATH") {
            self.routing.base_path = base_path;
        }

        if let Some(verb) = var("ROUTING_DEFAULT_VERB") {
            self.routing.default_verb = if verb.is_empty() {
                None
            } else {
                Some(verb.parse().map_err(|e| invalid("ROUTING_DEFAULT_VERB", &e))?)
            };
        }

        // Document overrides
        if let Some(enabled) = var("OPENAPI_ENABLED") {
            self.openapi.enabled = enabled.parse().map_err(|e| invalid("OPENAPI_ENABLED", &e))?;
        }

        if let Some(path) = var("OPENAPI_OUTPUT_PATH") {
            self.openapi.output_path = PathBuf::from(path);
        }

        // Middleware overrides
        if let Some(enabled) = var("IP_LIMIT_ENABLED") {
            self.middleware.ip_limit.enabled = enabled.parse().map_err(|e| invalid("IP_LIMIT_ENABLED", &e))?;
        }

        if let Some(env) = var("ENVIRONMENT") {
            self.middleware.environment = env;
        }

        // Logging configuration overrides
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate the configuration, collecting every problem into one error
    pub fn validate(&self) -> RouterResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.is_empty() {
            errors.push("bind_address cannot be empty".to_string());
        }

        if self.server.shutdown_timeout.is_zero() {
            errors.push("shutdown_timeout must be greater than 0".to_string());
        }

        if self.server.max_body_size == 0 {
            errors.push("max_body_size must be greater than 0".to_string());
        }

        if !self.routing.base_path.is_empty() && !self.routing.base_path.starts_with('/') {
            errors.push(format!(
                "base_path must start with '/', got: {}",
                self.routing.base_path
            ));
        }

        if self.routing.prefixes.is_empty() && self.routing.default_verb.is_none() {
            errors.push("routing needs at least one prefix or a default_verb".to_string());
        }

        for (index, entry) in self.routing.prefixes.iter().enumerate() {
            if entry.prefix.is_empty() {
                errors.push(format!("Prefix {} is empty", index));
            }
        }

        if self.openapi.enabled && self.openapi.output_path.as_os_str().is_empty() {
            errors.push("openapi output_path cannot be empty when enabled".to_string());
        }

        let ip_limit = &self.middleware.ip_limit;
        if ip_limit.enabled && ip_limit.capacity == 0 {
            errors.push("ip_limit capacity must be greater than 0".to_string());
        }
        if ip_limit.rate < 0.0 || !ip_limit.rate.is_finite() {
            errors.push(format!("ip_limit rate must be a non-negative number, got: {}", ip_limit.rate));
        }

        for rule in &self.middleware.interceptors {
            if rule.method.parse::<Verb>().is_err() {
                errors.push(format!("Interceptor for '{}' has invalid HTTP method: {}", rule.path, rule.method));
            }
            if !rule.path.starts_with('/') {
                errors.push(format!("Interceptor path must start with '/', got: {}", rule.path));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "text" => {}
            _ => errors.push(format!("Invalid log format: {}", self.logging.format)),
        }

        if !errors.is_empty() {
            return Err(RouterError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// Listening port (0 picks a free port)
    pub port: u16,

    /// How long in-flight requests may take to finish after shutdown starts
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum buffered request body
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(10),
            max_body_size: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Route derivation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Path every controller group is mounted below
    pub base_path: String,

    /// Ordered method-name prefix table
    pub prefixes: Vec<HttpMethodPrefix>,

    /// Verb for method names that match no prefix; unset means such methods are not routes
    pub default_verb: Option<Verb>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            prefixes: default_prefixes(),
            default_verb: None,
        }
    }
}

/// OpenAPI document configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenApiConfig {
    /// Write the document when the engine is built
    pub enabled: bool,
    pub title: String,
    pub version: String,
    pub output_path: PathBuf,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            title: "ctrl-router".to_string(),
            version: "v1".to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

/// Request tracing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
}

/// Bundled middleware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Service name reported by tracing and logging
    pub service_name: String,

    /// Instance identifier, defaults to `$HOSTNAME`
    pub instance_id: String,

    /// Deployment environment label
    pub environment: String,

    pub tracing: TracingConfig,
    pub request_logging: RequestLoggingConfig,
    pub cors: CorsConfig,
    pub interceptors: Vec<InterceptorRule>,
    pub ip_limit: IpLimitConfig,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            service_name: "ctrl-router".to_string(),
            instance_id: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            environment: "default".to_string(),
            tracing: TracingConfig::default(),
            request_logging: RequestLoggingConfig::default(),
            cors: CorsConfig::default(),
            interceptors: Vec::new(),
            ip_limit: IpLimitConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,

    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config_validation() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.routing.prefixes.len(), 7);
        assert!(config.routing.default_verb.is_none());
    }

    #[test]
    fn test_config_serialization_yaml() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, deserialized);
    }

    #[tokio::test]
    async fn test_load_config_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("router.yaml");

        let config_content = r#"
server:
  bind_address: "127.0.0.1"
  port: 9080
  shutdown_timeout: "30s"
routing:
  base_path: "/v1"
  prefixes:
    - prefix: Fetch
      verb: GET
    - prefix: Create
      verb: POST
  default_verb: POST
openapi:
  enabled: true
  title: demo
middleware:
  interceptors:
    - method: POST
      path: /v1/api/info
      message: maintenance
  ip_limit:
    enabled: true
    capacity: 5
    rate: 1.5
logging:
  format: json
"#;
        tokio::fs::write(&config_path, config_content).await.unwrap();

        let config = EngineConfig::load(&config_path).await.unwrap();
        assert_eq!(config.server.port, 9080);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.routing.base_path, "/v1");
        assert_eq!(config.routing.prefixes[0], HttpMethodPrefix::new("Fetch", Verb::Get));
        assert_eq!(config.routing.default_verb, Some(Verb::Post));
        assert!(config.openapi.enabled);
        assert_eq!(config.openapi.version, "v1");
        assert_eq!(config.middleware.interceptors[0].message, "maintenance");
        assert!(config.middleware.interceptors[0].ip_list.is_empty());
        assert_eq!(config.middleware.ip_limit.capacity, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_load_config_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("router.json");
        tokio::fs::write(&config_path, r#"{"server": {"port": 7000}, "openapi": {"title": "json"}}"#)
            .await
            .unwrap();

        let config = EngineConfig::load(&config_path).await.unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.openapi.title, "json");
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.yaml");
        tokio::fs::write(&config_path, "server: [1, 2").await.unwrap();

        let err = EngineConfig::load(&config_path).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration { .. }));
        assert!(EngineConfig::load(temp_dir.path().join("missing.yaml")).await.is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides_from(lookup(&[
                ("CTRL_ROUTER_SERVER_PORT", "9999"),
                ("CTRL_ROUTER_SERVER_BIND_ADDRESS", "192.168.1.1"),
                ("CTRL_ROUTER_SERVER_SHUTDOWN_TIMEOUT", "2m"),
                ("CTRL_ROUTER_ROUTING_DEFAULT_VERB", "put"),
                ("CTRL_ROUTER_OPENAPI_ENABLED", "true"),
                ("CTRL_ROUTER_LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.bind_address, "192.168.1.1");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(120));
        assert_eq!(config.routing.default_verb, Some(Verb::Put));
        assert!(config.openapi.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_overrides() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides_from(lookup(&[("CTRL_ROUTER_SERVER_PORT", "invalid_port")]));
        assert!(result.unwrap_err().to_string().contains("Invalid CTRL_ROUTER_SERVER_PORT"));

        let result = config.apply_overrides_from(lookup(&[("CTRL_ROUTER_ROUTING_DEFAULT_VERB", "TRACE")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_errors() {
        let mut config = EngineConfig::default();
        config.server.bind_address = String::new();
        config.routing.base_path = "api".to_string();
        config.routing.prefixes.push(HttpMethodPrefix::new("", Verb::Post));
        config.middleware.interceptors.push(InterceptorRule::new("FETCH", "/x", "no"));
        config.logging.level = "loud".to_string();

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("bind_address cannot be empty"));
        assert!(message.contains("base_path must start with '/'"));
        assert!(message.contains("Prefix 7 is empty"));
        assert!(message.contains("invalid HTTP method: FETCH"));
        assert!(message.contains("Invalid log level: loud"));
    }
}
