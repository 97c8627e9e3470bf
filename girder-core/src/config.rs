//! Typed framework settings.
//!
//! Settings load from TOML or JSON and can then be overridden by `GIRDER_*`
//! environment variables, e.g. `GIRDER_ROUTING_CASE_SENSITIVE=false` or
//! `GIRDER_PIPELINE_REQUEST_TIMEOUT_MS=5000`. Every field has a default, so an
//! empty document is a valid configuration.
//!
//! ```
//! use girder_core::config::GirderConfig;
//!
//! let config = GirderConfig::from_toml_str(r#"
//!     [routing]
//!     case_sensitive = false
//!
//!     [pipeline]
//!     request_timeout_ms = 2500
//! "#).unwrap();
//!
//! assert!(!config.routing.case_sensitive);
//! assert_eq!(config.pipeline.request_timeout_ms, Some(2500));
//! ```

use crate::di::Lifetime;
use crate::logging::{LogConfig, LogFormat, LogLevel, debug};
use crate::routing::MatchOptions;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix of the environment variables read by [`GirderConfig::apply_env`].
pub const ENV_PREFIX: &str = "GIRDER_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GirderConfig {
    pub routing: RoutingConfig,
    pub pipeline: PipelineConfig,
    pub container: ContainerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Compare literal segments exactly
    pub case_sensitive: bool,
    /// Percent-decode path segments before matching
    pub decode_params: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            decode_params: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Show server-side error messages in 5xx bodies
    pub expose_error_details: bool,
    /// Whole-request timeout; unset means none
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    /// Lifetime used by `ApplicationBuilder::provide`
    pub default_lifetime: Lifetime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Raw filter directives, overriding `level`
    pub filter: Option<String>,
}

impl GirderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("TOML parse error: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Configuration(format!("JSON parse error: {}", e)))
    }

    /// Load a `.toml` or `.json` file, chosen by extension.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                Error::Configuration(format!("{}: no file extension found", path.display()))
            })?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), format = %extension, "Loading configuration file");
        match extension.as_str() {
            "toml" => Self::from_toml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(Error::Configuration(format!(
                "unsupported configuration format: {}",
                other
            ))),
        }
    }

    /// Override settings from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(std::env::vars())
    }

    /// Override settings from `(name, value)` pairs; names without the
    /// `GIRDER_` prefix are ignored, unknown `GIRDER_` names are rejected.
    pub fn apply_env_from<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let Some(key) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match key.to_ascii_uppercase().as_str() {
                "ROUTING_CASE_SENSITIVE" => {
                    self.routing.case_sensitive = parse_bool(key, value)?;
                }
                "ROUTING_DECODE_PARAMS" => {
                    self.routing.decode_params = parse_bool(key, value)?;
                }
                "PIPELINE_EXPOSE_ERROR_DETAILS" => {
                    self.pipeline.expose_error_details = parse_bool(key, value)?;
                }
                "PIPELINE_REQUEST_TIMEOUT_MS" => {
                    self.pipeline.request_timeout_ms = match value {
                        "" | "0" => None,
                        ms => Some(ms.parse().map_err(|_| invalid(key, value))?),
                    };
                }
                "CONTAINER_DEFAULT_LIFETIME" => {
                    self.container.default_lifetime = parse_lifetime(key, value)?;
                }
                "LOGGING_LEVEL" => self.logging.level = value.parse()?,
                "LOGGING_FORMAT" => self.logging.format = value.parse()?,
                "LOGGING_FILTER" => {
                    self.logging.filter = (!value.is_empty()).then(|| value.to_string());
                }
                _ => {
                    return Err(Error::Configuration(format!(
                        "unknown setting {}{}",
                        ENV_PREFIX, key
                    )));
                }
            }
            debug!(setting = key, "Configuration overridden from environment");
        }
        Ok(self)
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.routing.case_sensitive,
            decode_params: self.routing.decode_params,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.pipeline.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn log_config(&self) -> LogConfig {
        let config = LogConfig::new()
            .level(self.logging.level)
            .format(self.logging.format);
        match &self.logging.filter {
            Some(filter) => config.with_env_filter(filter.clone()),
            None => config,
        }
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::Configuration(format!("invalid value '{}' for {}{}", value, ENV_PREFIX, key))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_lifetime(key: &str, value: &str) -> Result<Lifetime> {
    match value.to_ascii_lowercase().as_str() {
        "singleton" => Ok(Lifetime::Singleton),
        "transient" => Ok(Lifetime::Transient),
        "scoped" => Ok(Lifetime::Scoped),
        _ => Err(invalid(key, value)),
    }
}
