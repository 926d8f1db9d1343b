//! Container configuration.
//!
//! Settings come from layered [`ConfigSource`]s (environment variables, an
//! in-memory map, or JSON with the `config` feature) and are collected into a
//! [`ContainerConfig`] handed to [`TypeRegistry::with_config`](crate::TypeRegistry::with_config).

use std::collections::HashMap;
use std::env;
use std::fmt;

#[cfg(feature = "config")]
use serde::Deserialize;

use crate::error::{DiError, DiResult};
use crate::internal::circular::DEFAULT_MAX_DEPTH;

pub const MAX_DEPTH_KEY: &str = "max_depth";
pub const STRICT_TYPE_VARS_KEY: &str = "strict_type_vars";
pub const LOG_RESOLUTIONS_KEY: &str = "log_resolutions";

/// Settings of one container.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{ConfigProvider, ContainerConfig, MapConfigSource};
///
/// let mut provider = ConfigProvider::new();
/// provider.add_source(Box::new(MapConfigSource::new().with("max_depth", "64")));
///
/// let config = ContainerConfig::load(&provider).unwrap();
/// assert_eq!(config.max_depth, 64);
/// assert!(config.strict_type_vars);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfig {
    /// Deepest dependency chain a single resolution may build
    pub max_depth: usize,
    /// Fail on unbound generic symbols in parameter annotations
    pub strict_type_vars: bool,
    /// Install a [`TracingObserver`](crate::TracingObserver) at build time
    pub log_resolutions: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_type_vars: true,
            log_resolutions: false,
        }
    }
}

impl ContainerConfig {
    /// Reads every known key from `provider`, keeping defaults for absent ones.
    pub fn load(provider: &ConfigProvider) -> DiResult<Self> {
        let mut config = Self::default();
        if let Some(value) = provider.get(MAX_DEPTH_KEY) {
            let depth = value.as_i64(MAX_DEPTH_KEY)?;
            if depth <= 0 {
                return Err(DiError::Config {
                    key: MAX_DEPTH_KEY.into(),
                    message: format!("must be positive, got {}", depth),
                });
            }
            config.max_depth = depth as usize;
        }
        if let Some(value) = provider.get(STRICT_TYPE_VARS_KEY) {
            config.strict_type_vars = value.as_bool(STRICT_TYPE_VARS_KEY)?;
        }
        if let Some(value) = provider.get(LOG_RESOLUTIONS_KEY) {
            config.log_resolutions = value.as_bool(LOG_RESOLUTIONS_KEY)?;
        }
        tracing::debug!(?config, "container configuration loaded");
        Ok(config)
    }

    /// Reads the configuration from `{PREFIX}_MAX_DEPTH` and friends.
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(EnvironmentConfigSource::with_prefix(prefix)));
        Self::load(&provider)
    }

    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config {
            key: "<json>".into(),
            message: e.to_string(),
        })
    }

    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> DiResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DiError::Config {
            key: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn strict_type_vars(mut self, strict: bool) -> Self {
        self.strict_type_vars = strict;
        self
    }

    pub fn log_resolutions(mut self, enabled: bool) -> Self {
        self.log_resolutions = enabled;
        self
    }
}

/// A raw configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses text the way environment variables are read: integer, then
    /// float, then boolean, else string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_i64(&self, key: &str) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(mismatch(key, "an integer", other)),
        }
    }

    pub fn as_bool(&self, key: &str) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::Integer(0) => Ok(false),
            ConfigValue::Integer(1) => Ok(true),
            other => Err(mismatch(key, "a boolean", other)),
        }
    }

    pub fn as_str(&self, key: &str) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(mismatch(key, "a string", other)),
        }
    }
}

fn mismatch(key: &str, expected: &str, got: &ConfigValue) -> DiError {
    DiError::Config {
        key: key.to_string(),
        message: format!("expected {}, got {}", expected, got),
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "'{}'", s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// A place configuration values are read from.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;
}

/// Environment variables, optionally namespaced: with prefix `app` the key
/// `max_depth` is read from `APP_MAX_DEPTH`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(|v| ConfigValue::parse(&v))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let head = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&head).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory values, mostly for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key`, parsing `raw` like an environment variable.
    pub fn with(mut self, key: impl Into<String>, raw: &str) -> Self {
        self.values.insert(key.into(), ConfigValue::parse(raw));
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Ordered stack of sources; the first source that has a key wins.
#[derive(Debug, Default)]
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    /// Every key any source knows, deduplicated, in source order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.sources.iter().flat_map(|s| s.keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}
