//! Configuration loading with environment variable overrides

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error when reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
    /// Unsupported file format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Configuration(err.to_string())
    }
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Configuration validation trait
pub trait ConfigValidation {
    /// Validate configuration
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Configuration that can be overridden from the environment
pub trait EnvOverrides {
    /// Apply overrides resolved through `env`
    fn apply_env(&mut self, env: &EnvResolver) -> Result<(), ConfigError>;
}

/// Environment variable resolver
#[derive(Debug, Clone)]
pub struct EnvResolver {
    /// Prefix for environment variables
    prefix: String,
    /// Explicit values, consulted before the process environment
    values: HashMap<String, String>,
}

impl EnvResolver {
    /// Create a new environment resolver
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_uppercase(),
            values: HashMap::new(),
        }
    }

    /// Pin a value, mostly for tests
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_uppercase(), value.to_string());
        self
    }

    /// Resolve `<PREFIX>_<KEY>`
    pub fn resolve(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.get(&key.to_uppercase()) {
            return Some(value.clone());
        }

        let env_key = format!("{}_{}", self.prefix, key.to_uppercase());
        match std::env::var(&env_key) {
            Ok(value) => {
                debug!("Resolved {} from environment", env_key);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Resolve and parse
    pub fn resolve_parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.resolve(key) {
            Some(value) => value.parse::<T>().map(Some).map_err(|e| {
                ConfigError::Validation(format!("Failed to parse {} for key {}: {}", value, key, e))
            }),
            None => Ok(None),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    env_resolver: EnvResolver,
}

impl ConfigLoader {
    /// Create a loader reading `<prefix>_*` variables
    pub fn new(env_prefix: &str) -> Self {
        Self {
            env_resolver: EnvResolver::new(env_prefix),
        }
    }

    /// Use a prepared resolver
    pub fn with_resolver(env_resolver: EnvResolver) -> Self {
        Self { env_resolver }
    }

    /// Load `T` from `path` (defaults when absent), apply the environment, validate
    pub fn load<T>(&self, path: Option<&Path>) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default + EnvOverrides + ConfigValidation,
    {
        let mut config = match path {
            Some(path) if path.exists() => self.load_file(path)?,
            Some(path) => {
                info!("Config file {} not found, using defaults", path.display());
                T::default()
            }
            None => T::default(),
        };

        config.apply_env(&self.env_resolver)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ConfigError> {
        let format = ConfigFormat::from_extension(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let content = std::fs::read_to_string(path)?;

        let config = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Serde helpers for `Duration` fields expressed in milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serialize as milliseconds
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    /// Deserialize from milliseconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Optional file path override helper
pub fn path_override(env: &EnvResolver, key: &str, target: &mut Option<PathBuf>) {
    if let Some(value) = env.resolve(key) {
        *target = if value.is_empty() { None } else { Some(PathBuf::from(value)) };
    }
}
