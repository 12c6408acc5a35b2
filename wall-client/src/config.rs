//! Configuration loading for the Student Wall client.
//!
//! Required fields have no defaults. Cache overrides and logging settings
//! are optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "STUDENT_WALL_CONFIG";
pub const MAINNET_IDENTITY_PROVIDER: &str = "https://identity.ic0.app/#authorize";

/// Which replica network the backend lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Ic,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub network: Network,
    pub backend_canister_id: String,
    /// Identity provider canister, required on the local network.
    pub identity_canister_id: Option<String>,
    pub local_replica_url: Option<String>,
    #[serde(default = "default_disable_idle_logout")]
    pub disable_idle_logout: bool,
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub log_json: bool,
    /// Interval of the background cache collector.
    pub gc_interval_ms: u64,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_disable_idle_logout() -> bool {
    true
}

/// Per-family cache overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub votes: Option<PolicyOverride>,
    pub message_detail: Option<PolicyOverride>,
    pub page_count: Option<PolicyOverride>,
    pub pages: Option<PolicyOverride>,
    pub profiles: Option<PolicyOverride>,
    pub homework: Option<PolicyOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverride {
    pub stale_ms: Option<u64>,
    pub gc_ms: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or STUDENT_WALL_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_canister_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend_canister_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.network == Network::Local {
            let identity_missing = self
                .identity_canister_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty());
            if identity_missing {
                return Err(ConfigError::InvalidValue {
                    field: "identity_canister_id",
                    reason: "required when network = \"local\"".to_string(),
                });
            }
        }
        if let Some(url) = &self.local_replica_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "local_replica_url",
                    reason: "must be an http(s) URL".to_string(),
                });
            }
        }
        if self.gc_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gc_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "log_filter",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        let overrides = [
            ("cache.votes", &self.cache.votes),
            ("cache.message_detail", &self.cache.message_detail),
            ("cache.page_count", &self.cache.page_count),
            ("cache.pages", &self.cache.pages),
            ("cache.profiles", &self.cache.profiles),
            ("cache.homework", &self.cache.homework),
        ];
        for (field, found) in overrides {
            if let Some(PolicyOverride {
                stale_ms: Some(stale),
                gc_ms: Some(gc),
            }) = found
            {
                if gc < stale {
                    return Err(ConfigError::InvalidValue {
                        field,
                        reason: "gc_ms must be >= stale_ms".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Where the interactive login flow is served for this network.
    pub fn identity_provider_url(&self) -> String {
        match self.network {
            Network::Ic => MAINNET_IDENTITY_PROVIDER.to_string(),
            Network::Local => format!(
                "{}?canisterId={}#authorize",
                self.local_replica_url
                    .as_deref()
                    .unwrap_or("http://localhost:4943"),
                self.identity_canister_id.as_deref().unwrap_or_default()
            ),
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
