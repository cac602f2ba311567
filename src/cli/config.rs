//! Configuration file handling for matchgate
//!
//! Manages configuration stored in `~/.config/matchgate/config.toml` (or platform equivalent).
//!
//! ## Configuration Layers
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Hard-coded defaults
//! 2. Config file (`~/.config/matchgate/config.toml`)
//! 3. Command-line arguments
//!
//! ## Example Config File
//!
//! ```toml
//! version = 1
//!
//! [status]
//! stale_after_secs = 300
//! cache_capacity = 8
//! payment_check = "assume-paid"
//!
//! [guard]
//! redirect_cooldown_ms = 100
//!
//! [paywall]
//! testing_bypass = false
//!
//! [output]
//! color = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::status::PaymentCheck;

// =============================================================================
// Configuration Structures
// =============================================================================

// Config file format version
// Bump this when making breaking changes to the config structure
const CONFIG_VERSION: u32 = 1;

/// Root configuration for matchgate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Config file format version for migrations
    #[serde(default = "default_config_version")]
    pub version: u32,

    /// Status query settings
    #[serde(default)]
    pub status: StatusConfig,

    /// Navigation guard settings
    #[serde(default)]
    pub guard: GuardConfig,

    /// Payment screen settings
    #[serde(default)]
    pub paywall: PaywallConfig,

    /// Terminal output settings
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

/// Status query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Freshness window for cached snapshots, in seconds
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Number of identities kept in the status cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// How the paid flag is determined: "assume-paid" or "subscription"
    #[serde(default)]
    pub payment_check: PaymentCheck,
}

/// Navigation guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Window after a redirect during which further redirects are suppressed
    #[serde(default = "default_cooldown_ms")]
    pub redirect_cooldown_ms: u64,
}

/// Payment screen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaywallConfig {
    /// Allow marking a subscriber without a purchase (test builds only)
    #[serde(default)]
    pub testing_bypass: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Use colored output (human format only)
    #[serde(default = "default_true")]
    pub color: bool,
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_stale_after() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    8
}

fn default_cooldown_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Default Implementations
// =============================================================================

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            status: StatusConfig::default(),
            guard: GuardConfig::default(),
            paywall: PaywallConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
            cache_capacity: default_cache_capacity(),
            payment_check: PaymentCheck::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_true(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            redirect_cooldown_ms: default_cooldown_ms(),
        }
    }
}

// =============================================================================
// Configuration Loading and Saving
// =============================================================================

impl GateConfig {
    /// Get the default configuration file path
    ///
    /// Returns platform-specific config directory:
    /// - Linux: `~/.config/matchgate/config.toml`
    /// - macOS: `~/Library/Application Support/matchgate/config.toml`
    /// - Windows: `%APPDATA%\matchgate\config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("matchgate")
            .join("config.toml")
    }

    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    ///
    /// Returns default configuration if the file doesn't exist or can't be parsed.
    pub fn load_from(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {:?}", path);
                    config.warn_if_newer();
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("Config file not found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    fn warn_if_newer(&self) {
        if self.version > CONFIG_VERSION {
            tracing::warn!(
                "Config version {} is newer than supported version {}. Some settings may be ignored.",
                self.version,
                CONFIG_VERSION
            );
        }
    }

    /// Save configuration to a specific path
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&path, content)?;
        tracing::debug!("Saved config to {:?}", path);

        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.status.stale_after_secs)
    }

    pub fn redirect_cooldown(&self) -> Duration {
        Duration::from_millis(self.guard.redirect_cooldown_ms)
    }

    /// Get a configuration value by key path
    ///
    /// Key path uses dot notation: `status.stale_after_secs`
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["status", "stale_after_secs"] => Some(self.status.stale_after_secs.to_string()),
            ["status", "cache_capacity"] => Some(self.status.cache_capacity.to_string()),
            ["status", "payment_check"] => Some(self.status.payment_check.to_string()),
            ["guard", "redirect_cooldown_ms"] => {
                Some(self.guard.redirect_cooldown_ms.to_string())
            }
            ["paywall", "testing_bypass"] => Some(self.paywall.testing_bypass.to_string()),
            ["output", "color"] => Some(self.output.color.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key path
    ///
    /// Returns an error if the key is invalid or the value can't be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = key.split('.').collect();
        let invalid = |expected: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        match parts.as_slice() {
            ["status", "stale_after_secs"] => {
                self.status.stale_after_secs =
                    value.parse().map_err(|_| invalid("positive integer"))?;
            }
            ["status", "cache_capacity"] => {
                let capacity: usize = value.parse().map_err(|_| invalid("positive integer"))?;
                if capacity == 0 {
                    return Err(invalid("positive integer"));
                }
                self.status.cache_capacity = capacity;
            }
            ["status", "payment_check"] => {
                self.status.payment_check = value
                    .parse()
                    .map_err(|_| invalid("assume-paid or subscription"))?;
            }
            ["guard", "redirect_cooldown_ms"] => {
                self.guard.redirect_cooldown_ms =
                    value.parse().map_err(|_| invalid("non-negative integer"))?;
            }
            ["paywall", "testing_bypass"] => {
                self.paywall.testing_bypass =
                    value.parse().map_err(|_| invalid("true or false"))?;
            }
            ["output", "color"] => {
                self.output.color = value.parse().map_err(|_| invalid("true or false"))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        Ok(())
    }

    /// List all configuration keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        [
            "status.stale_after_secs",
            "status.cache_capacity",
            "status.payment_check",
            "guard.redirect_cooldown_ms",
            "paywall.testing_bypass",
            "output.color",
        ]
        .into_iter()
        .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
        .collect()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: '{value}' (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Tests
// =============================================================================
