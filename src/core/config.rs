//! Configuration management for rulescan.

use crate::core::error::{Error, Result};
use crate::core::types::EngineKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log levels accepted in `logging.log_level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine selection and rule sources
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scan-related settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        Self::load_or_create(&Self::default_config_path())
    }

    /// Load from `path`, writing defaults there only when no file exists.
    ///
    /// An unreadable file is left untouched.
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            return Self::load(path).unwrap_or_else(|e| {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            });
        }

        let config = Self::default();

        if let Err(e) = config.save(path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("rulescan")
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.scan.max_file_size_mb == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.max_file_size_mb".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        let level = self.logging.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::ConfigInvalid {
                field: "logging.log_level".to_string(),
                message: format!("Unknown level '{}'", self.logging.log_level),
            });
        }

        Ok(())
    }
}

/// Engine selection and rule sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which backend to construct at startup
    pub backend: EngineKind,
    /// Load the built-in signature families on initialize
    pub load_default_rules: bool,
    /// Additional rule files loaded after initialization, in order
    pub rule_paths: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineKind::Precise,
            load_default_rules: true,
            rule_paths: Vec::new(),
        }
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Refuse files larger than this size (MB)
    pub max_file_size_mb: u64,
    /// Follow symbolic links when walking directories
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            follow_symlinks: false,
        }
    }
}

impl ScanConfig {
    /// Size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Include module paths in console output
    pub verbose_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verbose_console: false,
        }
    }
}
