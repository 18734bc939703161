//! Configuration: retry tuning and a format-agnostic config store

use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::classify::EphemeralTable;
use crate::io::{Primitives, RobustFs, StdPrimitives};
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Settings for [`RobustFs`].
///
/// ```toml
/// enable_fsync = true
/// ephemeral_codes = [2, 5, 32]
///
/// [retry]
/// initial_sleep_ms = 1
/// budget_ms = 500
/// ```
///
/// An optional top-level `jitter_seed = <u64>` makes every retry session's
/// sleep schedule reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessConfig {
    pub enable_fsync: bool,
    /// Codes worth retrying. Defaults to the platform's table.
    pub ephemeral_codes: EphemeralTable,
    pub retry: RetryPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            enable_fsync: true,
            ephemeral_codes: EphemeralTable::platform_default(),
            retry: RetryPolicy::default(),
            jitter_seed: None,
        }
    }
}

impl RobustnessConfig {
    /// Load settings from a TOML, JSON or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ConfigStore::new().load(path)
    }
}

/// Format-agnostic configuration store.
///
/// Detects format from file extension. Reads and writes go through
/// [`RobustFs`], so a config file briefly held by a scanner does not fail
/// the load.
#[derive(Debug, Clone)]
pub struct ConfigStore<P = StdPrimitives> {
    fs: RobustFs<P>,
}

impl ConfigStore {
    /// Create a new ConfigStore with default robustness settings.
    pub fn new() -> Self {
        Self { fs: RobustFs::new() }
    }

    pub fn with_robustness(robustness: &RobustnessConfig) -> Self {
        Self {
            fs: RobustFs::from_config(robustness),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Primitives> ConfigStore<P> {
    pub fn with_fs(fs: RobustFs<P>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &RobustFs<P> {
        &self.fs
    }

    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let content = self.fs.read_text(path)?;

        let parsed = match format {
            Format::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.name().into(),
            message,
        })
    }

    /// Save configuration to a file.
    ///
    /// Format is determined from file extension.
    /// Uses atomic write to prevent corruption.
    pub fn save<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> Result<()> {
        let path = path.as_ref();
        let format = Format::of(path)?;

        let content = match format {
            Format::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
        .map_err(|message| Error::ConfigSerialize {
            path: path.to_path_buf(),
            format: format.name().into(),
            message,
        })?;

        self.fs.write_text(path, &content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}
