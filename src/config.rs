use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classifier::{Classifier, Thresholds};
use crate::clock::{DayBoundary, SystemClock};
use crate::logging::{LogConfig, LogFormat, LogLevel};
use crate::storage::{
    FileStore, KeyValueStore, MemoryStore, SessionStore, SqliteStore, DEFAULT_STATE_KEY,
};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Classification bands and baseline windows
    pub thresholds: Thresholds,

    /// Where the session state lives
    pub storage: StorageSettings,

    /// Which calendar day "today" is
    pub clock: ClockSettings,

    /// Logging output
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        ConfigMetadata {
            version: "1.0".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence backend choices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key in `data_dir`
    #[default]
    File,
    /// `readyrs.db` in `data_dir`
    Sqlite,
    /// Nothing survives the process
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageBackend::File => "file",
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,

    /// Data directory path
    pub data_dir: PathBuf,

    /// Key the session blob is stored under
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::File,
            data_dir: default_data_dir(),
            key: DEFAULT_STATE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub day_boundary: DayBoundary,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readyrs")
}

/// Keys accepted by [`AppConfig::get_value`] and [`AppConfig::set_value`]
pub const CONFIG_KEYS: [&str; 13] = [
    "thresholds.rest",
    "thresholds.perform",
    "thresholds.min_preview_days",
    "thresholds.min_full_days",
    "thresholds.mad_floor",
    "thresholds.mad_scale",
    "storage.backend",
    "storage.data_dir",
    "storage.key",
    "clock.day_boundary",
    "logging.level",
    "logging.format",
    "logging.file_path",
];

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.readyrs/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".readyrs")
            .join("config.toml")
    }

    /// Load and validate `path`. A missing file is `Ok(None)`; an unreadable,
    /// unparsable or invalid one is an error.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let config = Self::load_from_file(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(Some(config))
    }

    /// Load from `path`, falling back to defaults when the file is missing or unusable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Change one setting in the file at `path`, creating it if missing.
    ///
    /// A file that cannot be loaded is left untouched rather than replaced
    /// with defaults.
    pub fn update_file<P: AsRef<Path>>(path: P, key: &str, value: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::try_load(path)
            .with_context(|| format!("Refusing to overwrite {}", path.display()))?
            .unwrap_or_default();
        config.set_value(key, value)?;
        config.save_to_file(path)?;
        Ok(config)
    }

    /// Check the configuration for values the tracker cannot run with
    pub fn validate(&self) -> Result<()> {
        self.thresholds
            .validate()
            .with_context(|| "Invalid [thresholds] section")?;

        if self.storage.key.trim().is_empty() {
            anyhow::bail!("storage.key must not be empty");
        }

        Ok(())
    }

    pub fn classifier(&self) -> Result<Classifier> {
        Classifier::new(self.thresholds.clone()).with_context(|| "Invalid [thresholds] section")
    }

    pub fn clock(&self) -> SystemClock {
        SystemClock::new(self.clock.day_boundary)
    }

    /// Build the configured persistence backend
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.storage.backend {
            StorageBackend::File => Arc::new(FileStore::new(&self.storage.data_dir)),
            StorageBackend::Sqlite => {
                let db_path = self.storage.data_dir.join("readyrs.db");
                Arc::new(SqliteStore::open(&db_path).with_context(|| {
                    format!("Failed to open database: {}", db_path.display())
                })?)
            }
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }

    pub fn session_store(&self) -> Result<SessionStore> {
        Ok(SessionStore::new(self.open_store()?, self.storage.key.clone()))
    }

    /// Read a single setting as text
    pub fn get_value(&self, key: &str) -> Result<String> {
        let t = &self.thresholds;
        let value = match key {
            "thresholds.rest" => t.rest.to_string(),
            "thresholds.perform" => t.perform.to_string(),
            "thresholds.min_preview_days" => t.min_preview_days.to_string(),
            "thresholds.min_full_days" => t.min_full_days.to_string(),
            "thresholds.mad_floor" => t.mad_floor.to_string(),
            "thresholds.mad_scale" => t.mad_scale.to_string(),
            "storage.backend" => self.storage.backend.to_string(),
            "storage.data_dir" => self.storage.data_dir.display().to_string(),
            "storage.key" => self.storage.key.clone(),
            "clock.day_boundary" => match self.clock.day_boundary {
                DayBoundary::Utc => "utc".to_string(),
                DayBoundary::Local => "local".to_string(),
            },
            "logging.level" => self.logging.level.to_filter(),
            "logging.format" => format!("{:?}", self.logging.format).to_lowercase(),
            "logging.file_path" => self
                .logging
                .file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }

    /// Update a single setting from text. The result is validated before it is kept.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        let invalid = || format!("Invalid value for {}: {}", key, value);

        match key {
            "thresholds.rest" => updated.thresholds.rest = value.parse().with_context(invalid)?,
            "thresholds.perform" => {
                updated.thresholds.perform = value.parse().with_context(invalid)?
            }
            "thresholds.min_preview_days" => {
                updated.thresholds.min_preview_days = value.parse().with_context(invalid)?
            }
            "thresholds.min_full_days" => {
                updated.thresholds.min_full_days = value.parse().with_context(invalid)?
            }
            "thresholds.mad_floor" => {
                updated.thresholds.mad_floor = value.parse().with_context(invalid)?
            }
            "thresholds.mad_scale" => {
                updated.thresholds.mad_scale = value.parse().with_context(invalid)?
            }
            "storage.backend" => {
                updated.storage.backend = value.parse::<StorageBackend>().map_err(anyhow::Error::msg)?
            }
            "storage.data_dir" => updated.storage.data_dir = PathBuf::from(value),
            "storage.key" => updated.storage.key = value.trim().to_string(),
            "clock.day_boundary" => {
                updated.clock.day_boundary = value.parse::<DayBoundary>().map_err(anyhow::Error::msg)?
            }
            "logging.level" => {
                updated.logging.level = value.parse::<LogLevel>().map_err(anyhow::Error::msg)?
            }
            "logging.format" => {
                updated.logging.format = value.parse::<LogFormat>().map_err(anyhow::Error::msg)?
            }
            "logging.file_path" => {
                updated.logging.file_path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
