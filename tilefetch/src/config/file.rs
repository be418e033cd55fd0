//! Configuration file handling for ~/.tilefetch/config.ini.
//!
//! ```ini
//! [cache]
//! directory = ~/.tilefetch/cache
//!
//! [network]
//! timeout = 30
//! user_agent = radar-viewer/1.0
//!
//! [fetch]
//! persist = true
//! debug = false
//!
//! [source.0]
//! url = https://tiles.example.com/radar/0/{z}/{x}/{y}.png
//! min_zoom = 0
//! max_zoom = 12
//! name = radar-0
//!
//! [source.1]
//! url = https://tiles.example.com/radar/1/{z}/{x}/{y}.png
//! max_zoom = 12
//! ```
//!
//! Each `[source.N]` section is one frame; frames are ordered by `N`.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::orchestrator::{OrchestratorConfig, DEFAULT_PERSIST_TO_CACHE};
use crate::decode::TileFormat;
use crate::network::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::source::{RowOrder, SourceError, SourceSet, TileSource, DEFAULT_EXTENSION};

/// Default lowest zoom of a configured source.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Default highest zoom of a configured source.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A source section lacks its URL
    #[error("Section [{section}] is missing required key '{key}'")]
    MissingValue { section: String, key: String },

    /// The sources do not form a usable layer
    #[error("Invalid sources: {0}")]
    Sources(#[from] SourceError),

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Disk cache root; `None` disables the cache.
    pub directory: Option<PathBuf>,
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    pub user_agent: String,
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Write fetched tiles to the cache
    pub persist: bool,
    /// Verbose per-fetch logging
    pub debug: bool,
}

/// One `[source.N]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub url: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub name: Option<String>,
    pub extension: String,
    /// Remote rows are counted TMS-style
    pub tms: bool,
    pub format: TileFormat,
}

impl SourceSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            name: None,
            extension: DEFAULT_EXTENSION.to_string(),
            tms: false,
            format: TileFormat::default(),
        }
    }

    /// Builds the runtime source description.
    pub fn to_source(&self) -> TileSource {
        let mut source = TileSource::new(self.url.clone(), self.min_zoom, self.max_zoom)
            .with_extension(self.extension.clone())
            .with_row_order(if self.tms { RowOrder::Tms } else { RowOrder::Xyz });
        if let Some(name) = &self.name {
            source = source.with_name(name.clone());
        }
        source
    }
}

/// Parsed contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub network: NetworkSettings,
    pub fetch: FetchSettings,
    /// One entry per frame, in frame order
    pub sources: Vec<SourceSettings>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: Some(config_directory().join("cache")),
            },
            network: NetworkSettings {
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            fetch: FetchSettings {
                persist: DEFAULT_PERSIST_TO_CACHE,
                debug: false,
            },
            sources: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilefetch/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let mut content = Vec::new();
        super::parser::to_ini(self)
            .write_to(&mut content)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Orchestrator settings from `[network]` and `[fetch]`.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_persist_to_cache(self.fetch.persist)
            .with_debug_output(self.fetch.debug)
            .with_http_timeout_secs(self.network.timeout)
            .with_user_agent(self.network.user_agent.clone())
    }

    /// The configured sources as a layer.
    pub fn source_set(&self) -> Result<SourceSet, ConfigFileError> {
        let sources = self.sources.iter().map(SourceSettings::to_source).collect();
        Ok(SourceSet::new(sources)?)
    }

    /// Payload format of the layer (taken from the first source).
    pub fn format(&self) -> TileFormat {
        self.sources
            .first()
            .map(|source| source.format)
            .unwrap_or_default()
    }
}

/// Get the path to the config directory (~/.tilefetch).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilefetch")
}

/// Get the path to the config file (~/.tilefetch/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_default_has_no_sources() {
        let config = ConfigFile::default();
        assert!(config.sources.is_empty());
        assert!(matches!(
            config.source_set(),
            Err(ConfigFileError::Sources(SourceError::NoSources))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.directory = None;
        config.fetch.debug = true;
        let mut source = SourceSettings::new("http://t/{z}/{x}/{y}.pbf");
        source.name = Some("roads".to_string());
        source.tms = true;
        source.format = TileFormat::Vector;
        config.sources.push(source);

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_orchestrator_config_mapping() {
        let mut config = ConfigFile::default();
        config.fetch.persist = false;
        config.network.timeout = 7;

        let orchestrator = config.orchestrator_config();
        assert!(!orchestrator.persist_to_cache());
        assert_eq!(orchestrator.http_timeout_secs(), 7);
    }

    #[test]
    fn test_source_settings_to_source() {
        let mut settings = SourceSettings::new("http://t/{z}/{x}/{y}.png");
        settings.tms = true;
        settings.max_zoom = 4;

        let source = settings.to_source();
        assert_eq!(source.row_order(), RowOrder::Tms);
        assert_eq!(source.max_zoom(), 4);
    }
}
