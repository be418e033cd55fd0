//! Configuration types.
//!
//! [`OrchestratorConfig`] holds the behavioural switches of a fetch
//! orchestrator. [`ConfigFile`] is the user-facing INI file from which the
//! CLI builds its sources, cache and orchestrator settings.
//!
//! # Example
//!
//! ```
//! use tilefetch::config::ConfigFile;
//!
//! let config = ConfigFile::parse(
//!     "[source.0]\nurl = https://tiles.example.com/{z}/{x}/{y}.png\nmax_zoom = 10\n",
//! )
//! .unwrap();
//! assert_eq!(config.source_set().unwrap().depth(), 1);
//! assert!(config.orchestrator_config().persist_to_cache());
//! ```

mod file;
mod orchestrator;
mod parser;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    FetchSettings, NetworkSettings, SourceSettings, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
};
pub use orchestrator::{OrchestratorConfig, DEFAULT_PERSIST_TO_CACHE};
