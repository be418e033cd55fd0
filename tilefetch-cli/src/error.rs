//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use tilefetch::config::ConfigFileError;
use tilefetch::network::NetworkError;
use tilefetch::orchestrator::OrchestratorError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be read or is invalid
    Config(ConfigFileError),
    /// Config file has no `[source.N]` sections
    NoSources(PathBuf),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to create the HTTP client
    Network(NetworkError),
    /// Orchestrator refused to start or to accept the request
    Orchestrator(OrchestratorError),
    /// The tile could not be loaded
    TileFailed(String),
    /// Interrupted before the tile arrived
    Interrupted,
    /// Failed to write output file
    FileWrite { path: PathBuf, error: String },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::NoSources(path) => {
                eprintln!();
                eprintln!("Add at least one source to {}:", path.display());
                eprintln!("  [source.0]");
                eprintln!("  url = https://tiles.example.com/{{z}}/{{x}}/{{y}}.png");
                eprintln!("  max_zoom = 12");
                eprintln!();
                eprintln!("Or run 'tilefetch init' to write a starter file.");
            }
            CliError::Interrupted => process::exit(130),
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::NoSources(path) => {
                write!(f, "No tile sources configured in {}", path.display())
            }
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Network(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Orchestrator(e) => write!(f, "Fetch failed: {}", e),
            CliError::TileFailed(tile) => write!(f, "Tile {} could not be loaded", tile),
            CliError::Interrupted => write!(f, "Interrupted"),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Network(e) => Some(e),
            CliError::Orchestrator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<OrchestratorError> for CliError {
    fn from(e: OrchestratorError) -> Self {
        CliError::Orchestrator(e)
    }
}

impl From<NetworkError> for CliError {
    fn from(e: NetworkError) -> Self {
        CliError::Network(e)
    }
}
