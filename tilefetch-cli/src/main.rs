//! tilefetch CLI - Command-line interface
//!
//! Fetches single tiles of a configured (possibly multi-frame) layer through
//! the tilefetch orchestrator.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilefetch::config::config_file_path;
use tilefetch::logging::init_logging;

use crate::commands::fetch::FetchArgs;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "tilefetch")]
#[command(version, about = "Fetch multiplexed map tiles", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tilefetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Fetch one tile and print what arrived
    Fetch(FetchArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force),
        Commands::Fetch(args) => {
            let _logging = init_logging(cli.log_file.as_deref()).map_err(CliError::LoggingInit)?;
            commands::fetch::run(&config_path, args)
        }
    }
}
