//! Init command - write a starter configuration file.

use std::path::Path;

use tilefetch::config::{ConfigFile, SourceSettings};

use crate::error::CliError;

/// Placeholder source written into new config files.
const EXAMPLE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Run the init command.
///
/// An existing file is left untouched unless `force` is set.
pub fn run(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let mut config = ConfigFile::default();
    let mut source = SourceSettings::new(EXAMPLE_URL);
    source.max_zoom = 19;
    source.name = Some("osm".to_string());
    config.sources.push(source);
    config.save_to(path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Add one [source.N] section per frame for multiplexed layers.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run(&path, false).unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.source_set().unwrap().depth(), 1);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[fetch]\ndebug = true\n").unwrap();

        run(&path, false).unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert!(config.sources.is_empty());
        assert!(config.fetch.debug);
    }
}
