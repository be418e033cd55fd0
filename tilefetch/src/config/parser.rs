//! INI mapping for `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields,
//! in both directions.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::{ConfigFile, ConfigFileError, SourceSettings};
use crate::decode::TileFormat;

/// Prefix of per-frame source sections (`[source.0]`, `[source.1]`, ...).
const SOURCE_SECTION_PREFIX: &str = "source.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            // An explicit empty value disables the cache
            config.cache.directory = (!v.is_empty()).then(|| expand_tilde(v));
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("timeout") {
            config.network.timeout = parse_number("network", "timeout", v)?;
            if config.network.timeout == 0 {
                return Err(invalid("network", "timeout", v, "must be at least 1 second"));
            }
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.network.user_agent = v.to_string();
            }
        }
    }

    // [fetch] section
    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("persist") {
            config.fetch.persist = parse_bool(v);
        }
        if let Some(v) = section.get("debug") {
            config.fetch.debug = parse_bool(v);
        }
    }

    // [source.N] sections, ordered by N
    let mut sources = Vec::new();
    for (name, section) in ini.iter() {
        let Some(name) = name else { continue };
        let Some(index) = name.strip_prefix(SOURCE_SECTION_PREFIX) else {
            continue;
        };
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| invalid(name, "", index, "source sections are named [source.N]"))?;

        let url = section
            .get("url")
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigFileError::MissingValue {
                section: name.to_string(),
                key: "url".to_string(),
            })?;
        let mut source = SourceSettings::new(url);

        if let Some(v) = section.get("min_zoom") {
            source.min_zoom = parse_number(name, "min_zoom", v)?;
        }
        if let Some(v) = section.get("max_zoom") {
            source.max_zoom = parse_number(name, "max_zoom", v)?;
        }
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if !v.is_empty() {
                if v.contains(['/', '\\']) || v == "." || v == ".." {
                    return Err(invalid(name, "name", v, "must be a plain directory name"));
                }
                source.name = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("extension") {
            let v = v.trim().trim_start_matches('.');
            if !v.is_empty() {
                source.extension = v.to_string();
            }
        }
        if let Some(v) = section.get("tms") {
            source.tms = parse_bool(v);
        }
        if let Some(v) = section.get("format") {
            source.format = TileFormat::from_str(v)
                .map_err(|_| invalid(name, "format", v, "must be one of: raster, vector, raw"))?;
        }

        sources.push((index, source));
    }
    sources.sort_by_key(|(index, _)| *index);

    for pair in sources.windows(2) {
        if pair[0].0 == pair[1].0 {
            let section = format!("{}{}", SOURCE_SECTION_PREFIX, pair[0].0);
            return Err(invalid(&section, "", "", "duplicate source section"));
        }
    }
    config.sources = sources.into_iter().map(|(_, source)| source).collect();

    if let Some(first) = config.sources.first() {
        let format = first.format;
        if let Some(other) = config.sources.iter().find(|s| s.format != format) {
            return Err(invalid(
                "source",
                "format",
                &other.format.to_string(),
                "every source of a layer must use the same format",
            ));
        }
    }

    Ok(config)
}

/// Build the INI representation written by `ConfigFile::save_to`.
pub(super) fn to_ini(config: &ConfigFile) -> Ini {
    let mut ini = Ini::new();

    let directory = config
        .cache
        .directory
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    ini.with_section(Some("cache")).set("directory", directory);

    ini.with_section(Some("network"))
        .set("timeout", config.network.timeout.to_string())
        .set("user_agent", config.network.user_agent.clone());

    ini.with_section(Some("fetch"))
        .set("persist", config.fetch.persist.to_string())
        .set("debug", config.fetch.debug.to_string());

    for (index, source) in config.sources.iter().enumerate() {
        let section = format!("{}{}", SOURCE_SECTION_PREFIX, index);
        let mut setter = ini.with_section(Some(section));
        setter
            .set("url", source.url.clone())
            .set("min_zoom", source.min_zoom.to_string())
            .set("max_zoom", source.max_zoom.to_string())
            .set("extension", source.extension.clone())
            .set("tms", source.tms.to_string())
            .set("format", source.format.to_string());
        if let Some(name) = &source.name {
            setter.set("name", name.clone());
        }
    }

    ini
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse boolean values (true/false, 1/0, yes/no, on/off).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::DEFAULT_TIMEOUT_SECS;

    #[test]
    fn test_parse_full_config() {
        let config = ConfigFile::parse(
            r#"
[cache]
directory = /var/cache/tiles

[network]
timeout = 10
user_agent = radar-viewer/2.0

[fetch]
persist = no
debug = yes

[source.1]
url = http://t/b/{z}/{x}/{y}.png
max_zoom = 9

[source.0]
url = http://t/a/{z}/{x}/{y}.png
min_zoom = 2
max_zoom = 12
name = radar-a
tms = true
"#,
        )
        .unwrap();

        assert_eq!(config.cache.directory, Some(PathBuf::from("/var/cache/tiles")));
        assert_eq!(config.network.timeout, 10);
        assert_eq!(config.network.user_agent, "radar-viewer/2.0");
        assert!(!config.fetch.persist);
        assert!(config.fetch.debug);

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].url, "http://t/a/{z}/{x}/{y}.png");
        assert_eq!(config.sources[0].name.as_deref(), Some("radar-a"));
        assert!(config.sources[0].tms);
        assert_eq!(config.sources[1].max_zoom, 9);

        let layer = config.source_set().unwrap();
        assert_eq!(layer.depth(), 2);
        assert_eq!(layer.min_zoom(), 2);
        assert_eq!(layer.max_zoom(), 9);
    }

    #[test]
    fn test_missing_sections_keep_defaults() {
        let config = ConfigFile::parse("[fetch]\ndebug = true\n").unwrap();
        assert_eq!(config.network.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(config.fetch.persist);
        assert!(config.cache.directory.is_some());
    }

    #[test]
    fn test_empty_cache_directory_disables_cache() {
        let config = ConfigFile::parse("[cache]\ndirectory =\n").unwrap();
        assert_eq!(config.cache.directory, None);
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ConfigFile::parse("[network]\ntimeout = soon\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "timeout"
        ));
    }

    #[test]
    fn test_source_without_url() {
        let err = ConfigFile::parse("[source.0]\nmax_zoom = 4\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::MissingValue { .. }));
    }

    #[test]
    fn test_mixed_formats_rejected() {
        let err = ConfigFile::parse(
            "[source.0]\nurl = http://a/{z}/{x}/{y}\nformat = raster\n\
             [source.1]\nurl = http://b/{z}/{x}/{y}\nformat = vector\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));
    }

    #[test]
    fn test_source_name_must_be_plain() {
        let err = ConfigFile::parse("[source.0]\nurl = http://a\nname = ../up\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "name"
        ));
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
    }
}
