use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "pieping";
const DEFAULT_TARGETS_FILE: &str = "targets.json";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse config {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Requests slower than this fail as a transport error
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: concat!("pieping/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to `targets.json` next to the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_path: Option<path::PathBuf>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pieping/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join(APP_DIR).join("config.toml"))
}

/// The config file to use: `optional_path` as a `.toml` file, or the
/// default location
pub fn resolve_path(optional_path: Option<impl AsRef<path::Path>>) -> Result<path::PathBuf, Error> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Probe")?;
        write_1(f, "Timeout (s)", &self.probe.timeout_seconds)?;
        write_1(f, "User Agent", &self.probe.user_agent)?;
        write_title_1(f, "Storage")?;
        match &self.storage.targets_path {
            Some(path) => write_1(f, "Targets File", &path.display())?,
            None => write_1(f, "Targets File", &"(next to config)")?,
        }

        Ok(())
    }
}

impl Config {
    /// Read `config_path`, writing the defaults there first if it is missing.
    ///
    /// Pair with [`resolve_path`] to get the default location,
    /// ~/.config/pieping/config.toml.
    pub fn load_or_create(config_path: &path::Path) -> Result<Self, Error> {
        if config_path.exists() {
            let raw_string = fs::read_to_string(config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.to_path_buf(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| Error::ParseFailed { path: config_path.to_path_buf(), source })
        } else {
            let config = Self::default();
            config.write_config(config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Where the target list lives for a config loaded from `config_path`
    pub fn targets_path(&self, config_path: &path::Path) -> path::PathBuf {
        match &self.storage.targets_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir(config_path).join(path),
            None => config_dir(config_path).join(DEFAULT_TARGETS_FILE),
        }
    }
}

fn config_dir(config_path: &path::Path) -> path::PathBuf {
    config_path.parent().map(path::Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_or_create(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_or_create(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[probe]\ntimeout_seconds = 5\n").unwrap();

        let config = Config::load_or_create(&path).unwrap();

        assert_eq!(config.probe.timeout_seconds, 5);
        assert_eq!(config.probe.user_agent, ProbeSettings::default().user_agent);
        assert_eq!(config.storage.targets_path, None);
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[probe\n").unwrap();

        assert!(matches!(Config::load_or_create(&path), Err(Error::ParseFailed { .. })));
    }

    #[test]
    fn test_resolve_path_forces_toml_extension() {
        let path = resolve_path(Some("/tmp/pieping/settings")).unwrap();
        assert_eq!(path, path::PathBuf::from("/tmp/pieping/settings.toml"));

        let path = resolve_path(Some("/tmp/pieping/config.toml")).unwrap();
        assert_eq!(path, path::PathBuf::from("/tmp/pieping/config.toml"));
    }

    #[test]
    fn test_targets_path_resolution() {
        let config_path = path::Path::new("/etc/pieping/config.toml");

        let config = Config::default();
        assert_eq!(config.targets_path(config_path), path::PathBuf::from("/etc/pieping/targets.json"));

        let mut config = Config::default();
        config.storage.targets_path = Some("data/list.json".into());
        assert_eq!(
            config.targets_path(config_path),
            path::PathBuf::from("/etc/pieping/data/list.json")
        );

        config.storage.targets_path = Some("/var/lib/pieping/targets.json".into());
        assert_eq!(
            config.targets_path(config_path),
            path::PathBuf::from("/var/lib/pieping/targets.json")
        );
    }

    #[test]
    fn test_display_lists_settings() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Timeout (s): 60"));
        assert!(rendered.contains("Targets File: (next to config)"));
    }
}
