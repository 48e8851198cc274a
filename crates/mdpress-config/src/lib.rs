//! Configuration management for mdpress.
//!
//! Parses `mdpress.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override docs source directory.
    pub source_dir: Option<PathBuf>,
    /// Override rendered output directory.
    pub output_dir: Option<PathBuf>,
    /// Override watch enabled flag.
    pub watch_enabled: Option<bool>,
    /// Override the settle delay applied before reading a changed file.
    pub settle_delay_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mdpress.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preview server configuration.
    pub server: ServerConfig,
    /// Documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Watch mode configuration.
    pub watch: WatchConfig,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Preview server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
        }
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    dir: Option<String>,
    output_dir: Option<String>,
}

/// Resolved documentation configuration with absolute paths.
#[derive(Debug, Default, Clone)]
pub struct DocsConfig {
    /// Source directory for markdown files.
    pub source_dir: PathBuf,
    /// Output directory for rendered pages.
    pub output_dir: PathBuf,
}

/// Watch mode configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether watch mode is enabled for `mdpress dev`.
    pub enabled: bool,
    /// Delay in milliseconds before reading a changed file, so editors that
    /// write in multiple steps have finished.
    pub settle_delay_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_ms: 100,
        }
    }
}

impl WatchConfig {
    /// Settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable error in {field}: {message}")]
    EnvVar { field: String, message: String },
}

impl Config {
    /// Load configuration.
    ///
    /// When `explicit` is given, that file is loaded and a read failure is an
    /// error. Otherwise `mdpress.toml` is searched upward from the current
    /// directory, falling back to defaults when no file is found.
    ///
    /// CLI settings are applied after parsing and before path resolution.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read, parse or env expansion failure.
    pub fn load(
        explicit: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let found = match explicit {
            Some(path) => Some((std::fs::read_to_string(path)?, path.to_path_buf())),
            None => discover_config()?,
        };

        let mut config = match &found {
            Some((content, path)) => {
                let mut config: Self = toml::from_str(content)?;
                config.config_path = Some(path.clone());
                config
            }
            None => Self {
                config_path: None,
                ..Self::default()
            },
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.server.host = expand::expand_env(&config.server.host, "server.host")?;
        config.resolve_paths();

        Ok(config)
    }

    /// Default configuration with paths resolved against `base`.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            server: ServerConfig::default(),
            docs: DocsConfigRaw::default(),
            watch: WatchConfig::default(),
            docs_resolved: DocsConfig::default(),
            config_path: None,
        };
        config.docs_resolved = DocsConfig {
            source_dir: base.join("docs"),
            output_dir: base.join("dist"),
        };
        config
    }

    /// Apply CLI overrides to the parsed values.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(dir) = &settings.source_dir {
            self.docs.dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(dir) = &settings.output_dir {
            self.docs.output_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(enabled) = settings.watch_enabled {
            self.watch.enabled = enabled;
        }
        if let Some(delay) = settings.settle_delay_ms {
            self.watch.settle_delay_ms = delay;
        }
    }

    /// Resolve relative path options against the config file directory, or
    /// the current directory when no config file was found.
    fn resolve_paths(&mut self) {
        let base = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(
                || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
                Path::to_path_buf,
            );

        let dir = self.docs.dir.as_deref().unwrap_or("docs");
        let output_dir = self.docs.output_dir.as_deref().unwrap_or("dist");
        self.docs_resolved = DocsConfig {
            source_dir: base.join(dir),
            output_dir: base.join(output_dir),
        };
    }
}

/// Search for `mdpress.toml` upward from the current directory.
fn discover_config() -> Result<Option<(String, PathBuf)>, ConfigError> {
    let Ok(mut dir) = std::env::current_dir() else {
        return Ok(None);
    };

    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.is_file() {
            let content = std::fs::read_to_string(&candidate)?;
            return Ok(Some((content, candidate)));
        }
        if !dir.pop() {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Config {
        let mut config: Config = toml::from_str(content).unwrap();
        config.resolve_paths();
        config
    }

    #[test]
    fn test_defaults() {
        let config = parse("");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.watch.enabled);
        assert_eq!(config.watch.settle_delay_ms, 100);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
            [docs]
            dir = "manual"
            output_dir = "public"

            [server]
            host = "0.0.0.0"
            port = 4000

            [watch]
            enabled = false
            settle_delay_ms = 250
            "#,
        );

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert!(!config.watch.enabled);
        assert_eq!(config.watch.settle_delay_ms, 250);
        assert!(config.docs_resolved.source_dir.ends_with("manual"));
        assert!(config.docs_resolved.output_dir.ends_with("public"));
    }

    #[test]
    fn test_default_docs_dirs() {
        let config = parse("[server]\nport = 8080\n");

        assert!(config.docs_resolved.source_dir.ends_with("docs"));
        assert!(config.docs_resolved.output_dir.ends_with("dist"));
    }

    #[test]
    fn test_settle_delay_duration() {
        let config = parse("[watch]\nsettle_delay_ms = 50\n");

        assert_eq!(config.watch.settle_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_cli_settings_override() {
        let mut config: Config = toml::from_str("[server]\nport = 4000\n").unwrap();
        let settings = CliSettings {
            host: Some("localhost".to_owned()),
            port: Some(5000),
            source_dir: Some(PathBuf::from("content")),
            output_dir: None,
            watch_enabled: Some(false),
            settle_delay_ms: Some(10),
        };

        config.apply_cli_settings(&settings);
        config.resolve_paths();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 5000);
        assert!(config.docs_resolved.source_dir.ends_with("content"));
        assert!(config.docs_resolved.output_dir.ends_with("dist"));
        assert!(!config.watch.enabled);
        assert_eq!(config.watch.settle_delay_ms, 10);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdpress.toml");
        std::fs::write(&path, "[server]\nport = 9999\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.docs_resolved.source_dir, dir.path().join("docs"));
    }

    #[test]
    fn test_load_explicit_missing_file_is_error() {
        let result = Config::load(Some(Path::new("/nonexistent/mdpress.toml")), None);

        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdpress.toml");
        std::fs::write(&path, "[server\nport = 1\n").unwrap();

        let result = Config::load(Some(&path), None);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_default_with_base() {
        let config = Config::default_with_base(Path::new("/srv/site"));

        assert_eq!(config.docs_resolved.source_dir, Path::new("/srv/site/docs"));
        assert_eq!(config.docs_resolved.output_dir, Path::new("/srv/site/dist"));
    }
}
