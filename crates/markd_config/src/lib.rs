use directories::ProjectDirs;
use markd_core::render::RenderOptions;
use markd_core::theme::{Theme, UnknownTheme};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_HOST: &str = "MARKD_HOST";
pub const ENV_PORT: &str = "MARKD_PORT";
pub const ENV_THEME: &str = "MARKD_THEME";
pub const ENV_LOG_LEVEL: &str = "MARKD_LOG_LEVEL";

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Lowest port accepted, privileged ports are refused.
pub const MIN_PORT: u16 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid port `{0}`, expected a number between 1024 and 65535")]
    InvalidPort(String),
    #[error("port {0} is out of range, expected a number between 1024 and 65535")]
    PortOutOfRange(u16),
    #[error(transparent)]
    InvalidTheme(#[from] UnknownTheme),
    #[error("invalid log level `{0}`, expected one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

pub struct LoadedConfig {
    pub config: Config,
    pub file_path: PathBuf,
    pub maybe_error: Option<toml::de::Error>,
}

/// Location of the config file when none is given on the command line.
///
/// Linux: ~/.config/markd/config.toml
/// macOS: ~/Library/Application Support/rs.markd.markd/config.toml
pub fn default_config_file() -> PathBuf {
    ProjectDirs::from("rs", "markd", "markd")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("markd.toml"))
}

/// Reads the config file, falling back to the defaults.
///
/// A missing file is not an error. A malformed one yields the defaults and
/// the parse error, the caller decides how loudly to report it.
pub fn load_config(specified_config_file: Option<PathBuf>) -> LoadedConfig {
    let config_file = specified_config_file.unwrap_or_else(default_config_file);

    let mut maybe_config_err = None;
    let config = match std::fs::read_to_string(&config_file) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            maybe_config_err.replace(err);
            Config::default()
        }),
        Err(_) => Config::default(),
    };

    LoadedConfig {
        config,
        file_path: config_file,
        maybe_error: maybe_config_err,
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Log configuration.
    pub log: LogConfig,

    /// Preview server configuration.
    pub server: ServerConfig,

    /// Rendering configuration, shared by the server and the exporter.
    pub render: RenderConfig,

    /// File watcher configuration.
    pub watcher: WatcherConfig,

    /// Static export configuration.
    pub export: ExportConfig,
}

impl Config {
    /// Applies the `MARKD_*` variables on top of the loaded values.
    ///
    /// `lookup` is `std::env::var` in production, tests pass a map.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        if let Some(theme) = lookup(ENV_THEME) {
            self.render.theme = theme.parse()?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.max_level = level.trim().to_ascii_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port < MIN_PORT {
            return Err(ConfigError::PortOutOfRange(self.server.port));
        }
        if !LOG_LEVELS.contains(&self.log.max_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.max_level.clone()));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
    /// Specify the log file path.
    ///
    /// Logs go to stderr when unset.
    pub log_file: Option<String>,

    /// Specify the max log level.
    pub max_level: String,

    /// Specify the log target to enable more detailed logging.
    ///
    /// ```toml
    /// [log]
    /// log-target = "markd_core::watcher=trace,markd_server=debug"
    /// ```
    pub log_target: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_level: "info".into(),
            log_target: "".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Open the preview in the default browser once bound.
    pub open_browser: bool,

    /// Push reloads to connected browsers when files change.
    pub live_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            open_browser: true,
            live_reload: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Default theme when the browser has no stored preference.
    pub theme: Theme,

    /// Render a table of contents sidebar.
    pub toc: bool,

    /// Deepest heading level listed in the table of contents.
    pub toc_depth: u8,

    /// Render ```mermaid fences as diagrams.
    pub diagrams: bool,

    /// Typeset math with KaTeX.
    pub math: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            toc: true,
            toc_depth: 3,
            diagrams: true,
            math: true,
        }
    }
}

impl RenderConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            theme: self.theme,
            toc: self.toc,
            toc_depth: self.toc_depth,
            diagrams_enabled: self.diagrams,
            math_enabled: self.math,
            ..RenderOptions::gfm()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Quiet period in milliseconds before a burst of edits is reported.
    pub debounce_ms: u64,

    /// Polling interval in milliseconds when native watching is unavailable.
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            poll_interval_ms: 1000,
        }
    }
}

impl WatcherConfig {
    pub fn to_watcher_config(&self) -> markd_core::watcher::WatcherConfig {
        markd_core::watcher::WatcherConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Minify exported pages.
    pub minify: bool,

    /// Output directory used when none is given on the command line.
    pub output_dir: Option<String>,
}
