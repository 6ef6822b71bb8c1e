//! Configuration for the Beeper CLI.
//!
//! The effective configuration is built from four layers in ascending precedence: built-in
//! defaults, the persisted file (`~/.beeper-api-cli/config.yaml`), environment variables, and
//! per-invocation flags.  A higher layer replaces a value only when its value is non-empty.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default Beeper Desktop API URL.
pub const DEFAULT_API_URL: &str = "http://localhost:39867";

/// Default output format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "json";

/// Default number of messages fetched by listing and search commands.
pub const DEFAULT_LIMIT: u32 = 20;

/// Directory under the home directory holding the config and update cache.
pub const CONFIG_DIR_NAME: &str = ".beeper-api-cli";

/// Name of the persisted config file.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the API URL.
pub const ENV_API_URL: &str = "BEEPER_API_URL";

/// Environment variable overriding the output format.
pub const ENV_OUTPUT_FORMAT: &str = "BEEPER_OUTPUT_FORMAT";

/// Environment variable carrying the API token.
pub const ENV_TOKEN: &str = "BEEPER_TOKEN";

/// Command-line arguments for the beeper tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct Args {
    /// Output format override.
    #[arrrg(optional, "Output format: json, text, markdown", "FORMAT")]
    pub output: Option<String>,

    /// API URL override.
    #[arrrg(optional, "Beeper Desktop API URL", "URL")]
    pub api_url: Option<String>,

    /// Suppress hints and update notifications.
    #[arrrg(flag, "Suppress non-essential output (hints, update notifications)")]
    pub quiet: bool,

    /// Print errors as JSON on stderr.
    #[arrrg(flag, "Output errors as JSON to stderr")]
    pub json_errors: bool,

    /// Target chat for `messages list` and `send`.
    #[arrrg(optional, "Chat ID", "CHAT_ID")]
    pub chat_id: Option<String>,

    /// Message body for `send`.
    #[arrrg(optional, "Message text to send", "TEXT")]
    pub message: Option<String>,

    /// Maximum number of messages to return.
    #[arrrg(optional, "Maximum number of results (default: 20)", "N")]
    pub limit: Option<u32>,

    /// Exercise read and search permissions in `info`.
    #[arrrg(flag, "Test API token permissions by making test requests")]
    pub test_permissions: bool,
}

impl Args {
    /// The flag layer of the configuration.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            api_url: self.api_url.clone(),
            output_format: self.output.clone(),
        }
    }
}

/// Output format for rendered entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Labeled plain text.
    Text,
    /// Markdown.
    Markdown,
    /// A format name outside the supported set.
    ///
    /// Listing renderers fall back to JSON for it; the send-result renderer rejects it.
    Unsupported(String),
}

impl OutputFormat {
    /// Maps a name onto a format without rejecting unknown names.
    pub fn from_name(name: &str) -> Self {
        name.parse()
            .unwrap_or_else(|_| OutputFormat::Unsupported(name.to_string()))
    }

    /// The canonical name.
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    /// Parse one of "json", "text", or "markdown".
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(Error::validation(format!(
                "invalid output format: {s} (must be json, text, or markdown)"
            ))),
        }
    }
}

/// One layer of configuration values; unset and empty fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLayer {
    /// The Beeper Desktop API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// The default output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl ConfigLayer {
    /// Reads the environment layer from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Reads the environment layer through a lookup function.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_url: lookup(ENV_API_URL),
            output_format: lookup(ENV_OUTPUT_FORMAT),
        }
    }

    /// Returns this layer overlaid with the non-empty values of `over`.
    pub fn merge(&self, over: &ConfigLayer) -> ConfigLayer {
        fn pick(base: &Option<String>, over: &Option<String>) -> Option<String> {
            match over {
                Some(value) if !value.is_empty() => Some(value.clone()),
                _ => base.clone(),
            }
        }
        ConfigLayer {
            api_url: pick(&self.api_url, &over.api_url),
            output_format: pick(&self.output_format, &over.output_format),
        }
    }
}

/// The effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The Beeper Desktop API URL; never empty after [`resolve`].
    pub api_url: String,

    /// The output format name; never empty after [`resolve`].
    pub output_format: String,
}

impl Config {
    /// Creates a Config with the built-in defaults.
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Checks that the URL is set and the format is supported.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(Error::config("api_url cannot be empty"));
        }
        if self.output_format.parse::<OutputFormat>().is_err() {
            return Err(Error::config(format!(
                "invalid output format: {} (must be json, text, or markdown)",
                self.output_format
            )));
        }
        Ok(())
    }

    /// The output format, lenient about unknown names.
    pub fn format(&self) -> OutputFormat {
        OutputFormat::from_name(&self.output_format)
    }

    /// This configuration as a layer, e.g. for saving.
    pub fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            api_url: Some(self.api_url.clone()),
            output_format: Some(self.output_format.clone()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves defaults < file < environment < flags into the effective configuration.
pub fn resolve(file: &ConfigLayer, env: &ConfigLayer, flags: &ConfigLayer) -> Config {
    let merged = Config::new().to_layer().merge(file).merge(env).merge(flags);
    let defaults = Config::new();
    Config {
        api_url: merged.api_url.unwrap_or(defaults.api_url),
        output_format: merged.output_format.unwrap_or(defaults.output_format),
    }
}

/// The directory holding the config file and the update cache.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// The default config file path.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the file layer; a missing file is an empty layer.
pub fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ConfigLayer::default());
        }
        Err(err) => {
            return Err(Error::config(format!(
                "failed to read config file {}: {err}",
                path.display()
            ))
            .with_source(err));
        }
    };
    if contents.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    serde_yaml::from_str(&contents).map_err(|err| {
        Error::config(format!("failed to parse config file {}: {err}", path.display()))
            .with_hint(format!(
                "Check your configuration with 'beeper config show'. Edit {} if needed.",
                path.display()
            ))
            .with_source(err)
    })
}

/// Writes a layer to the config file, creating its directory.
pub fn save_config_file(path: &Path, layer: &ConfigLayer) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|err| {
            Error::config(format!("failed to create config directory: {err}")).with_source(err)
        })?;
    }
    let yaml = serde_yaml::to_string(layer).map_err(|err| {
        Error::config(format!("failed to serialize config: {err}")).with_source(err)
    })?;
    fs::write(path, yaml).map_err(|err| {
        Error::config(format!("failed to write config: {err}")).with_source(err)
    })
}

/// Merges `update` into the persisted file and saves the result.
///
/// An unreadable existing file is replaced as if it held the defaults.
pub fn update_config_file(path: &Path, update: &ConfigLayer) -> Result<ConfigLayer> {
    let existing = load_config_file(path).unwrap_or_else(|err| {
        debug!("discarding unreadable config file: {err}");
        Config::new().to_layer()
    });
    let merged = Config::new().to_layer().merge(&existing).merge(update);
    save_config_file(path, &merged)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn layer(api_url: Option<&str>, output_format: Option<&str>) -> ConfigLayer {
        ConfigLayer {
            api_url: api_url.map(String::from),
            output_format: output_format.map(String::from),
        }
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.api_url, "http://localhost:39867");
        assert_eq!(config.output_format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unset_everywhere_falls_back_to_defaults() {
        let empty = ConfigLayer::default();
        assert_eq!(resolve(&empty, &empty, &empty), Config::new());
    }

    #[test]
    fn precedence_flags_over_env_over_file() {
        let file = layer(Some("http://file:1"), Some("text"));
        let env = layer(Some("http://env:2"), None);
        let flags = layer(None, Some("markdown"));
        let config = resolve(&file, &env, &flags);
        assert_eq!(config.api_url, "http://env:2");
        assert_eq!(config.output_format, "markdown");

        let flags = layer(Some("http://flag:3"), None);
        let config = resolve(&file, &env, &flags);
        assert_eq!(config.api_url, "http://flag:3");
        assert_eq!(config.output_format, "text");
    }

    #[test]
    fn empty_values_inherit_from_below() {
        let file = layer(Some("http://file:1"), Some("text"));
        let env = layer(Some(""), Some(""));
        let flags = layer(Some(""), None);
        let config = resolve(&file, &env, &flags);
        assert_eq!(config.api_url, "http://file:1");
        assert_eq!(config.output_format, "text");

        let config = resolve(&layer(Some(""), None), &env, &flags);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = Config {
            api_url: String::new(),
            output_format: "json".to_string(),
        };
        assert_eq!(config.validate().unwrap_err().category(), ErrorCategory::Config);

        let config = Config {
            api_url: DEFAULT_API_URL.to_string(),
            output_format: "yaml".to_string(),
        };
        assert!(config.validate().is_err());
        assert_eq!(config.format(), OutputFormat::Unsupported("yaml".to_string()));
    }

    #[test]
    fn env_layer_reads_variables() {
        let env = ConfigLayer::from_vars(|name| match name {
            ENV_API_URL => Some("http://localhost:40000".to_string()),
            _ => None,
        });
        assert_eq!(env, layer(Some("http://localhost:40000"), None));
    }

    #[test]
    fn args_become_flag_layer() {
        let args = Args {
            output: Some("text".to_string()),
            ..Args::default()
        };
        assert_eq!(args.overrides(), layer(None, Some("text")));
    }

    #[test]
    fn file_round_trip_and_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        assert_eq!(load_config_file(&path).unwrap(), ConfigLayer::default());

        let saved = update_config_file(&path, &layer(Some("http://localhost:40001"), None)).unwrap();
        assert_eq!(saved, layer(Some("http://localhost:40001"), Some("json")));

        let saved = update_config_file(&path, &layer(None, Some("markdown"))).unwrap();
        assert_eq!(saved, layer(Some("http://localhost:40001"), Some("markdown")));
        assert_eq!(load_config_file(&path).unwrap(), saved);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("api_url: http://localhost:40001"));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "api_url: [unterminated").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.hint().unwrap_or_default().contains("config.yaml"));
    }
}
