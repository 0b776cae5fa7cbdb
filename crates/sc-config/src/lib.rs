//! Configuration for the `sc` directive expander.
//!
//! Parses `sc.toml` files with serde and discovers them in the current
//! directory or its parents. CLI settings are applied on top during load
//! via [`CliSettings`].
//!
//! ```toml
//! [engine]
//! prefix = "OFI_"
//! max_levels = 100
//! value_preview_chars = 50
//! wrap_output = true
//!
//! [handlers]
//! dir = "${SC_HANDLERS:-handlers}"
//! extension = "txt"
//! ```
//!
//! `handlers.dir` supports `${VAR}` and `${VAR:-default}` expansion and is
//! resolved relative to the config file.

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "sc.toml";

const DEFAULT_MAX_LEVELS: u32 = 100;
const DEFAULT_VALUE_PREVIEW_CHARS: usize = 50;
const DEFAULT_HANDLERS_DIR: &str = "handlers";
const DEFAULT_EXTENSION: &str = "txt";

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override handler name prefix.
    pub prefix: Option<String>,
    /// Override handler template directory.
    pub handlers_dir: Option<PathBuf>,
    /// Override nesting limit.
    pub max_levels: Option<u32>,
    /// Override output wrapping.
    pub wrap_output: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings.
    pub engine: EngineSection,
    #[serde(default)]
    handlers: HandlersConfigRaw,

    /// Resolved handler configuration (set after loading).
    #[serde(skip)]
    pub handlers_resolved: HandlersConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// `[engine]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Prefix prepended to directive names for handler lookup.
    pub prefix: String,
    /// Maximum number of levels before the run is aborted.
    pub max_levels: u32,
    /// Number of value characters kept in the execution ledger.
    pub value_preview_chars: usize,
    /// Whether substituted output is wrapped in level markers.
    pub wrap_output: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_levels: DEFAULT_MAX_LEVELS,
            value_preview_chars: DEFAULT_VALUE_PREVIEW_CHARS,
            wrap_output: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HandlersConfigRaw {
    dir: Option<String>,
    extension: Option<String>,
}

/// Resolved handler template configuration.
#[derive(Debug, PartialEq, Eq)]
pub struct HandlersConfig {
    /// Directory holding one template file per handler.
    pub dir: PathBuf,
    /// Template file extension, without the dot.
    pub extension: String,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_HANDLERS_DIR),
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }
}

impl HandlersConfig {
    /// Template path for a prefixed handler name.
    #[must_use]
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`handlers.dir`").
        field: String,
        /// Error message (e.g., "${`SC_HANDLERS`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_positive(value: usize, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `sc.toml` in the current directory and its parents, falling back
    /// to defaults relative to the current directory.
    ///
    /// CLI settings are applied last and validated with the rest.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(prefix) = &settings.prefix {
            self.engine.prefix.clone_from(prefix);
        }
        if let Some(dir) = &settings.handlers_dir {
            self.handlers_resolved.dir.clone_from(dir);
        }
        if let Some(max_levels) = settings.max_levels {
            self.engine.max_levels = max_levels;
        }
        if let Some(wrap_output) = settings.wrap_output {
            self.engine.wrap_output = wrap_output;
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            engine: EngineSection::default(),
            handlers: HandlersConfigRaw::default(),
            handlers_resolved: HandlersConfig {
                dir: base.join(DEFAULT_HANDLERS_DIR),
                extension: DEFAULT_EXTENSION.to_owned(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_handlers(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bad) = self
            .engine
            .prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(ConfigError::Validation(format!(
                "engine.prefix contains invalid character {bad:?}"
            )));
        }
        if self.engine.max_levels == 0 {
            return Err(ConfigError::Validation(
                "engine.max_levels must be greater than 0".to_owned(),
            ));
        }
        require_positive(
            self.engine.value_preview_chars,
            "engine.value_preview_chars",
        )?;
        require_non_empty(&self.handlers_resolved.extension, "handlers.extension")?;
        Ok(())
    }

    /// Expand environment variables and resolve the handler directory
    /// against the config file's directory.
    fn resolve_handlers(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let dir = match &self.handlers.dir {
            Some(dir) => expand::expand_env(dir, "handlers.dir")?,
            None => DEFAULT_HANDLERS_DIR.to_owned(),
        };
        let extension = self
            .handlers
            .extension
            .as_deref()
            .unwrap_or(DEFAULT_EXTENSION)
            .trim_start_matches('.')
            .to_owned();

        self.handlers_resolved = HandlersConfig {
            dir: config_dir.join(dir),
            extension,
        };
        Ok(())
    }
}
