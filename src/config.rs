//! Layered settings resolution.
//!
//! Settings come from four layers, highest precedence first:
//!
//! 1. command-line flags
//! 2. environment variables
//! 3. a YAML config file
//! 4. built-in defaults
//!
//! Each of the first three is an explicit [`SettingsLayer`] value and
//! [`resolve`] is a pure function over them. The process environment is
//! read exactly once, into an [`Environment`] snapshot, by the binary.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Model used when no layer names one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// API base URL used when no layer names one.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Action used when no layer names one.
pub const DEFAULT_ACTION: &str = "Summarize this text";

/// Config file name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Project subdirectory under the user config root.
pub const CONFIG_DIR_NAME: &str = "llm-apply";

/// Environment variable names.
pub mod env_vars {
    /// API key.
    pub const API_KEY: &str = "API_KEY";
    /// API key fallback, consulted only when `API_KEY` is unset.
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    /// Model identifier.
    pub const MODEL: &str = "MODEL";
    /// API base URL.
    pub const API_BASE_URL: &str = "API_BASE_URL";
    /// Action text.
    pub const ACTION: &str = "ACTION";
    /// In-place flag.
    pub const IN_PLACE: &str = "IN_PLACE";
    /// User config root.
    pub const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
}

static TRUTHY: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["true", "1", "yes", "on"].into_iter().collect());

/// Interprets a textual flag value. Case-insensitive; anything outside
/// `true`, `1`, `yes`, `on` is false.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    TRUTHY.contains(value.trim().to_ascii_lowercase().as_str())
}

/// Snapshot of the process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Captures the current process environment. Non-UTF-8 entries are dropped.
    #[must_use]
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Builds an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value of `key`, treating an empty value as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// One layer of optional settings values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    /// API key
    pub api_key: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// API base URL
    pub api_base_url: Option<String>,
    /// Action text (system prompt)
    pub action: Option<String>,
    /// In-place mode
    #[serde(deserialize_with = "deserialize_flag")]
    pub in_place: Option<bool>,
}

/// YAML accepts `in_place: true` as well as `in_place: "yes"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FlagValue>::deserialize(deserializer)?.map(|v| match v {
        FlagValue::Bool(b) => b,
        FlagValue::Text(s) => parse_flag(&s),
    }))
}

impl SettingsLayer {
    /// Loads the YAML file layer.
    ///
    /// A missing or blank file is an empty layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but cannot be read or
    /// is not a YAML mapping of the recognized keys.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::from_yaml_str(&content)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Parses a YAML mapping into a layer.
    ///
    /// # Errors
    ///
    /// Returns an error message if the document is not a valid mapping.
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<Self>>(content)
            .map(Option::unwrap_or_default)
            .map_err(|e| e.to_string())
    }

    /// Builds the environment layer.
    #[must_use]
    pub fn from_env(env: &Environment) -> Self {
        let owned = |key: &str| env.get(key).map(str::to_string);
        Self {
            api_key: owned(env_vars::API_KEY).or_else(|| owned(env_vars::OPENAI_API_KEY)),
            model: owned(env_vars::MODEL),
            api_base_url: owned(env_vars::API_BASE_URL),
            action: owned(env_vars::ACTION),
            in_place: env.get(env_vars::IN_PLACE).map(parse_flag),
        }
    }
}

/// Effective settings for one run.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Settings {
    /// API key, never logged
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// API base URL
    pub api_base_url: String,
    /// Action text sent as the system prompt
    pub action: String,
    /// Overwrite files instead of printing the result
    pub in_place: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("action", &self.action)
            .field("in_place", &self.in_place)
            .finish()
    }
}

impl Settings {
    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `api_key` or `model` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config(format!(
                "API key is not set. Set {} or api_key in the config file",
                env_vars::API_KEY
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        Ok(())
    }
}

/// Merges the three layers over the built-in defaults.
///
/// # Errors
///
/// Returns [`Error::Config`] if the merged settings fail validation.
pub fn resolve(file: SettingsLayer, env: SettingsLayer, cli: SettingsLayer) -> Result<Settings> {
    fn pick(cli: Option<String>, env: Option<String>, file: Option<String>) -> Option<String> {
        let set = |v: Option<String>| v.filter(|s| !s.is_empty());
        set(cli).or_else(|| set(env)).or_else(|| set(file))
    }

    let settings = Settings {
        api_key: pick(cli.api_key, env.api_key, file.api_key).unwrap_or_default(),
        model: pick(cli.model, env.model, file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_base_url: pick(cli.api_base_url, env.api_base_url, file.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        action: pick(cli.action, env.action, file.action)
            .unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        in_place: cli.in_place.or(env.in_place).or(file.in_place).unwrap_or(false),
    };

    settings.validate()?;
    Ok(settings)
}

/// Finds the config file and resolves settings against it.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: Environment,
    cwd: PathBuf,
}

impl ConfigResolver {
    /// Creates a resolver over an environment snapshot and working directory.
    #[must_use]
    pub fn new(env: Environment, cwd: impl Into<PathBuf>) -> Self {
        Self {
            env,
            cwd: cwd.into(),
        }
    }

    /// Resolves settings from `cli`, the environment and the config file `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config file is malformed or a
    /// required setting is missing after all layers are applied.
    pub fn resolve(&self, cli: SettingsLayer, name: &Path) -> Result<Settings> {
        let file = match self.locate(name) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                SettingsLayer::from_yaml_file(&path)?
            }
            None => SettingsLayer::default(),
        };
        let env = SettingsLayer::from_env(&self.env);

        let settings = resolve(file, env, cli)?;
        debug!(?settings, "Resolved settings");
        Ok(settings)
    }

    /// Returns the first existing config file among the candidate locations.
    #[must_use]
    pub fn locate(&self, name: &Path) -> Option<PathBuf> {
        self.candidates(name).into_iter().find(|p| p.is_file())
    }

    fn candidates(&self, name: &Path) -> Vec<PathBuf> {
        if name.is_absolute() {
            return vec![name.to_path_buf()];
        }

        let mut candidates = vec![self.cwd.join(name)];
        if let Some(root) = self.config_root() {
            candidates.push(root.join(name));
            candidates.push(root.join(CONFIG_DIR_NAME).join(name));
        }
        candidates
    }

    /// `XDG_CONFIG_HOME` if set, otherwise the platform config directory.
    fn config_root(&self) -> Option<PathBuf> {
        match self.env.get(env_vars::XDG_CONFIG_HOME) {
            Some(dir) => Some(expand_tilde(dir)),
            None => dirs::config_dir(),
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
