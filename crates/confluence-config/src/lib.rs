//! Credential and settings loader for the confluence-attach toolkit.
//!
//! Layers are merged from lowest to highest precedence:
//! built-in defaults → TOML config file → `.env` file → process environment.
//! Only `CONFLUENCE_*` keys are read from the environment layers, and a
//! `.env` entry never shadows a variable already present in the process
//! environment.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".confluence-attach.toml";
pub const DOTENV_FILE_NAME: &str = ".env";

pub const ENV_URL: &str = "CONFLUENCE_URL";
pub const ENV_USERNAME: &str = "CONFLUENCE_USERNAME";
pub const ENV_API_TOKEN: &str = "CONFLUENCE_API_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "CONFLUENCE_TIMEOUT_SECS";

const ENV_PREFIX: &str = "CONFLUENCE_";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_VERSION_MESSAGE: &str = "Embed image attachment";

/// Complete configuration resolved from every layer.
#[derive(Clone, Debug)]
pub struct Config {
    pub confluence: ConfluenceSettings,
    pub http: HttpSettings,
    pub embed: EmbedSettings,
    pub sources: ConfigSources,
}

/// Connection settings. Any of them may still be missing at this point;
/// see [`Config::credentials`].
#[derive(Clone, Default)]
pub struct ConfluenceSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
}

impl fmt::Debug for ConfluenceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub timeout: Duration,
}

/// Defaults for the page update written by `embed`.
#[derive(Clone, Debug)]
pub struct EmbedSettings {
    pub message: String,
    pub minor_edit: bool,
}

/// Validated credentials for HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
}

impl Credentials {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Credentials {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            api_token: api_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Provenance of every layer that contributed to the configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
}

impl ConfigSource {
    fn new(kind: ConfigSourceKind, path: Option<PathBuf>) -> Self {
        ConfigSource { kind, path }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at {}", self.kind, path.display()),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    File,
    DotEnv,
    Environment,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "built-in defaults",
            ConfigSourceKind::File => "config file",
            ConfigSourceKind::DotEnv => "dotenv file",
            ConfigSourceKind::Environment => "process environment",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    /// Replaces the process environment when set.
    pub env_vars: Option<BTreeMap<String, String>>,
}

impl LoadOptions {
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {}: {source}", .attempted.display())]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("config file {} not found", .path.display())]
    FileNotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key} ({origin})")]
    InvalidValue {
        key: String,
        value: String,
        origin: ConfigSource,
    },
    #[error(
        "missing {}: set CONFLUENCE_URL, CONFLUENCE_USERNAME, CONFLUENCE_API_TOKEN (env, .env or .confluence-attach.toml)",
        .missing.join(", ")
    )]
    MissingCredentials { missing: Vec<&'static str> },
}

impl Config {
    /// Loads every layer and returns the merged settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let mut layers = vec![ConfigSource::new(ConfigSourceKind::Default, None)];
        let mut merged = PartialConfig::defaults();

        let config_path = match options.config_path {
            Some(path) => {
                let path = make_absolute(&path, &working_dir);
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound { path });
                }
                Some(path)
            }
            None => Some(working_dir.join(CONFIG_FILE_NAME)).filter(|path| path.is_file()),
        };
        if let Some(path) = config_path {
            let source = ConfigSource::new(ConfigSourceKind::File, Some(path.clone()));
            merged.merge(load_file_layer(&path)?);
            layers.push(source);
        }

        let process_env = match options.env_vars {
            Some(vars) => vars,
            None => env::vars().collect(),
        };

        let env_file = match options.env_file {
            Some(path) => {
                let path = make_absolute(&path, &working_dir);
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound { path });
                }
                Some(path)
            }
            None => Some(working_dir.join(DOTENV_FILE_NAME)).filter(|path| path.is_file()),
        };
        if let Some(path) = env_file {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let source = ConfigSource::new(ConfigSourceKind::DotEnv, Some(path));
            let entries: BTreeMap<String, String> = parse_dotenv(&contents)
                .into_iter()
                .filter(|(key, _)| {
                    process_env
                        .get(key)
                        .map_or(true, |value| value.trim().is_empty())
                })
                .collect();
            merged.merge(PartialConfig::from_env(&entries, &source)?);
            layers.push(source);
        }

        let source = ConfigSource::new(ConfigSourceKind::Environment, None);
        merged.merge(PartialConfig::from_env(&process_env, &source)?);
        layers.push(source);

        Ok(merged.finalize(ConfigSources {
            working_directory: working_dir,
            layers,
        }))
    }

    /// Returns credentials, naming every variable that is still unset.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let settings = &self.confluence;
        let mut missing = Vec::new();
        if settings.url.is_none() {
            missing.push(ENV_URL);
        }
        if settings.username.is_none() {
            missing.push(ENV_USERNAME);
        }
        if settings.api_token.is_none() {
            missing.push(ENV_API_TOKEN);
        }

        match (&settings.url, &settings.username, &settings.api_token) {
            (Some(url), Some(username), Some(token)) => {
                Ok(Credentials::new(url.as_str(), username.as_str(), token.as_str()))
            }
            _ => Err(ConfigError::MissingCredentials { missing }),
        }
    }
}

/// Parses `KEY=value` lines, keeping only `CONFLUENCE_*` keys.
///
/// Blank lines, `#` comments and lines without `=` are skipped; surrounding
/// quote characters are stripped from values.
pub fn parse_dotenv(contents: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !key.starts_with(ENV_PREFIX) {
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
        entries.insert(key.to_string(), value.to_string());
    }
    entries
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_file_layer(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })?;
    let source = ConfigSource::new(ConfigSourceKind::File, Some(path.into()));
    raw.into_partial(&source)
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    url: Option<String>,
    username: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
    message: Option<String>,
    minor_edit: Option<bool>,
}

impl PartialConfig {
    fn defaults() -> Self {
        PartialConfig {
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            message: Some(DEFAULT_VERSION_MESSAGE.to_string()),
            minor_edit: Some(true),
            ..PartialConfig::default()
        }
    }

    fn from_env(
        vars: &BTreeMap<String, String>,
        source: &ConfigSource,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let timeout_secs = get(ENV_TIMEOUT_SECS)
            .map(|raw| parse_timeout(ENV_TIMEOUT_SECS, &raw, source))
            .transpose()?;

        Ok(PartialConfig {
            url: get(ENV_URL),
            username: get(ENV_USERNAME),
            api_token: get(ENV_API_TOKEN),
            timeout_secs,
            ..PartialConfig::default()
        })
    }

    fn merge(&mut self, other: PartialConfig) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.api_token.is_some() {
            self.api_token = other.api_token;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.message.is_some() {
            self.message = other.message;
        }
        if other.minor_edit.is_some() {
            self.minor_edit = other.minor_edit;
        }
    }

    fn finalize(self, sources: ConfigSources) -> Config {
        Config {
            confluence: ConfluenceSettings {
                url: self.url.map(|url| url.trim_end_matches('/').to_string()),
                username: self.username,
                api_token: self.api_token,
            },
            http: HttpSettings {
                timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            },
            embed: EmbedSettings {
                message: self
                    .message
                    .unwrap_or_else(|| DEFAULT_VERSION_MESSAGE.to_string()),
                minor_edit: self.minor_edit.unwrap_or(true),
            },
            sources,
        }
    }
}

fn parse_timeout(key: &str, raw: &str, source: &ConfigSource) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            origin: source.clone(),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    confluence: Option<RawConfluence>,
    #[serde(default)]
    http: Option<RawHttp>,
    #[serde(default)]
    embed: Option<RawEmbed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfluence {
    url: Option<String>,
    username: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHttp {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEmbed {
    message: Option<String>,
    minor_edit: Option<bool>,
}

impl RawConfig {
    fn into_partial(self, source: &ConfigSource) -> Result<PartialConfig, ConfigError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let mut partial = PartialConfig::default();

        if let Some(confluence) = self.confluence {
            partial.url = non_empty(confluence.url);
            partial.username = non_empty(confluence.username);
            partial.api_token = non_empty(confluence.api_token);
        }
        if let Some(http) = self.http {
            if http.timeout_secs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    key: "http.timeout_secs".to_string(),
                    value: "0".to_string(),
                    origin: source.clone(),
                });
            }
            partial.timeout_secs = http.timeout_secs;
        }
        if let Some(embed) = self.embed {
            partial.message = non_empty(embed.message);
            partial.minor_edit = embed.minor_edit;
        }

        Ok(partial)
    }
}
