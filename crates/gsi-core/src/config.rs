//! Configuration loading and typed config structures for the GSI server.
//!
//! Configuration lives in an optional `gsi-config.yaml`. Every field has a
//! default, so an absent or empty file yields a working server on port
//! 3000 with no token enforcement. Environment variables override the
//! file:
//!
//! - `GSI_HOST` overrides `server.host`
//! - `GSI_PORT` overrides `server.port`
//! - `GSI_TOKENS` overrides `tokens` (comma separated; empty disables auth)
//! - `GSI_SECTIONS` overrides `sections` (comma separated)

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held a value that could not be parsed.
    #[error("invalid value for {var}: {message}")]
    InvalidEnv {
        /// Name of the offending variable.
        var: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GsiConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Credentials a snapshot must present. Accepts a single string, a
    /// list of strings, or nothing at all.
    #[serde(default)]
    pub tokens: TokenPolicy,

    /// Sections inspected for changes, in emission order. A section may be
    /// a colon-delimited path such as `abilities:ability0`.
    #[serde(default = "default_sections")]
    pub sections: Vec<String>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GsiConfig {
    /// Load configuration from a YAML file at the given path, then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override is unparseable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults.
    /// Environment overrides apply in both cases.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. Environment overrides are
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GSI_HOST") {
            self.server.host = host;
        }
        if let Some(raw) = lookup("GSI_PORT") {
            self.server.port = raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                var: "GSI_PORT".to_owned(),
                message: format!("{e}"),
            })?;
        }
        if let Some(raw) = lookup("GSI_TOKENS") {
            self.tokens = TokenPolicy::from_tokens(split_list(&raw));
        }
        if let Some(raw) = lookup("GSI_SECTIONS") {
            self.sections = split_list(&raw);
        }
        Ok(())
    }
}

impl Default for GsiConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            tokens: TokenPolicy::Open,
            sections: default_sections(),
            logging: LoggingConfig::default(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port the game client posts to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Which credentials a snapshot must carry to be accepted.
///
/// Resolved once from configuration; requests only ever compare strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<RawTokens>")]
pub enum TokenPolicy {
    /// No credential is required.
    #[default]
    Open,
    /// Exactly this credential is accepted.
    Single(String),
    /// Any member of this set is accepted.
    AnyOf(BTreeSet<String>),
}

impl TokenPolicy {
    /// Build a policy from a list of tokens. Empty tokens are ignored; an
    /// empty list means no enforcement.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.is_empty())
            .collect();
        match set.len() {
            0 => Self::Open,
            1 => set.pop_first().map_or(Self::Open, Self::Single),
            _ => Self::AnyOf(set),
        }
    }

    /// Whether requests must present a credential.
    pub const fn is_enforced(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether `token` satisfies this policy.
    pub fn accepts(&self, token: Option<&str>) -> bool {
        match (self, token) {
            (Self::Open, _) => true,
            (_, None) => false,
            (Self::Single(expected), Some(token)) => expected == token,
            (Self::AnyOf(set), Some(token)) => set.contains(token),
        }
    }
}

/// The shapes `tokens` may take in YAML.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTokens {
    One(String),
    Many(Vec<String>),
}

impl From<Option<RawTokens>> for TokenPolicy {
    fn from(raw: Option<RawTokens>) -> Self {
        match raw {
            None => Self::Open,
            Some(RawTokens::One(token)) => Self::from_tokens([token]),
            Some(RawTokens::Many(tokens)) => Self::from_tokens(tokens),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Sections the Dota 2 client reports, in the order changes are emitted.
pub fn default_sections() -> Vec<String> {
    [
        "player",
        "hero",
        "abilities",
        "items",
        "map",
        "provider",
        "buildings",
        "draft",
        "wearables",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}
