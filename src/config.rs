//! Dot-path application configuration.
//!
//! Configuration is a JSON tree addressed with dotted keys such as
//! `app.debug`. It starts from [`Config::defaults`], can be merged with a
//! YAML or JSON file, and is finally overridden by a fixed set of
//! environment variables.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variables applied by [`Config::apply_env`] and the keys they set.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("APP_ENV", "app.env"),
    ("APP_DEBUG", "app.debug"),
    ("APP_URL", "app.url"),
    ("LOG_LEVEL", "logger.level"),
    ("LOG_DEBUG", "logger.debug"),
    ("CACHE_LIFETIME", "cache.lifetime"),
    ("VIEW_CACHE", "view.cache"),
];

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, reason: String },
    UnsupportedFormat { path: PathBuf },
    /// The file parsed but its top level is not a mapping.
    NotAMapping { path: PathBuf },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Parse { path, reason } => write!(f, "failed to parse {}: {reason}", path.display()),
            Self::UnsupportedFormat { path } => {
                write!(f, "unsupported config format: {} (expected .yaml, .yml or .json)", path.display())
            }
            Self::NotAMapping { path } => {
                write!(f, "config file {} must contain a mapping at the top level", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Built-in defaults for every section the framework reads.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            root: json!({
                "app": {
                    "name": "Mini Framework",
                    "env": "production",
                    "debug": false,
                    "url": "http://localhost",
                    "timezone": "UTC",
                },
                "logger": {
                    "level": "info",
                    "debug": false,
                },
                "cache": {
                    "driver": "file",
                    "lifetime": 3600,
                },
                "security": {
                    "csrf_token_lifetime": 3600,
                },
                "view": {
                    "cache": true,
                },
                "session": {
                    "cookie": "minimvc_session",
                    "lifetime": 7200,
                    "secure": false,
                },
            }),
        }
    }

    /// A config with no keys at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap an existing tree. Non-object values are replaced by an empty map.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { root: value },
            _ => Self::empty(),
        }
    }

    /// Parse a YAML (`.yaml`/`.yml`) or JSON (`.json`) file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, is not valid for its format, has an
    /// unknown extension, or is not a mapping.
    pub fn read_file(path: &Path) -> Result<Value, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        match value {
            Value::Object(_) => Ok(value),
            // An empty YAML document parses as null.
            Value::Null => Ok(Value::Object(Map::new())),
            _ => Err(ConfigError::NotAMapping {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Defaults merged with `path`.
    ///
    /// # Errors
    ///
    /// See [`Config::read_file`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::defaults();
        config.merge(Self::read_file(path)?);
        Ok(config)
    }

    /// Merge `other` into this config. Top-level keys in `other` replace
    /// whole sections; nothing is merged below the first level.
    pub fn merge(&mut self, other: Value) {
        let Value::Object(incoming) = other else {
            return;
        };
        if let Value::Object(root) = &mut self.root {
            root.extend(incoming);
        }
    }

    /// Apply [`ENV_OVERRIDES`] using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in ENV_OVERRIDES {
            if let Some(raw) = lookup(var) {
                self.set(key, parse_env_value(&raw));
            }
        }
    }

    /// [`Config::apply_env`] against the process environment.
    #[must_use]
    pub fn with_process_env(mut self) -> Self {
        self.apply_env(|var| std::env::var(var).ok());
        self
    }

    /// Value at a dotted key; the empty key returns the whole tree.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return Some(&self.root);
        }
        key.split('.')
            .try_fold(&self.root, |node, segment| node.get(segment))
    }

    /// Typed value at `key`, or `default` when missing or of another shape.
    #[must_use]
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }

    /// Boolean at `key`. Strings `"true"`, `"1"`, `"yes"`, `"on"` and non-zero
    /// numbers count as true.
    #[must_use]
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            ),
            Some(Value::Null) | None => default,
            Some(_) => default,
        }
    }

    /// String at `key`; numbers and booleans are rendered as text.
    #[must_use]
    pub fn str(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
            _ => default.to_string(),
        }
    }

    /// Unsigned integer at `key`; numeric strings are accepted.
    #[must_use]
    pub fn u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Set a dotted key, creating intermediate sections as needed.
    pub fn set(&mut self, key: &str, value: Value) {
        let segments: Vec<&str> = key.split('.').collect();
        set_path(&mut self.root, &segments, value);
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

fn set_path(node: &mut Value, segments: &[&str], value: Value) {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [first, rest @ ..] => {
            let child = map
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    match raw.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => other
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}
