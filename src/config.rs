//! Server paths and run configuration
//!
//! Shared data lives under a server-specific `shareddir`. It is taken from the
//! `IMPERICS_SHAREDDIR` environment variable when set, otherwise from a TOML
//! server file. Run configurations are trees of JSON values wrapped in
//! [`ConfigDict`], whose lookups fall back to enclosing sections.

use crate::errors::{ImpactLabError, Result};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Environment variable naming the shared data directory
pub const SHAREDDIR_ENV_VAR: &str = "IMPERICS_SHAREDDIR";

/// Server configuration file used when the environment variable is unset
pub const DEFAULT_SERVER_CONFIG_PATH: &str = "../server.toml";

const SHAREDDIR_KEY: &str = "shareddir";

/// Server-specific settings, most importantly `shareddir`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
    values: Map<String, Value>,
}

impl ServerConfig {
    #[must_use]
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Configuration holding only a shared directory
    #[must_use]
    pub fn with_shareddir(shareddir: impl Into<String>) -> Self {
        let mut values = Map::new();
        values.insert(SHAREDDIR_KEY.to_string(), Value::String(shareddir.into()));
        Self { values }
    }

    /// # Errors
    ///
    /// Returns a TOML error for invalid syntax.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents)?;
        match serde_json::to_value(table)? {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(ImpactLabError::Config(
                "server configuration must be a table".to_string(),
            )),
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error if the file does not exist, otherwise an
    /// I/O or TOML error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImpactLabError::Config(format!(
                "Cannot find configuration file at {}",
                path.display()
            )));
        }
        debug!("Reading server configuration from {}", path.display());
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Resolve the configuration from `IMPERICS_SHAREDDIR`, falling back to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset and `path` cannot be read.
    pub fn from_env_or_file(path: &Path) -> Result<Self> {
        match env::var(SHAREDDIR_ENV_VAR) {
            Ok(shareddir) => Ok(Self::with_shareddir(shareddir)),
            Err(_) => Self::from_file(path),
        }
    }

    /// [`ServerConfig::from_env_or_file`] with [`DEFAULT_SERVER_CONFIG_PATH`]
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env_or_file`].
    pub fn load() -> Result<Self> {
        Self::from_env_or_file(Path::new(DEFAULT_SERVER_CONFIG_PATH))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// # Errors
    ///
    /// Returns a configuration error if `shareddir` is missing or not a string.
    pub fn shareddir(&self) -> Result<&str> {
        self.values
            .get(SHAREDDIR_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| ImpactLabError::Config("no 'shareddir' configured".to_string()))
    }

    /// `subpath` joined onto the shared directory
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::shareddir`].
    pub fn sharedpath(&self, subpath: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(Path::new(self.shareddir()?).join(subpath))
    }

    /// Absolute paths unchanged, relative paths resolved under the shared directory
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::shareddir`], for relative paths only.
    pub fn configpath(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        self.sharedpath(path)
    }

    /// Keep every value of `self`, taking from `other` only keys `self` lacks
    #[must_use]
    pub fn merge(&self, other: Self) -> Self {
        let mut values = self.values.clone();
        for (key, value) in other.values {
            values.entry(key).or_insert(value);
        }
        Self { values }
    }
}

/// Normalize a configuration key: lower case, `_` replaced by `-`
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace('_', "-")
}

/// Which sections [`ConfigDict::accessed_all_keys`] inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySearch {
    /// Only the keys of this section
    #[default]
    Local,
    /// This section, then every enclosing section up to the root
    Parents,
    /// This section, then every nested section below it
    Children,
}

/// Keys read from one section and from the sections nested below it
#[derive(Debug, Default)]
struct AccessLog {
    keys: RefCell<BTreeSet<String>>,
    sections: RefCell<BTreeMap<String, Rc<AccessLog>>>,
}

impl AccessLog {
    fn record(&self, key: &str) {
        self.keys.borrow_mut().insert(key.to_string());
    }

    fn section(&self, key: &str) -> Rc<AccessLog> {
        Rc::clone(self.sections.borrow_mut().entry(key.to_string()).or_default())
    }

    fn used_all(&self, data: &Map<String, Value>) -> bool {
        let keys = self.keys.borrow();
        data.keys().all(|k| keys.contains(k))
    }

    fn used_all_below(&self, data: &Map<String, Value>) -> bool {
        self.used_all(data)
            && data.iter().all(|(key, value)| match value {
                Value::Object(map) => self.section(key).used_all_below(&normalize_map(map.clone())),
                _ => true,
            })
    }
}

/// Chainable configuration section
///
/// Keys are normalized with [`normalize_key`]. Lookups missing from the
/// section are answered by its parent sections, and the key is recorded as
/// read on whichever section answered it. Clones and repeated
/// [`ConfigDict::child`] calls share one access log, so unused settings can
/// be reported after a run.
#[derive(Debug, Clone, Default)]
pub struct ConfigDict {
    data: Map<String, Value>,
    parent: Option<Rc<ConfigDict>>,
    accessed: Rc<AccessLog>,
}

impl ConfigDict {
    /// Root section from a JSON object; other values yield an empty section
    #[must_use]
    pub fn new(value: Value) -> Self {
        let data = match value {
            Value::Object(map) => normalize_map(map),
            _ => Map::new(),
        };
        Self {
            data,
            parent: None,
            accessed: Rc::default(),
        }
    }

    /// Value for `key`, searching parent sections when absent locally
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = normalize_key(key);
        if let Some(value) = self.data.get(&key) {
            self.accessed.record(&key);
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(&key))
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(ToString::to_string))
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Nested section `key` whose lookups fall back to `self`
    #[must_use]
    pub fn child(&self, key: &str) -> Option<Self> {
        let key = normalize_key(key);
        let Some(Value::Object(map)) = self.data.get(&key) else {
            return None;
        };
        self.accessed.record(&key);

        Some(Self {
            data: normalize_map(map.clone()),
            parent: Some(Rc::new(self.clone())),
            accessed: self.accessed.section(&key),
        })
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.data.insert(normalize_key(key), value);
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.data.contains_key(&key)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains_key(&key))
    }

    /// Local keys read so far
    #[must_use]
    pub fn accessed_keys(&self) -> BTreeSet<String> {
        self.accessed.keys.borrow().clone()
    }

    /// Local keys never read
    #[must_use]
    pub fn unused_keys(&self) -> BTreeSet<String> {
        let accessed = self.accessed.keys.borrow();
        self.data
            .keys()
            .filter(|k| !accessed.contains(*k))
            .cloned()
            .collect()
    }

    /// Whether every key in the searched sections has been read
    #[must_use]
    pub fn accessed_all_keys(&self, search: KeySearch) -> bool {
        match search {
            KeySearch::Local => self.accessed.used_all(&self.data),
            KeySearch::Parents => {
                self.accessed.used_all(&self.data)
                    && self
                        .parent
                        .as_ref()
                        .map_or(true, |parent| parent.accessed_all_keys(KeySearch::Parents))
            }
            KeySearch::Children => self.accessed.used_all_below(&self.data),
        }
    }

    /// New section with the values of `self` overridden by those of `other`
    ///
    /// The result keeps the parent of `other` when `other_parent` is set and
    /// the parent of `self` otherwise. It starts with an empty access log.
    #[must_use]
    pub fn merge(&self, other: &Self, other_parent: bool) -> Self {
        let mut data = self.data.clone();
        data.extend(other.data.clone());
        let parent = if other_parent {
            other.parent.clone()
        } else {
            self.parent.clone()
        };
        Self {
            data,
            parent,
            accessed: Rc::default(),
        }
    }
}

fn normalize_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().map(|(k, v)| (normalize_key(&k), v)).collect()
}

/// Merge command-line arguments into one configuration object
///
/// - `*.toml`: a configuration file merged into the result
/// - `--config=FILE`: replaces everything gathered so far with `FILE`
/// - `--key=value`: a single value, parsed as JSON when possible, else a string
/// - `--flag` or any other argument: set to `true`
///
/// Later arguments override earlier ones.
///
/// # Errors
///
/// Returns an error if a referenced configuration file cannot be read or parsed.
pub fn config_from_args<I, S>(args: I) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config = Map::new();

    for arg in args {
        let arg = arg.as_ref();
        if arg.ends_with(".toml") {
            config.extend(ServerConfig::from_file(Path::new(arg))?.values);
            continue;
        }

        if let Some(option) = arg.strip_prefix("--") {
            match option.split_once('=') {
                Some(("config", path)) => {
                    config = ServerConfig::from_file(Path::new(path))?.values;
                }
                Some((key, value)) => {
                    let value = serde_json::from_str(value)
                        .unwrap_or_else(|_| Value::String(value.to_string()));
                    config.insert(key.to_string(), value);
                }
                None => {
                    config.insert(option.to_string(), Value::Bool(true));
                }
            }
            continue;
        }

        config.insert(arg.to_string(), Value::Bool(true));
    }

    Ok(config)
}
