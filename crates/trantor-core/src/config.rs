//! Stack configuration resolution.
//!
//! Values come from three layers, highest precedence first: run-time
//! overrides (`--config key=value` flags and `TRANTOR_CONFIG_*` variables),
//! the stack file's `[config]` table, and the default supplied by the
//! caller. Keys are namespaced `namespace:key`; a bare key belongs to the
//! stack's project (`replicas` is stored as `<project>:replicas`).
//!
//! Lookups are pure. A `Config` is built once per run and passed to each
//! builder explicitly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stack::StackNameError;

/// Prefix for environment-variable overrides.
pub const ENV_PREFIX: &str = "TRANTOR_CONFIG_";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key '{0}'")]
    Missing(String),

    #[error("configuration key '{key}' expected {expected}, got '{value}'")]
    Coercion {
        key: String,
        expected: &'static str,
        value: String,
    },

    #[error("invalid value for configuration key '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("invalid override '{0}': expected KEY=VALUE")]
    InvalidOverride(String),

    #[error(transparent)]
    StackName(#[from] StackNameError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize stack file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A scalar configuration value as written in a stack file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

/// Types a configuration value can be coerced into.
pub trait FromConfigValue: Sized {
    /// Human-readable type name used in coercion errors.
    const EXPECTED: &'static str;

    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "a string";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        Some(value.to_string())
    }
}

impl FromConfigValue for i64 {
    const EXPECTED: &'static str = "an integer";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            ConfigValue::Bool(_) => None,
        }
    }
}

impl FromConfigValue for u32 {
    const EXPECTED: &'static str = "a non-negative 32-bit integer";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        i64::from_config_value(value).and_then(|i| u32::try_from(i).ok())
    }
}

impl FromConfigValue for u16 {
    const EXPECTED: &'static str = "a port-sized integer (0-65535)";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        i64::from_config_value(value).and_then(|i| u16::try_from(i).ok())
    }
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            ConfigValue::Int(_) => None,
        }
    }
}

/// Run-time overrides, keyed as written (namespacing happens in `Config`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(BTreeMap<String, ConfigValue>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Parse a `key=value` assignment (as given to `--config`).
    pub fn parse_assignment(&mut self, assignment: &str) -> ConfigResult<()> {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(ConfigError::InvalidOverride(assignment.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidOverride(assignment.to_string()));
        }
        self.insert(key, value);
        Ok(())
    }

    /// Collect overrides from `TRANTOR_CONFIG_*` variables.
    ///
    /// `TRANTOR_CONFIG_MIN_REPLICAS` becomes `min_replicas`;
    /// `TRANTOR_CONFIG_AWS__REGION` becomes `aws:region`.
    pub fn from_env<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = Self::new();
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let key = rest.to_ascii_lowercase().replace("__", ":");
            overrides.insert(key, value);
        }
        overrides
    }

    /// Merge `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(mut self, other: Overrides) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Override,
    Stack,
}

/// Layered, typed view over a stack's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    project: String,
    overrides: BTreeMap<String, ConfigValue>,
    stored: BTreeMap<String, ConfigValue>,
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            overrides: BTreeMap::new(),
            stored: BTreeMap::new(),
        }
    }

    /// Add stack-scoped stored values.
    pub fn with_stored<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: AsRef<str>,
    {
        for (key, value) in values {
            let key = self.full_key(key.as_ref());
            self.stored.insert(key, value);
        }
        self
    }

    /// Add run-time overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        for (key, value) in overrides.0 {
            let key = self.full_key(&key);
            self.overrides.insert(key, value);
        }
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Normalize a key to `namespace:key`.
    pub fn full_key(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{key}", self.project)
        }
    }

    /// Raw lookup honoring precedence.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.lookup(key).map(|(value, _)| value)
    }

    fn lookup(&self, key: &str) -> Option<(&ConfigValue, ValueSource)> {
        let key = self.full_key(key);
        self.overrides
            .get(&key)
            .map(|v| (v, ValueSource::Override))
            .or_else(|| self.stored.get(&key).map(|v| (v, ValueSource::Stack)))
    }

    /// Typed lookup. Present-but-uncoercible values are errors, never `None`.
    pub fn get_typed<T: FromConfigValue>(&self, key: &str) -> ConfigResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => T::from_config_value(value).map(Some).ok_or_else(|| {
                ConfigError::Coercion {
                    key: self.full_key(key),
                    expected: T::EXPECTED,
                    value: value.to_string(),
                }
            }),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    pub fn get_int(&self, key: &str) -> ConfigResult<Option<i64>> {
        self.get_typed(key)
    }

    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        self.get_typed(key)
    }

    /// Typed lookup that fails with `ConfigError::Missing` when absent.
    pub fn require<T: FromConfigValue>(&self, key: &str) -> ConfigResult<T> {
        self.get_typed(key)?
            .ok_or_else(|| ConfigError::Missing(self.full_key(key)))
    }

    pub fn require_str(&self, key: &str) -> ConfigResult<String> {
        self.require(key)
    }

    pub fn require_int(&self, key: &str) -> ConfigResult<i64> {
        self.require(key)
    }

    pub fn require_bool(&self, key: &str) -> ConfigResult<bool> {
        self.require(key)
    }

    /// Typed lookup falling back to the caller's default.
    pub fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> ConfigResult<T> {
        Ok(self.get_typed(key)?.unwrap_or(default))
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or_else(|| default.to_string())
    }

    pub fn int_or(&self, key: &str, default: i64) -> ConfigResult<i64> {
        self.get_or(key, default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        self.get_or(key, default)
    }

    /// Comma-separated list value; empty entries are dropped.
    pub fn list_or_empty(&self, key: &str) -> Vec<String> {
        self.get_str(key)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every known key with its effective value and source.
    pub fn entries(&self) -> BTreeMap<&str, (&ConfigValue, ValueSource)> {
        let mut out = BTreeMap::new();
        for (k, v) in &self.stored {
            out.insert(k.as_str(), (v, ValueSource::Stack));
        }
        for (k, v) in &self.overrides {
            out.insert(k.as_str(), (v, ValueSource::Override));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new("foundation").with_stored([
            ("namespace", ConfigValue::from("production")),
            ("replicas", ConfigValue::Int(3)),
            ("cpu_target", ConfigValue::from("70")),
            ("feature_new_ui", ConfigValue::from("False")),
            ("aws:region", ConfigValue::from("eu-west-1")),
        ])
    }

    #[test]
    fn bare_keys_are_project_scoped() {
        let cfg = config();
        assert_eq!(cfg.full_key("replicas"), "foundation:replicas");
        assert_eq!(cfg.full_key("aws:region"), "aws:region");
        assert_eq!(cfg.get_str("foundation:namespace").as_deref(), Some("production"));
    }

    #[test]
    fn typed_lookups_coerce_strings() {
        let cfg = config();
        assert_eq!(cfg.get_int("replicas").unwrap(), Some(3));
        assert_eq!(cfg.get_int("cpu_target").unwrap(), Some(70));
        assert_eq!(cfg.get_bool("feature_new_ui").unwrap(), Some(false));
        assert_eq!(cfg.get_str("replicas").as_deref(), Some("3"));
    }

    #[test]
    fn coercion_failure_is_an_error_not_a_default() {
        let cfg = config();
        let err = cfg.get_or::<i64>("namespace", 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Coercion { ref key, expected: "an integer", ref value }
                if key == "foundation:namespace" && value == "production"
        ));
        assert!(cfg.get_bool("replicas").is_err());
    }

    #[test]
    fn negative_values_fail_unsigned_coercion() {
        let cfg = Config::new("p").with_stored([("replicas", ConfigValue::Int(-1))]);
        assert!(cfg.get_typed::<u32>("replicas").is_err());
        assert_eq!(cfg.get_int("replicas").unwrap(), Some(-1));
    }

    #[test]
    fn require_missing_key() {
        let cfg = config();
        let err = cfg.require_str("image_tag").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "foundation:image_tag"));
        assert_eq!(cfg.require_int("replicas").unwrap(), 3);
    }

    #[test]
    fn precedence_override_stack_default() {
        let mut overrides = Overrides::new();
        overrides.insert("replicas", ConfigValue::Int(5));
        let cfg = config().with_overrides(overrides);

        assert_eq!(cfg.get_or::<i64>("replicas", 1).unwrap(), 5);
        assert_eq!(cfg.get_or::<i64>("cpu_target", 1).unwrap(), 70);
        assert_eq!(cfg.get_or::<i64>("max_replicas", 10).unwrap(), 10);
        assert_eq!(cfg.str_or("aws:region", "us-east-1"), "eu-west-1");
        assert_eq!(cfg.str_or("aws:profile", "default"), "default");
    }

    #[test]
    fn parse_assignment() {
        let mut overrides = Overrides::new();
        overrides.parse_assignment("image_tag=v1.2=rc").unwrap();
        assert_eq!(
            overrides.iter().next(),
            Some((&"image_tag".to_string(), &ConfigValue::from("v1.2=rc")))
        );
        assert!(overrides.parse_assignment("no-equals").is_err());
        assert!(overrides.parse_assignment("=value").is_err());
    }

    #[test]
    fn env_overrides() {
        let vars = vec![
            ("TRANTOR_CONFIG_MIN_REPLICAS".to_string(), "4".to_string()),
            ("TRANTOR_CONFIG_AWS__REGION".to_string(), "ap-south-1".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("TRANTOR_CONFIG_".to_string(), "ignored".to_string()),
        ];
        let cfg = config().with_overrides(Overrides::from_env(vars));
        assert_eq!(cfg.get_int("min_replicas").unwrap(), Some(4));
        assert_eq!(cfg.get_str("aws:region").as_deref(), Some("ap-south-1"));
        assert_eq!(cfg.entries().len(), 6);
    }

    #[test]
    fn later_overrides_win_on_merge() {
        let mut env = Overrides::new();
        env.insert("replicas", "2");
        let mut flags = Overrides::new();
        flags.insert("replicas", "7");
        let cfg = config().with_overrides(env.merge(flags));
        assert_eq!(cfg.get_int("replicas").unwrap(), Some(7));
    }

    #[test]
    fn list_values() {
        let cfg = Config::new("p").with_stored([(
            "network_reserved_cidrs",
            ConfigValue::from("10.1.0.0/16, ,172.16.0.0/12"),
        )]);
        assert_eq!(
            cfg.list_or_empty("network_reserved_cidrs"),
            vec!["10.1.0.0/16", "172.16.0.0/12"]
        );
        assert!(cfg.list_or_empty("missing").is_empty());
    }
}
