//! `Trantor.<stack>.toml` stack file parser.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError, ConfigResult, ConfigValue, Overrides};
use crate::stack::StackName;

/// Which resource graph a stack declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    /// Network, managed cluster and load-balancer controller.
    Cluster,
    /// Namespaced application resources for one service.
    Workload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    pub stack: StackSection,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    /// `[org/]project/stack`
    pub name: String,
    pub program: Program,
}

impl StackFile {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Minimal stack file for a new stack.
    pub fn scaffold(name: &StackName, program: Program) -> Self {
        StackFile {
            stack: StackSection {
                name: name.to_string(),
                program,
            },
            config: BTreeMap::new(),
        }
    }

    pub fn stack_name(&self) -> ConfigResult<StackName> {
        Ok(self.stack.name.parse()?)
    }

    /// Store a value under its namespaced key.
    pub fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        let key = self.normalize(key)?;
        self.config.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> ConfigResult<Option<ConfigValue>> {
        let key = self.normalize(key)?;
        Ok(self.config.remove(&key))
    }

    fn normalize(&self, key: &str) -> ConfigResult<String> {
        let name = self.stack_name()?;
        Ok(Config::new(name.project()).full_key(key))
    }

    /// Build the resolver for a run of this stack.
    pub fn resolver(&self, overrides: Overrides) -> ConfigResult<Config> {
        let name = self.stack_name()?;
        Ok(Config::new(name.project())
            .with_stored(self.config.clone())
            .with_overrides(overrides))
    }
}
