use serde::Deserialize;
use std::collections::HashMap;

use super::errors::ConfigError;
use super::group::GroupSpec;
use super::listener::ListenerSpec;
use super::resolver::ResolverSpec;
use super::router::RouterSpec;

/// Declarative description of the whole pipeline: flat maps of nodes
/// keyed by id, referencing each other by id. The graph assembler turns
/// this into the running resolver DAG.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Resolver used to look up the hostnames of the other upstream
    /// endpoints, so the proxy does not depend on the OS resolver that it
    /// may itself be serving.
    #[serde(default)]
    pub bootstrap_resolver: Option<ResolverSpec>,

    #[serde(default)]
    pub resolvers: HashMap<String, ResolverSpec>,

    #[serde(default)]
    pub groups: HashMap<String, GroupSpec>,

    #[serde(default)]
    pub routers: HashMap<String, RouterSpec>,

    #[serde(default)]
    pub listeners: HashMap<String, ListenerSpec>,
}

impl Config {
    pub fn from_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(origin.to_string(), e.to_string()))
    }

    /// Load one or more TOML files and merge them. Listeners, groups and
    /// routers may be split over multiple files; ids must stay unique
    /// across the whole set.
    pub fn from_files<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut merged = Config::default();
        for path in paths {
            let path = path.as_ref();
            let origin = path.display().to_string();
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::FileRead(origin.clone(), e.to_string()))?;
            let config = Self::from_str(&contents, &origin)?;
            merged.merge(config)?;
        }
        Ok(merged)
    }

    pub fn merge(&mut self, other: Config) -> Result<(), ConfigError> {
        if let Some(bootstrap) = other.bootstrap_resolver {
            if self.bootstrap_resolver.is_some() {
                return Err(ConfigError::DuplicateId("bootstrap-resolver".to_string()));
            }
            self.bootstrap_resolver = Some(bootstrap);
        }
        for (id, spec) in other.resolvers {
            if self.resolvers.insert(id.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateId(id));
            }
        }
        for (id, spec) in other.groups {
            if self.groups.insert(id.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateId(id));
            }
        }
        for (id, spec) in other.routers {
            if self.routers.insert(id.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateId(id));
            }
        }
        for (id, spec) in other.listeners {
            if self.listeners.insert(id.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateId(id));
            }
        }
        Ok(())
    }
}
