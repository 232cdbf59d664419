//! Roles: reusable bundles of run-list items and attributes
//!
//! Roles are loaded from `roles/<name>.json`. A role is immutable for
//! the duration of a run; expansion reads its run list and merges its
//! default/override attributes.

use crate::run_list::RunListItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a role
#[derive(Error, Debug)]
pub enum RoleError {
    /// No role document with this name exists
    #[error("role '{0}' not found")]
    NotFound(String),

    /// The role document exists but cannot be parsed
    #[error("role '{name}' is invalid: {source}")]
    Invalid {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A named bundle of run-list items plus attribute defaults/overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub run_list: Vec<String>,
    #[serde(default)]
    pub default_attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub override_attributes: BTreeMap<String, Value>,
}

impl Role {
    /// Parsed run list; malformed entries are logged and dropped
    pub fn run_list_items(&self) -> Vec<RunListItem> {
        self.run_list
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(item) => Some(item),
                Err(err) => {
                    log::warn!("role '{}': dropping run list item '{raw}': {err}", self.name);
                    None
                }
            })
            .collect()
    }
}

/// Source of role definitions
pub trait RoleLoader {
    fn load_role(&self, name: &str) -> Result<Role, RoleError>;
}

/// Loads roles from a directory of `<name>.json` documents
#[derive(Debug, Clone)]
pub struct DirRoleLoader {
    dir: PathBuf,
}

impl DirRoleLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RoleLoader for DirRoleLoader {
    fn load_role(&self, name: &str) -> Result<Role, RoleError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.is_file() {
            return Err(RoleError::NotFound(name.to_string()));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| RoleError::Invalid {
            name: name.to_string(),
            source: e.into(),
        })?;
        let role: Role = serde_json::from_str(&content).map_err(|e| RoleError::Invalid {
            name: name.to_string(),
            source: e.into(),
        })?;
        log::debug!("loaded role '{name}' from {}", path.display());
        Ok(role)
    }
}
