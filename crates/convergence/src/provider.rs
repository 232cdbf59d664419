//! Provider abstraction
//!
//! A provider is the executor bound to one resource for one run. It may
//! first load a snapshot of the actual on-host state, then decides per
//! action whether anything needs to change. Desired and current state
//! are both immutable inputs to `run_action`.

use crate::error::Result;
use crate::node::Node;
use crate::resource::{Action, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot of the actual on-host state of a resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentState {
    pub attributes: BTreeMap<String, Value>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// What a provider action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Actual state already matched desired state
    Unchanged,
    /// The provider changed the system
    Changed { description: String },
}

impl ActionOutcome {
    pub fn changed(description: impl Into<String>) -> Self {
        Self::Changed {
            description: description.into(),
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Read-only context handed to provider calls
pub struct ProviderContext<'a> {
    pub node: &'a Node,
}

/// The action executor bound to one resource for one run
pub trait Provider: fmt::Debug {
    /// Load the actual on-host state, if this provider can observe it
    fn load_current(
        &mut self,
        resource: &Resource,
        ctx: &ProviderContext<'_>,
    ) -> Result<Option<CurrentState>> {
        let _ = (resource, ctx);
        Ok(None)
    }

    /// Perform `action`, comparing desired against the loaded current
    /// state, and report whether anything changed
    fn run_action(
        &mut self,
        resource: &Resource,
        current: Option<&CurrentState>,
        action: &Action,
        ctx: &ProviderContext<'_>,
    ) -> Result<ActionOutcome>;
}

/// Resolves the provider appropriate for a resource on a node
pub trait ProviderResolver {
    fn resolve(&self, node: &Node, resource: &Resource) -> Result<Box<dyn Provider>>;
}
