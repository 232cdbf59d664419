//! Node identity and the three-tier attribute store
//!
//! A node's attributes live in three precedence layers: `default`
//! (lowest), `normal` (explicitly set), and `override` (highest).
//! Reads merge the layers per key; the highest-precedence layer that
//! holds the key wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute keys the platform lookup inspects, in preference order.
pub const PLATFORM_HINTS: [(&str, &str); 3] = [
    ("lsbdistid", "lsbdistrelease"),
    ("macosx_productname", "macosx_productversion"),
    ("operatingsystem", "operatingsystemversion"),
];

/// A managed machine: a name plus layered attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default)]
    default: BTreeMap<String, Value>,
    #[serde(default)]
    normal: BTreeMap<String, Value>,
    #[serde(default, rename = "override")]
    override_attrs: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: BTreeMap::new(),
            normal: BTreeMap::new(),
            override_attrs: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merged read: override beats normal beats default
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.override_attrs
            .get(key)
            .or_else(|| self.normal.get(key))
            .or_else(|| self.default.get(key))
    }

    /// Merged read of a string-valued attribute
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.default.insert(key.into(), value);
    }

    pub fn set_normal(&mut self, key: impl Into<String>, value: Value) {
        self.normal.insert(key.into(), value);
    }

    pub fn set_override(&mut self, key: impl Into<String>, value: Value) {
        self.override_attrs.insert(key.into(), value);
    }

    /// Shallow-merge a map into the default layer (new keys win over old)
    pub fn merge_defaults(&mut self, attrs: BTreeMap<String, Value>) {
        self.default.extend(attrs);
    }

    /// Shallow-merge a map into the override layer (new keys win over old)
    pub fn merge_overrides(&mut self, attrs: BTreeMap<String, Value>) {
        self.override_attrs.extend(attrs);
    }

    /// Merge a map under the default layer: keys the node already
    /// defaults keep their value
    pub fn underlay_defaults(&mut self, attrs: BTreeMap<String, Value>) {
        for (key, value) in attrs {
            self.default.entry(key).or_insert(value);
        }
    }

    /// Snapshot of the fully merged attribute view
    pub fn merged(&self) -> BTreeMap<String, Value> {
        let mut merged = self.default.clone();
        merged.extend(self.normal.clone());
        merged.extend(self.override_attrs.clone());
        merged
    }

    pub fn platform(&self) -> Option<&str> {
        self.get_str("platform")
    }

    pub fn platform_version(&self) -> Option<&str> {
        self.get_str("platform_version")
    }

    pub fn fqdn(&self) -> Option<&str> {
        self.get_str("fqdn")
    }
}
