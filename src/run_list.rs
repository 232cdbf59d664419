//! Run lists and their expansion
//!
//! A run list is the ordered set of roles and recipes assigned to a
//! node. Expansion flattens it depth-first into a concrete recipe list
//! plus the merged default/override attributes contributed by roles,
//! with a guard against role cycles.

use crate::role::{RoleError, RoleLoader};
use anyhow::bail;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(recipe|role)\[([^\[\]]+)\]$").unwrap());

/// One entry of a run list: a recipe or a role
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunListItem {
    Recipe(String),
    Role(String),
}

impl fmt::Display for RunListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipe(name) => write!(f, "recipe[{name}]"),
            Self::Role(name) => write!(f, "role[{name}]"),
        }
    }
}

impl FromStr for RunListItem {
    type Err = anyhow::Error;

    /// Parse `recipe[x]`, `role[y]`, or a bare name (a recipe)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("empty run list item");
        }
        if let Some(captures) = ITEM_RE.captures(s) {
            let name = captures[2].to_string();
            return Ok(match &captures[1] {
                "role" => Self::Role(name),
                _ => Self::Recipe(name),
            });
        }
        if s.contains('[') || s.contains(']') {
            bail!("malformed run list item '{s}', expected recipe[name] or role[name]");
        }
        Ok(Self::Recipe(s.to_string()))
    }
}

/// Ordered, duplicate-free list of run list items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunList {
    items: Vec<RunListItem>,
}

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of item strings, preserving order
    pub fn parse(items: &[String]) -> anyhow::Result<Self> {
        let mut run_list = Self::new();
        for raw in items {
            run_list.push(raw.parse()?);
        }
        Ok(run_list)
    }

    /// Append an item; duplicates are dropped
    pub fn push(&mut self, item: RunListItem) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn items(&self) -> &[RunListItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of flattening a run list
#[derive(Debug, Clone, Default)]
pub struct RunListExpansion {
    /// Final ordered recipe names, no role markers
    pub recipes: Vec<String>,
    /// Default attributes contributed by roles, later roles winning
    pub default_attrs: BTreeMap<String, Value>,
    /// Override attributes contributed by roles, later roles winning
    pub override_attrs: BTreeMap<String, Value>,
    /// Roles already applied; doubles as the cycle guard
    pub applied_roles: HashSet<String>,
    recipe_seen: HashSet<String>,
}

impl RunListExpansion {
    fn add_recipe(&mut self, name: &str) {
        if self.recipe_seen.insert(name.to_string()) {
            self.recipes.push(name.to_string());
        }
    }
}

/// Flatten a run list depth-first, loading roles on demand
///
/// A role's own run list is spliced in at the point the role appears.
/// Roles already applied are skipped, which also breaks cycles. A role
/// that cannot be loaded is logged and skipped; expansion itself never
/// fails.
pub fn expand(items: &[RunListItem], loader: &dyn RoleLoader) -> RunListExpansion {
    let mut expansion = RunListExpansion::default();
    expand_into(items, loader, &mut expansion);
    expansion
}

fn expand_into(
    items: &[RunListItem],
    loader: &dyn RoleLoader,
    expansion: &mut RunListExpansion,
) {
    for item in items {
        match item {
            RunListItem::Recipe(name) => expansion.add_recipe(name),
            RunListItem::Role(name) => {
                if expansion.applied_roles.contains(name) {
                    log::debug!("role '{name}' already applied, skipping");
                    continue;
                }
                expansion.applied_roles.insert(name.clone());
                let role = match loader.load_role(name) {
                    Ok(role) => role,
                    Err(RoleError::NotFound(_)) => {
                        log::warn!("role '{name}' not found, skipping");
                        continue;
                    }
                    Err(err) => {
                        log::warn!("role '{name}' could not be loaded, skipping: {err}");
                        continue;
                    }
                };
                expansion.default_attrs.extend(role.default_attributes.clone());
                expansion.override_attrs.extend(role.override_attributes.clone());
                let nested = role.run_list_items();
                expand_into(&nested, loader, expansion);
            }
        }
    }
}
