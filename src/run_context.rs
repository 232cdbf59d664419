//! Assembling and converging a run
//!
//! Ties the pieces together: load the node document, expand its run
//! list against the role store, fold role attributes into the node,
//! evaluate each recipe, and hand the resulting collection to the
//! runner.

use crate::cookbook::{CookbookSet, parse_recipe_name};
use crate::platform::PlatformMap;
use crate::providers;
use crate::recipe;
use crate::role::DirRoleLoader;
use crate::run_list::{self, RunList, RunListExpansion};
use anyhow::{Context, Result, bail};
use convergence::{Node, ResourceCollection, RunReport, Runner};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// On-disk node document: identity, run list, and attribute layers
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub name: String,
    #[serde(default)]
    pub run_list: Vec<String>,
    #[serde(default)]
    pub default: BTreeMap<String, Value>,
    #[serde(default)]
    pub normal: BTreeMap<String, Value>,
    #[serde(default, rename = "override")]
    pub override_attrs: BTreeMap<String, Value>,
}

impl NodeDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read node document {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("node document {} is not valid", path.display()))
    }

    pub fn run_list(&self) -> Result<RunList> {
        RunList::parse(&self.run_list)
    }

    pub fn into_node(self) -> Node {
        let mut node = Node::new(self.name);
        node.merge_defaults(self.default);
        for (key, value) in self.normal {
            node.set_normal(key, value);
        }
        node.merge_overrides(self.override_attrs);
        node
    }
}

/// Everything a convergence run needs, fully assembled
pub struct RunContext {
    pub node: Node,
    pub expansion: RunListExpansion,
    pub cookbooks: Arc<CookbookSet>,
    pub platform_map: PlatformMap,
    pub resources: ResourceCollection,
}

impl RunContext {
    /// Build a run context from on-disk state
    pub fn build(node_path: &Path, roles_dir: &Path, cookbooks_dir: &Path) -> Result<Self> {
        let document = NodeDocument::load(node_path)?;
        let run_list = document.run_list()?;
        if run_list.is_empty() {
            log::warn!("node '{}' has an empty run list", document.name);
        }
        let mut node = document.into_node();

        let loader = DirRoleLoader::new(roles_dir);
        let expansion = run_list::expand(run_list.items(), &loader);
        log::info!(
            "run list expanded to {} recipes ({} roles applied)",
            expansion.recipes.len(),
            expansion.applied_roles.len()
        );

        // role defaults sit under the node's own defaults; role
        // overrides are applied on top of the node's override layer
        node.underlay_defaults(expansion.default_attrs.clone());
        node.merge_overrides(expansion.override_attrs.clone());

        let cookbooks = Arc::new(CookbookSet::load(cookbooks_dir)?);
        if cookbooks.is_empty() && !expansion.recipes.is_empty() {
            log::warn!("no cookbooks found under {}", cookbooks_dir.display());
        }
        let mut platform_map = providers::builtin_map();
        providers::register_cookbook_providers(&mut platform_map, Arc::clone(&cookbooks));

        let (platform, version) = PlatformMap::platform_and_version(&node)?;
        let mut resources = ResourceCollection::new();
        for name in &expansion.recipes {
            let (cookbook_name, recipe_name) = parse_recipe_name(name);
            let Some(cookbook) = cookbooks.get(cookbook_name) else {
                bail!("run list names cookbook '{cookbook_name}' but it is not loaded");
            };
            let Some(path) = cookbook.recipe_path(recipe_name) else {
                bail!("cookbook '{}' has no recipe '{recipe_name}'", cookbook.name);
            };
            recipe::evaluate_file(
                &path,
                cookbook_name,
                recipe_name,
                &platform,
                &version,
                &platform_map,
                &mut resources,
            )?;
        }
        log::info!("resource collection holds {} resources", resources.len());

        Ok(Self {
            node,
            expansion,
            cookbooks,
            platform_map,
            resources,
        })
    }

    /// Converge the collection and return the run report
    pub fn converge(&mut self) -> RunReport {
        Runner::new(&self.node, &mut self.resources, &self.platform_map).converge()
    }
}
