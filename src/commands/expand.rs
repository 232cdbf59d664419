//! `caldera expand`: show the flattened run list

use crate::cli::ExpandArgs;
use crate::config::AgentConfig;
use crate::role::DirRoleLoader;
use crate::run_context::NodeDocument;
use crate::run_list;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Expansion {
    node: String,
    recipes: Vec<String>,
    applied_roles: Vec<String>,
    default_attributes: BTreeMap<String, Value>,
    override_attributes: BTreeMap<String, Value>,
}

pub fn run(config: &AgentConfig, args: ExpandArgs) -> Result<()> {
    let node_path = args.node.as_deref().unwrap_or_else(|| config.node_path());
    let document = NodeDocument::load(node_path)?;
    let run_list = document.run_list()?;

    let roles_dir = args.roles.as_deref().unwrap_or_else(|| config.roles_dir());
    let loader = DirRoleLoader::new(roles_dir);
    let expansion = run_list::expand(run_list.items(), &loader);

    let mut applied_roles: Vec<String> = expansion.applied_roles.iter().cloned().collect();
    applied_roles.sort();
    let output = Expansion {
        node: document.name,
        recipes: expansion.recipes,
        applied_roles,
        default_attributes: expansion.default_attrs,
        override_attributes: expansion.override_attrs,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("node {}", output.node);
        if output.applied_roles.is_empty() {
            println!("roles: (none)");
        } else {
            println!("roles: {}", output.applied_roles.join(", "));
        }
        for recipe in &output.recipes {
            println!("  recipe[{recipe}]");
        }
    }
    Ok(())
}
