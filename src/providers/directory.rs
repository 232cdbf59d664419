//! Directory provider

use super::{path_attr, unsupported};
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Resource, Result};
use serde_json::json;
use std::fs;

/// Manages a directory's existence
#[derive(Debug)]
pub struct DirectoryProvider;

fn recursive(resource: &Resource) -> bool {
    resource
        .attribute("recursive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

impl Provider for DirectoryProvider {
    fn load_current(
        &mut self,
        resource: &Resource,
        _ctx: &ProviderContext<'_>,
    ) -> Result<Option<CurrentState>> {
        let path = path_attr(resource);
        Ok(Some(CurrentState::new().with("exists", json!(path.is_dir()))))
    }

    fn run_action(
        &mut self,
        resource: &Resource,
        current: Option<&CurrentState>,
        action: &Action,
        _ctx: &ProviderContext<'_>,
    ) -> Result<ActionOutcome> {
        let path = path_attr(resource);
        let exists = current
            .and_then(|c| c.get("exists"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        match action.as_str() {
            "create" => {
                if exists {
                    return Ok(ActionOutcome::Unchanged);
                }
                if recursive(resource) {
                    fs::create_dir_all(&path)?;
                } else {
                    fs::create_dir(&path)?;
                }
                Ok(ActionOutcome::changed(format!("created {}", path.display())))
            }
            "delete" => {
                if !exists {
                    return Ok(ActionOutcome::Unchanged);
                }
                if recursive(resource) {
                    fs::remove_dir_all(&path)?;
                } else {
                    fs::remove_dir(&path)?;
                }
                Ok(ActionOutcome::changed(format!("removed {}", path.display())))
            }
            other => Err(unsupported(resource, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::Node;

    fn run(resource: &Resource, action: &str) -> Result<ActionOutcome> {
        let node = Node::new("latte");
        let ctx = ProviderContext { node: &node };
        let mut provider = DirectoryProvider;
        let current = provider.load_current(resource, &ctx)?;
        provider.run_action(resource, current.as_ref(), &Action::new(action), &ctx)
    }

    #[test]
    fn create_then_converged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("managed");
        let resource = Resource::declare("directory", path.to_string_lossy())
            .action("create")
            .build()
            .unwrap();

        assert!(run(&resource, "create").unwrap().is_changed());
        assert!(path.is_dir());
        assert_eq!(run(&resource, "create").unwrap(), ActionOutcome::Unchanged);
    }

    #[test]
    fn nested_create_requires_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c");
        let flat = Resource::declare("directory", path.to_string_lossy())
            .action("create")
            .build()
            .unwrap();
        assert!(run(&flat, "create").is_err());

        let deep = Resource::declare("directory", path.to_string_lossy())
            .action("create")
            .attribute("recursive", json!(true))
            .build()
            .unwrap();
        assert!(run(&deep, "create").unwrap().is_changed());
        assert!(path.is_dir());
    }

    #[test]
    fn delete_missing_directory_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost");
        let resource = Resource::declare("directory", path.to_string_lossy())
            .action("delete")
            .build()
            .unwrap();
        assert_eq!(run(&resource, "delete").unwrap(), ActionOutcome::Unchanged);
    }
}
