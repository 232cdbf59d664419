//! Symbolic link provider

use super::{path_attr, unsupported};
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Error, Resource, Result};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

/// Manages a symbolic link from the resource path to its `to` target
#[derive(Debug)]
pub struct LinkProvider;

fn target(resource: &Resource) -> Result<PathBuf> {
    resource
        .attribute_str("to")
        .map(PathBuf::from)
        .ok_or_else(|| Error::ActionFailed {
            resource: resource.id().to_string(),
            action: resource.action().to_string(),
            source: anyhow::anyhow!("link resources require a 'to' attribute"),
        })
}

#[cfg(unix)]
fn create_symlink(to: &std::path::Path, path: &std::path::Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(to, path)
}

#[cfg(not(unix))]
fn create_symlink(_to: &std::path::Path, _path: &std::path::Path) -> std::io::Result<()> {
    Err(std::io::Error::other("symlinks are only supported on unix"))
}

impl Provider for LinkProvider {
    fn load_current(
        &mut self,
        resource: &Resource,
        _ctx: &ProviderContext<'_>,
    ) -> Result<Option<CurrentState>> {
        let path = path_attr(resource);
        let mut state = CurrentState::new();
        match fs::read_link(&path) {
            Ok(existing) => {
                state = state
                    .with("exists", json!(true))
                    .with("to", json!(existing.to_string_lossy()));
            }
            Err(_) => {
                state = state.with("exists", json!(false));
            }
        }
        Ok(Some(state))
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
                let to = target(resource)?;
                let pointing_at = current.and_then(|c| c.get("to")).and_then(|v| v.as_str());
                if exists && pointing_at == Some(to.to_string_lossy().as_ref()) {
                    return Ok(ActionOutcome::Unchanged);
                }
                if exists {
                    fs::remove_file(&path)?;
                }
                create_symlink(&to, &path)?;
                Ok(ActionOutcome::changed(format!(
                    "linked {} -> {}",
                    path.display(),
                    to.display()
                )))
            }
            "delete" => {
                if !exists {
                    return Ok(ActionOutcome::Unchanged);
                }
                fs::remove_file(&path)?;
                Ok(ActionOutcome::changed(format!("unlinked {}", path.display())))
            }
            other => Err(unsupported(resource, other)),
        }
    }
}
