//! Plain file provider

use super::{path_attr, unsupported};
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Error, Resource, Result};
use serde_json::json;
use std::fs;
use std::time::SystemTime;

/// Manages a file's existence and content
#[derive(Debug)]
pub struct FileProvider;

impl Provider for FileProvider {
    fn load_current(
        &mut self,
        resource: &Resource,
        _ctx: &ProviderContext<'_>,
    ) -> Result<Option<CurrentState>> {
        let path = path_attr(resource);
        let mut state = CurrentState::new().with("exists", json!(path.is_file()));
        if path.is_file() {
            let content = fs::read_to_string(&path)?;
            state = state.with("content", json!(content));
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
                let desired = resource.attribute_str("content");
                let actual = current.and_then(|c| c.get("content")).and_then(|v| v.as_str());
                if exists && (desired.is_none() || desired == actual) {
                    return Ok(ActionOutcome::Unchanged);
                }
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, desired.unwrap_or(""))?;
                Ok(ActionOutcome::changed(format!("wrote {}", path.display())))
            }
            "delete" => {
                if !exists {
                    return Ok(ActionOutcome::Unchanged);
                }
                fs::remove_file(&path)?;
                Ok(ActionOutcome::changed(format!("removed {}", path.display())))
            }
            "touch" => {
                let file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)?;
                file.set_modified(SystemTime::now())
                    .map_err(Error::Io)?;
                Ok(ActionOutcome::changed(format!("touched {}", path.display())))
            }
            other => Err(unsupported(resource, other)),
        }
    }
}
