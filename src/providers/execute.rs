//! Command execution provider
//!
//! Running a command is always a change; idempotence comes from the
//! declaring recipe's guards.

use super::unsupported;
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Error, Resource, Result, ShellCommand};
use std::time::Duration;

/// Runs a shell command as a resource action
#[derive(Debug)]
pub struct ExecuteProvider;

fn build_command(resource: &Resource) -> ShellCommand {
    let raw = resource
        .attribute_str("command")
        .unwrap_or_else(|| resource.name());
    let mut command = ShellCommand::new(raw);
    if let Some(cwd) = resource.attribute_str("cwd") {
        command = command.cwd(cwd);
    }
    if let Some(timeout) = resource.attribute("timeout").and_then(|v| v.as_u64()) {
        command = command.timeout(Duration::from_secs(timeout));
    }
    if let Some(env) = resource.attribute("env").and_then(|v| v.as_object()) {
        for (key, value) in env {
            if let Some(value) = value.as_str() {
                command = command.env(key, value);
            }
        }
    }
    command
}

impl Provider for ExecuteProvider {
    fn run_action(
        &mut self,
        resource: &Resource,
        _current: Option<&CurrentState>,
        action: &Action,
        _ctx: &ProviderContext<'_>,
    ) -> Result<ActionOutcome> {
        if action.as_str() != "run" {
            return Err(unsupported(resource, action.as_str()));
        }

        let command = build_command(resource);
        let output = command.run()?;
        if !output.success {
            return Err(Error::ActionFailed {
                resource: resource.id().to_string(),
                action: action.to_string(),
                source: anyhow::anyhow!(
                    "command exited with {:?}: {}",
                    output.code,
                    output.stderr_str().trim()
                ),
            });
        }
        Ok(ActionOutcome::changed(format!("ran '{}'", command.command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::Node;
    use serde_json::json;

    fn run(resource: &Resource) -> Result<ActionOutcome> {
        let node = Node::new("latte");
        let ctx = ProviderContext { node: &node };
        ExecuteProvider.run_action(resource, None, &Action::new("run"), &ctx)
    }

    #[test]
    fn successful_command_is_a_change() {
        let resource = Resource::declare("execute", "true")
            .action("run")
            .build()
            .unwrap();
        assert!(run(&resource).unwrap().is_changed());
    }

    #[test]
    fn failing_command_is_an_action_failure() {
        let resource = Resource::declare("execute", "exit 9")
            .action("run")
            .build()
            .unwrap();
        assert!(matches!(run(&resource), Err(Error::ActionFailed { .. })));
    }

    #[test]
    fn side_effects_run_in_the_declared_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let resource = Resource::declare("execute", "make marker")
            .action("run")
            .attribute("command", json!("touch marker"))
            .attribute("cwd", json!(dir.path().to_string_lossy()))
            .build()
            .unwrap();
        assert!(run(&resource).unwrap().is_changed());
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn overrunning_command_times_out() {
        let resource = Resource::declare("execute", "sleep 30")
            .action("run")
            .attribute("timeout", json!(0))
            .build()
            .unwrap();
        assert!(matches!(run(&resource), Err(Error::CommandTimeout { .. })));
    }
}
