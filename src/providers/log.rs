//! Log message provider

use super::unsupported;
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Resource, Result};

/// Emits a message into the agent log as a resource action
#[derive(Debug)]
pub struct LogProvider;

impl Provider for LogProvider {
    fn run_action(
        &mut self,
        resource: &Resource,
        _current: Option<&CurrentState>,
        action: &Action,
        _ctx: &ProviderContext<'_>,
    ) -> Result<ActionOutcome> {
        if action.as_str() != "write" {
            return Err(unsupported(resource, action.as_str()));
        }

        let message = resource
            .attribute_str("message")
            .unwrap_or_else(|| resource.name());
        match resource.attribute_str("level").unwrap_or("info") {
            "debug" => log::debug!("{message}"),
            "warn" => log::warn!("{message}"),
            "error" => log::error!("{message}"),
            _ => log::info!("{message}"),
        }
        Ok(ActionOutcome::changed("wrote log message"))
    }
}
