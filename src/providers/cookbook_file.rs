//! Cookbook file provider
//!
//! Copies a file shipped in a cookbook's `files/` segment to the node,
//! picking the most specific variant the manifest offers for this node.

use super::{path_attr, unsupported};
use crate::cookbook::{CookbookSet, specificity_query};
use convergence::provider::{ActionOutcome, CurrentState, Provider, ProviderContext};
use convergence::{Action, Error, Resource, Result};
use manifest::ManifestEntry;
use serde_json::json;
use std::fs;
use std::sync::Arc;

/// Materializes files shipped inside cookbooks
#[derive(Debug)]
pub struct CookbookFileProvider {
    pub(crate) cookbooks: Arc<CookbookSet>,
}

impl CookbookFileProvider {
    /// The manifest name to look up: the `source` attribute, or the
    /// final component of the managed path
    fn source_name(resource: &Resource) -> String {
        if let Some(source) = resource.attribute_str("source") {
            return source.to_string();
        }
        path_attr(resource)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| resource.name().to_string())
    }

    fn lookup<'a>(
        &'a self,
        resource: &Resource,
        ctx: &ProviderContext<'_>,
    ) -> Result<&'a ManifestEntry> {
        let missing = |what: String| Error::ActionFailed {
            resource: resource.id().to_string(),
            action: resource.action().to_string(),
            source: anyhow::anyhow!(what),
        };

        let cookbook_name = resource
            .attribute_str("cookbook")
            .or_else(|| resource.cookbook())
            .ok_or_else(|| missing("no cookbook to fetch from".to_string()))?;
        let cookbook = self
            .cookbooks
            .get(cookbook_name)
            .ok_or_else(|| missing(format!("cookbook '{cookbook_name}' is not loaded")))?;

        let source = Self::source_name(resource);
        let query = specificity_query(ctx.node);
        cookbook
            .manifest
            .preferred_record(&query, "files", &source)
            .ok_or_else(|| {
                missing(format!(
                    "cookbook '{cookbook_name}' ships no file '{source}' for this node"
                ))
            })
    }
}

impl Provider for CookbookFileProvider {
    fn load_current(
        &mut self,
        resource: &Resource,
        _ctx: &ProviderContext<'_>,
    ) -> Result<Option<CurrentState>> {
        let path = path_attr(resource);
        let mut state = CurrentState::new().with("exists", json!(path.is_file()));
        if path.is_file() {
            let checksum = manifest::hash_file(&path).map_err(|e| Error::ActionFailed {
                resource: resource.id().to_string(),
                action: resource.action().to_string(),
                source: anyhow::anyhow!("could not checksum {}: {e}", path.display()),
            })?;
            state = state.with("checksum", json!(checksum));
        }
        Ok(Some(state))
    }

    fn run_action(
        &mut self,
        resource: &Resource,
        current: Option<&CurrentState>,
        action: &Action,
        ctx: &ProviderContext<'_>,
    ) -> Result<ActionOutcome> {
        let path = path_attr(resource);
        let exists = current
            .and_then(|c| c.get("exists"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        match action.as_str() {
            "create" => {
                let entry = self.lookup(resource, ctx)?;
                let actual = current.and_then(|c| c.get("checksum")).and_then(|v| v.as_str());
                if exists && actual == Some(entry.checksum.as_str()) {
                    return Ok(ActionOutcome::Unchanged);
                }
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&entry.path, &path)?;
                log::debug!(
                    "copied {} ({}) to {}",
                    entry.name,
                    entry.specificity,
                    path.display()
                );
                Ok(ActionOutcome::changed(format!(
                    "copied {} to {}",
                    entry.name,
                    path.display()
                )))
            }
            "delete" => {
                if !exists {
                    return Ok(ActionOutcome::Unchanged);
                }
                fs::remove_file(&path)?;
                Ok(ActionOutcome::changed(format!("removed {}", path.display())))
            }
            other => Err(unsupported(resource, other)),
        }
    }
}
