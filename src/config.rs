//! Agent configuration file
//!
//! A small TOML file pointing the agent at its on-disk state. Every
//! field has a default relative to the config file's directory, so an
//! empty file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Node document (JSON)
    #[serde(default)]
    pub node_path: Option<PathBuf>,
    /// Directory of role documents (JSON, one per role)
    #[serde(default)]
    pub roles_dir: Option<PathBuf>,
    /// Directory of cookbooks
    #[serde(default)]
    pub cookbooks_dir: Option<PathBuf>,
    /// Where to write the run report (JSON); stdout-only when unset
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl AgentConfig {
    /// Load a config file, anchoring relative paths at its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.anchor(base);
        Ok(config)
    }

    /// Defaults for a base directory without a config file
    pub fn for_dir(base: &Path) -> Self {
        let mut config = Self::default();
        config.anchor(base);
        config
    }

    fn anchor(&mut self, base: &Path) {
        let anchor = |path: &mut Option<PathBuf>, fallback: &str| {
            match path {
                Some(p) if p.is_relative() => *p = base.join(&*p),
                Some(_) => {}
                None => *path = Some(base.join(fallback)),
            }
        };
        anchor(&mut self.node_path, "node.json");
        anchor(&mut self.roles_dir, "roles");
        anchor(&mut self.cookbooks_dir, "cookbooks");
        // report_path stays unset unless configured
        if let Some(p) = &mut self.report_path {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    pub fn node_path(&self) -> &Path {
        self.node_path.as_deref().unwrap_or_else(|| Path::new("node.json"))
    }

    pub fn roles_dir(&self) -> &Path {
        self.roles_dir.as_deref().unwrap_or_else(|| Path::new("roles"))
    }

    pub fn cookbooks_dir(&self) -> &Path {
        self.cookbooks_dir.as_deref().unwrap_or_else(|| Path::new("cookbooks"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_anchored_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caldera.toml");
        fs::write(&path, "").unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.node_path(), dir.path().join("node.json"));
        assert_eq!(config.roles_dir(), dir.path().join("roles"));
        assert_eq!(config.cookbooks_dir(), dir.path().join("cookbooks"));
        assert!(config.report_path.is_none());
    }

    #[test]
    fn absolute_paths_are_kept_and_relative_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caldera.toml");
        fs::write(
            &path,
            "node_path = \"/etc/caldera/node.json\"\nroles_dir = \"shared/roles\"\n",
        )
        .unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.node_path(), Path::new("/etc/caldera/node.json"));
        assert_eq!(config.roles_dir(), dir.path().join("shared/roles"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caldera.toml");
        fs::write(&path, "nodes_path = \"x\"\n").unwrap();
        assert!(AgentConfig::load(&path).is_err());
    }
}
