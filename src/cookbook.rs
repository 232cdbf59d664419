//! Cookbooks and the loaded cookbook set
//!
//! A cookbook is a named directory of recipes plus a content manifest
//! of the files it ships. The agent only reads cookbooks; downloading
//! and caching them is someone else's job.

use anyhow::{Context, Result, bail};
use convergence::Node;
use manifest::{Manifest, SpecificityQuery};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One loaded cookbook
#[derive(Debug)]
pub struct Cookbook {
    pub name: String,
    pub path: PathBuf,
    pub manifest: Manifest,
}

impl Cookbook {
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let manifest = Manifest::scan(path)
            .with_context(|| format!("could not scan cookbook '{name}'"))?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            manifest,
        })
    }

    /// Path of a recipe in this cookbook, if it exists
    pub fn recipe_path(&self, recipe: &str) -> Option<PathBuf> {
        let path = self.path.join("recipes").join(format!("{recipe}.toml"));
        path.is_file().then_some(path)
    }
}

/// Every cookbook available to the current run, keyed by name
#[derive(Debug, Default)]
pub struct CookbookSet {
    cookbooks: HashMap<String, Cookbook>,
}

impl CookbookSet {
    /// Load every cookbook directory under `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("cookbook path {} is not a directory", dir.display());
        }
        let mut cookbooks = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let cookbook = Cookbook::load(&name, &entry.path())?;
            log::debug!(
                "loaded cookbook '{name}' ({} manifest entries)",
                cookbook.manifest.len()
            );
            cookbooks.insert(name, cookbook);
        }
        Ok(Self { cookbooks })
    }

    pub fn get(&self, name: &str) -> Option<&Cookbook> {
        self.cookbooks.get(name)
    }

    pub fn len(&self) -> usize {
        self.cookbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookbooks.is_empty()
    }
}

/// Split a recipe reference into cookbook and recipe: `apache2` means
/// `apache2::default`
pub fn parse_recipe_name(name: &str) -> (&str, &str) {
    match name.split_once("::") {
        Some((cookbook, recipe)) => (cookbook, recipe),
        None => (name, "default"),
    }
}

/// Specificity facts for a node, for manifest resolution
pub fn specificity_query(node: &Node) -> SpecificityQuery {
    SpecificityQuery {
        fqdn: node.fqdn().map(str::to_string),
        platform: node.platform().map(str::to_string),
        platform_version: node.platform_version().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn recipe_names_default_to_the_default_recipe() {
        assert_eq!(parse_recipe_name("apache2"), ("apache2", "default"));
        assert_eq!(parse_recipe_name("apache2::ssl"), ("apache2", "ssl"));
    }

    #[test]
    fn loads_cookbook_directories() {
        let dir = tempfile::tempdir().unwrap();
        let apache = dir.path().join("apache2");
        fs::create_dir_all(apache.join("recipes")).unwrap();
        fs::create_dir_all(apache.join("files/default")).unwrap();
        fs::write(apache.join("recipes/default.toml"), "").unwrap();
        fs::write(apache.join("files/default/apache2.conf"), "conf").unwrap();

        let set = CookbookSet::load(dir.path()).unwrap();
        assert_eq!(set.len(), 1);
        let cookbook = set.get("apache2").unwrap();
        assert!(cookbook.recipe_path("default").is_some());
        assert!(cookbook.recipe_path("ssl").is_none());
        assert_eq!(cookbook.manifest.len(), 1);
    }
}
