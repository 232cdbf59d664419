//! Platform/provider map
//!
//! Two-level registry `(platform, version)` mapping a resource's short
//! type name to the provider that implements it, and symmetrically to
//! the registered resource type definition. Lookups merge three tiers:
//! the global default map, the platform's default map, and the
//! platform's exact-version map, most specific last.

use convergence::{Error, Node, Provider, ProviderResolver, Resource, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Creates a fresh provider instance per resource per run
pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn Provider> + Send + Sync>;

/// A registered provider binding
#[derive(Clone)]
pub struct ProviderBinding {
    pub provider_name: String,
    pub factory: ProviderFactory,
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBinding")
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}

/// A registered resource type: its schema and allowed actions
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeDef {
    pub name: String,
    /// Actions a declaration may request ("nothing" is always allowed)
    pub allowed_actions: Vec<String>,
    /// Documented attribute keys; empty means freeform
    pub attributes: Vec<String>,
}

impl ResourceTypeDef {
    pub fn new(name: impl Into<String>, allowed_actions: &[&str]) -> Self {
        Self {
            name: name.into(),
            allowed_actions: allowed_actions.iter().map(|a| (*a).to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: &[&str]) -> Self {
        self.attributes = attributes.iter().map(|a| (*a).to_string()).collect();
        self
    }

    pub fn allows(&self, action: &str) -> bool {
        action == "nothing" || self.allowed_actions.iter().any(|a| a == action)
    }
}

/// One specificity level of the registry
#[derive(Debug, Clone, Default)]
struct Tier {
    providers: HashMap<String, ProviderBinding>,
    resources: HashMap<String, ResourceTypeDef>,
}

#[derive(Debug, Default)]
struct PlatformEntry {
    default: Tier,
    versions: HashMap<String, Tier>,
}

/// The merged view for one `(platform, version)` pair
#[derive(Debug, Clone, Default)]
pub struct SpecificityMap {
    pub providers: HashMap<String, ProviderBinding>,
    pub resources: HashMap<String, ResourceTypeDef>,
}

/// Registry of platform/version-specific provider and resource bindings
#[derive(Default)]
pub struct PlatformMap {
    global: Tier,
    platforms: HashMap<String, PlatformEntry>,
    /// Flat index for resources that pin an explicit provider
    by_provider_name: HashMap<String, ProviderFactory>,
}

impl fmt::Debug for PlatformMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformMap")
            .field("global", &self.global)
            .field("platforms", &self.platforms)
            .finish_non_exhaustive()
    }
}

impl PlatformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform names are matched lowercased with whitespace collapsed
    /// to underscores ("Mac OS X" and "mac_os_x" are the same key)
    pub fn normalize(name: &str) -> String {
        name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
    }

    /// Register a provider at the requested specificity level:
    /// global default, platform default, or platform + exact version
    pub fn set(
        &mut self,
        platform: Option<&str>,
        version: Option<&str>,
        short_name: &str,
        provider_name: &str,
        factory: ProviderFactory,
    ) {
        let binding = ProviderBinding {
            provider_name: provider_name.to_string(),
            factory: Arc::clone(&factory),
        };
        self.by_provider_name
            .insert(provider_name.to_string(), factory);
        self.tier_mut(platform, version)
            .providers
            .insert(short_name.to_string(), binding);
    }

    /// Register a resource type definition at the requested level
    pub fn register_resource_type(
        &mut self,
        platform: Option<&str>,
        version: Option<&str>,
        def: ResourceTypeDef,
    ) {
        self.tier_mut(platform, version)
            .resources
            .insert(def.name.clone(), def);
    }

    fn tier_mut(&mut self, platform: Option<&str>, version: Option<&str>) -> &mut Tier {
        match platform {
            None => &mut self.global,
            Some(platform) => {
                let entry = self
                    .platforms
                    .entry(Self::normalize(platform))
                    .or_default();
                match version {
                    None => &mut entry.default,
                    Some(version) => entry.versions.entry(version.to_string()).or_default(),
                }
            }
        }
    }

    /// Merged specificity map for a platform and version. Absent
    /// platforms or versions simply contribute nothing.
    pub fn find(&self, platform: &str, version: &str) -> SpecificityMap {
        let mut merged = SpecificityMap {
            providers: self.global.providers.clone(),
            resources: self.global.resources.clone(),
        };
        if let Some(entry) = self.platforms.get(&Self::normalize(platform)) {
            merged.providers.extend(entry.default.providers.clone());
            merged.resources.extend(entry.default.resources.clone());
            if let Some(tier) = entry.versions.get(version) {
                merged.providers.extend(tier.providers.clone());
                merged.resources.extend(tier.resources.clone());
            }
        } else {
            log::debug!("platform '{platform}' not registered, using defaults only");
        }
        merged
    }

    /// Provider binding for a short type name; missing is a hard error
    pub fn find_provider(
        &self,
        platform: &str,
        version: &str,
        short_name: &str,
    ) -> Result<ProviderBinding> {
        self.find(platform, version)
            .providers
            .get(short_name)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound {
                resource: short_name.to_string(),
                platform: platform.to_string(),
                version: version.to_string(),
            })
    }

    /// Resource type definition for a short name; missing is a hard error
    pub fn find_resource(
        &self,
        platform: &str,
        version: &str,
        short_name: &str,
    ) -> Result<ResourceTypeDef> {
        self.find(platform, version)
            .resources
            .get(short_name)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(short_name.to_string()))
    }

    /// Platform and version for a node. Explicit `platform` /
    /// `platform_version` attributes win; otherwise the first detection
    /// hint pair that is fully present wins wholesale, never mixed.
    pub fn platform_and_version(node: &Node) -> Result<(String, String)> {
        if let (Some(platform), Some(version)) = (node.platform(), node.platform_version()) {
            return Ok((Self::normalize(platform), version.to_string()));
        }
        for (platform_key, version_key) in convergence::node::PLATFORM_HINTS {
            if let (Some(platform), Some(version)) =
                (node.get_str(platform_key), node.get_str(version_key))
            {
                return Ok((Self::normalize(platform), version.to_string()));
            }
        }
        Err(Error::UnknownPlatform(node.name().to_string()))
    }
}

impl ProviderResolver for PlatformMap {
    fn resolve(&self, node: &Node, resource: &Resource) -> Result<Box<dyn Provider>> {
        if let Some(pinned) = resource.provider() {
            let factory = self.by_provider_name.get(pinned).ok_or_else(|| {
                Error::ProviderNotFound {
                    resource: resource.type_name().to_string(),
                    platform: "pinned".to_string(),
                    version: pinned.to_string(),
                }
            })?;
            log::debug!("{resource} pins provider '{pinned}'");
            return Ok(factory());
        }
        let (platform, version) = Self::platform_and_version(node)?;
        let binding = self.find_provider(&platform, &version, resource.type_name())?;
        log::debug!(
            "{resource} resolved to provider '{}' on {platform} {version}",
            binding.provider_name
        );
        Ok((binding.factory)())
    }
}
