//! Built-in providers and their registration table
//!
//! Every provider here is platform-neutral and registered into the
//! global default tier of the platform map at startup. Cookbook-aware
//! providers are registered per run, once the cookbook set is loaded.

use crate::cookbook::CookbookSet;
use crate::platform::{PlatformMap, ResourceTypeDef};
use convergence::{Error, Resource};
use std::path::PathBuf;
use std::sync::Arc;

pub mod cookbook_file;
pub mod directory;
pub mod execute;
pub mod file;
pub mod link;
pub mod log;

pub use cookbook_file::CookbookFileProvider;
pub use directory::DirectoryProvider;
pub use execute::ExecuteProvider;
pub use file::FileProvider;
pub use link::LinkProvider;

/// Register the built-in resource types and providers
pub fn register_builtins(map: &mut PlatformMap) {
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("file", &["create", "delete", "touch"])
            .with_attributes(&["path", "content"]),
    );
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("directory", &["create", "delete"])
            .with_attributes(&["path", "recursive"]),
    );
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("link", &["create", "delete"]).with_attributes(&["path", "to"]),
    );
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("execute", &["run"])
            .with_attributes(&["command", "cwd", "env", "timeout"]),
    );
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("log", &["write"]).with_attributes(&["message", "level"]),
    );

    map.set(None, None, "file", "file", Arc::new(|| Box::new(FileProvider)));
    map.set(
        None,
        None,
        "directory",
        "directory",
        Arc::new(|| Box::new(DirectoryProvider)),
    );
    map.set(None, None, "link", "link", Arc::new(|| Box::new(LinkProvider)));
    map.set(
        None,
        None,
        "execute",
        "execute",
        Arc::new(|| Box::new(ExecuteProvider)),
    );
    map.set(
        None,
        None,
        "log",
        "log",
        Arc::new(|| Box::new(self::log::LogProvider)),
    );
}

/// Register providers that materialize cookbook-shipped content
pub fn register_cookbook_providers(map: &mut PlatformMap, cookbooks: Arc<CookbookSet>) {
    map.register_resource_type(
        None,
        None,
        ResourceTypeDef::new("cookbook_file", &["create", "delete"])
            .with_attributes(&["path", "source", "cookbook"]),
    );
    map.set(
        None,
        None,
        "cookbook_file",
        "cookbook_file",
        Arc::new(move || {
            Box::new(CookbookFileProvider {
                cookbooks: Arc::clone(&cookbooks),
            })
        }),
    );
}

/// A platform map preloaded with the built-in bindings
pub fn builtin_map() -> PlatformMap {
    let mut map = PlatformMap::new();
    register_builtins(&mut map);
    map
}

/// The filesystem path a resource manages: its `path` attribute, or
/// its name when unset
pub(crate) fn path_attr(resource: &Resource) -> PathBuf {
    resource
        .attribute_str("path")
        .unwrap_or_else(|| resource.name())
        .into()
}

/// Error for an action a provider does not implement
pub(crate) fn unsupported(resource: &Resource, action: &str) -> Error {
    Error::ActionFailed {
        resource: resource.id().to_string(),
        action: action.to_string(),
        source: anyhow::anyhow!("action not supported by this provider"),
    }
}
