//! Error types for the convergence engine

use thiserror::Error;

/// Errors raised while converging a resource collection
#[derive(Error, Debug)]
pub enum Error {
    /// No provider is registered for a resource on the node's platform
    #[error("no provider found for {resource} on {platform} {version}")]
    ProviderNotFound {
        resource: String,
        platform: String,
        version: String,
    },

    /// No resource type with this short name is registered
    #[error("no resource type named '{0}' is registered")]
    ResourceNotFound(String),

    /// The node carries none of the platform detection hints
    #[error("cannot determine platform for node '{0}'")]
    UnknownPlatform(String),

    /// A guard command could not be executed at all
    #[error("guard command failed to execute: {0}")]
    GuardExecution(String),

    /// A shelled-out command exceeded its timeout and was killed
    #[error("command timed out after {timeout_secs}s: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },

    /// A provider action failed
    #[error("{resource}: action '{action}' failed: {source}")]
    ActionFailed {
        resource: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// A notification names a target that is not in the collection
    #[error("{notifying} notifies unknown resource {target}")]
    NotificationTargetMissing { notifying: String, target: String },

    /// A resource was declared without an action
    #[error("resource {0} declares no action")]
    MissingAction(String),

    /// A resource reference string could not be parsed
    #[error("invalid resource reference '{0}', expected 'type[name]'")]
    InvalidResourceReference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for convergence operations
pub type Result<T> = std::result::Result<T, Error>;
