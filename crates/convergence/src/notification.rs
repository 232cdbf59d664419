//! Notifications between resources
//!
//! A resource that actually changed may trigger an action on another
//! resource, either inline (`Immediate`) or queued until the end of the
//! run (`Delayed`).

use crate::resource::{Action, ResourceId};
use serde::{Deserialize, Serialize};

/// When a notification fires relative to the notifying resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    /// Run the target's action inline, before the next resource
    Immediate,
    /// Queue the target's action until every resource has been processed
    Delayed,
}

/// A directive: when this resource changes, run `action` on `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: ResourceId,
    pub action: Action,
    pub timing: Timing,
}

impl Notification {
    pub fn new(target: ResourceId, action: Action, timing: Timing) -> Self {
        Self {
            target,
            action,
            timing,
        }
    }
}
