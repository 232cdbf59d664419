//! Declared resources
//!
//! A resource is a unit of desired state: a short type name (`file`),
//! an instance name (`/tmp/motd`), an attribute bag, the action to
//! take, guards, and notifications. The provider bound to it at run
//! time does the actual work.

use crate::error::Error;
use crate::guard::Guard;
use crate::notification::Notification;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identity of a resource within a collection: `(type, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub type_name: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    /// Parse the `type[name]` reference form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let open = s
            .find('[')
            .ok_or_else(|| Error::InvalidResourceReference(s.to_string()))?;
        if !s.ends_with(']') || open == 0 || open + 2 > s.len() - 1 {
            return Err(Error::InvalidResourceReference(s.to_string()));
        }
        let type_name = &s[..open];
        let name = &s[open + 1..s.len() - 1];
        if name.is_empty() {
            return Err(Error::InvalidResourceReference(s.to_string()));
        }
        Ok(Self::new(type_name, name))
    }
}

/// An action a provider can perform, e.g. `create`, `run`, `delete`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    /// The explicit no-op action for notification-only targets
    pub const NOTHING: &'static str = "nothing";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn nothing() -> Self {
        Self(Self::NOTHING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nothing(&self) -> bool {
        self.0 == Self::NOTHING
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A declared unit of desired state
#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    attributes: BTreeMap<String, Value>,
    action: Action,
    guards: Vec<Guard>,
    notifications: Vec<Notification>,
    ignore_failure: bool,
    /// Explicitly pinned provider name, bypassing the platform map
    provider: Option<String>,
    updated: bool,
    cookbook: Option<String>,
    source_line: Option<String>,
}

impl Resource {
    /// Start declaring a resource; an action must be set before `build`
    pub fn declare(type_name: impl Into<String>, name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            id: ResourceId::new(type_name, name),
            attributes: BTreeMap::new(),
            action: None,
            guards: Vec::new(),
            notifications: Vec::new(),
            ignore_failure: false,
            provider: None,
            cookbook: None,
            source_line: None,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.id.type_name
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn ignore_failure(&self) -> bool {
        self.ignore_failure
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    pub(crate) fn mark_updated(&mut self) {
        self.updated = true;
    }

    pub fn cookbook(&self) -> Option<&str> {
        self.cookbook.as_deref()
    }

    pub fn source_line(&self) -> Option<&str> {
        self.source_line.as_deref()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// Builder for [`Resource`]
#[derive(Debug)]
pub struct ResourceBuilder {
    id: ResourceId,
    attributes: BTreeMap<String, Value>,
    action: Option<Action>,
    guards: Vec<Guard>,
    notifications: Vec<Notification>,
    ignore_failure: bool,
    provider: Option<String>,
    cookbook: Option<String>,
    source_line: Option<String>,
}

impl ResourceBuilder {
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attributes(mut self, attrs: BTreeMap<String, Value>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn notifies(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn ignore_failure(mut self, ignore: bool) -> Self {
        self.ignore_failure = ignore;
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    pub fn cookbook(mut self, name: impl Into<String>) -> Self {
        self.cookbook = Some(name.into());
        self
    }

    pub fn source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }

    /// Finish the declaration; every resource must carry an action
    pub fn build(self) -> Result<Resource, Error> {
        let action = self
            .action
            .ok_or_else(|| Error::MissingAction(self.id.to_string()))?;
        Ok(Resource {
            id: self.id,
            attributes: self.attributes,
            action,
            guards: self.guards,
            notifications: self.notifications,
            ignore_failure: self.ignore_failure,
            provider: self.provider,
            updated: false,
            cookbook: self.cookbook,
            source_line: self.source_line,
        })
    }
}
