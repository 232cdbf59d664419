//! Ordered resource collection
//!
//! Resources execute in declaration order, so the collection preserves
//! insertion order. Re-declaring an existing `(type, name)` replaces
//! the earlier entry in place without moving it.

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceId};
use std::collections::HashMap;

/// Insertion-ordered container of declared resources
#[derive(Debug, Default)]
pub struct ResourceCollection {
    resources: Vec<Resource>,
    by_id: HashMap<ResourceId, usize>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, or overwrite an earlier declaration in place.
    /// Returns the resource's position in execution order.
    pub fn declare(&mut self, resource: Resource) -> usize {
        match self.by_id.get(resource.id()) {
            Some(&idx) => {
                log::debug!("re-declared {}, overwriting in place", resource.id());
                self.resources[idx] = resource;
                idx
            }
            None => {
                let idx = self.resources.len();
                self.by_id.insert(resource.id().clone(), idx);
                self.resources.push(resource);
                idx
            }
        }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.by_id.get(id).map(|&idx| &self.resources[idx])
    }

    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Look a resource up by its `type[name]` reference string
    pub fn lookup(&self, reference: &str) -> Result<&Resource> {
        let id: ResourceId = reference.parse()?;
        self.get(&id)
            .ok_or_else(|| Error::InvalidResourceReference(reference.to_string()))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub(crate) fn at(&self, idx: usize) -> &Resource {
        &self.resources[idx]
    }

    pub(crate) fn at_mut(&mut self, idx: usize) -> &mut Resource {
        &mut self.resources[idx]
    }
}

impl<'a> IntoIterator for &'a ResourceCollection {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}
