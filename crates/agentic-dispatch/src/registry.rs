//! Capability registries: one ordered, copy-on-write table per category.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::capability::{Capability, CapabilityCategory, CapabilityDescriptor};
use crate::error::{DispatchError, DispatchResult};
use crate::template::match_uri_template;

const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// What `register` does when the name already exists in the category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with [`DispatchError::DuplicateName`].
    #[default]
    Reject,
    /// Overwrite in place; the entry keeps its listing position.
    Replace,
}

#[derive(Clone, Default)]
struct Table {
    entries: Vec<Arc<Capability>>,
    index: HashMap<String, usize>,
}

impl Table {
    fn get(&self, name: &str) -> Option<&Arc<Capability>> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, cap)| (cap.name().to_string(), pos))
            .collect();
    }
}

/// Immutable snapshot of one category, in registration order.
///
/// Iterating does not hold any lock, and the snapshot can be iterated again.
#[derive(Clone)]
pub struct CapabilityList {
    table: Arc<Table>,
}

impl CapabilityList {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Capability>> + '_ {
        self.table.entries.iter()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CapabilityDescriptor> + '_ {
        self.iter().map(|c| c.descriptor())
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a CapabilityList {
    type Item = &'a Arc<Capability>;
    type IntoIter = std::slice::Iter<'a, Arc<Capability>>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.entries.iter()
    }
}

/// Tools, resources, and prompts, each in its own namespace.
///
/// Readers take a snapshot (`Arc` clone) and release the lock immediately;
/// writers rebuild the table and swap it in, so a lookup never observes a
/// half-applied registration and no lock outlives a call.
pub struct Registry {
    policy: DuplicatePolicy,
    tools: RwLock<Arc<Table>>,
    resources: RwLock<Arc<Table>>,
    prompts: RwLock<Arc<Table>>,
    changes: broadcast::Sender<CapabilityCategory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl Registry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            policy,
            tools: RwLock::default(),
            resources: RwLock::default(),
            prompts: RwLock::default(),
            changes,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn slot(&self, category: CapabilityCategory) -> &RwLock<Arc<Table>> {
        match category {
            CapabilityCategory::Tool => &self.tools,
            CapabilityCategory::Resource => &self.resources,
            CapabilityCategory::Prompt => &self.prompts,
        }
    }

    fn snapshot(&self, category: CapabilityCategory) -> Arc<Table> {
        Arc::clone(&self.slot(category).read())
    }

    /// Add a capability to `category`, applying the duplicate policy.
    pub fn register(
        &self,
        category: CapabilityCategory,
        capability: Capability,
    ) -> DispatchResult<Arc<Capability>> {
        let entry = Arc::new(capability);
        let name = entry.name().to_string();
        {
            let mut slot = self.slot(category).write();
            let mut table = Table::clone(&slot);
            match table.index.get(&name).copied() {
                Some(_) if self.policy == DuplicatePolicy::Reject => {
                    return Err(DispatchError::DuplicateName { category, name });
                }
                Some(pos) => {
                    tracing::debug!(%category, name = %name, "Replacing registered capability");
                    table.entries[pos] = Arc::clone(&entry);
                }
                None => {
                    table.index.insert(name.clone(), table.entries.len());
                    table.entries.push(Arc::clone(&entry));
                }
            }
            *slot = Arc::new(table);
        }

        tracing::debug!(%category, name = %name, "Registered capability");
        // No subscribers is fine.
        let _ = self.changes.send(category);
        Ok(entry)
    }

    pub fn unregister(
        &self,
        category: CapabilityCategory,
        name: &str,
    ) -> DispatchResult<Arc<Capability>> {
        let removed = {
            let mut slot = self.slot(category).write();
            let pos = slot.index.get(name).copied().ok_or_else(|| DispatchError::NotFound {
                category,
                name: name.to_string(),
            })?;
            let mut table = Table::clone(&slot);
            let removed = table.entries.remove(pos);
            table.reindex();
            *slot = Arc::new(table);
            removed
        };

        tracing::debug!(%category, name, "Unregistered capability");
        let _ = self.changes.send(category);
        Ok(removed)
    }

    /// Exact-name lookup.
    pub fn lookup(
        &self,
        category: CapabilityCategory,
        name: &str,
    ) -> DispatchResult<Arc<Capability>> {
        self.snapshot(category)
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound {
                category,
                name: name.to_string(),
            })
    }

    /// First template resource (in registration order) matching `uri`,
    /// together with the captured variables.
    pub fn match_resource_template(
        &self,
        uri: &str,
    ) -> Option<(Arc<Capability>, Map<String, Value>)> {
        let table = self.snapshot(CapabilityCategory::Resource);
        table
            .entries
            .iter()
            .filter(|c| c.descriptor().is_template())
            .find_map(|c| match_uri_template(c.name(), uri).map(|vars| (Arc::clone(c), vars)))
    }

    pub fn list(&self, category: CapabilityCategory) -> CapabilityList {
        CapabilityList {
            table: self.snapshot(category),
        }
    }

    pub fn len(&self, category: CapabilityCategory) -> usize {
        self.slot(category).read().entries.len()
    }

    pub fn is_empty(&self, category: CapabilityCategory) -> bool {
        self.len(category) == 0
    }

    /// Receive the category of every successful registry mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<CapabilityCategory> {
        self.changes.subscribe()
    }
}
