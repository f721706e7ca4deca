//! Resource registry.
//!
//! Graph resources (hashtables, variables) are filed in a [`ResourceMap`]
//! under integer ids the host allocates. The map owns every entry; callers
//! only borrow them.
//!
//! The map does no locking of its own. Hosts that share one registry across
//! threads wrap it in [`SharedResources`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::info;

use crate::dtype::DataType;
use crate::factory::create_static_hashtable;
use crate::hashtable::LookupInterface;
use crate::tensor::Tensor;

/// Behaviour common to every registry entry.
pub trait Resource: Send + Sync {
    /// Whether the resource has been populated.
    fn is_initialized(&self) -> bool;

    /// Approximate bytes held.
    fn memory_usage(&self) -> usize;
}

/// A single mutable tensor slot, initialized by its first assignment.
#[derive(Debug, Clone, Default)]
pub struct ResourceVariable {
    tensor: Option<Tensor>,
}

impl ResourceVariable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held tensor.
    pub fn assign(&mut self, tensor: Tensor) {
        self.tensor = Some(tensor);
    }

    /// The held tensor, `None` before the first assignment.
    pub fn value(&self) -> Option<&Tensor> {
        self.tensor.as_ref()
    }
}

impl Resource for ResourceVariable {
    fn is_initialized(&self) -> bool {
        self.tensor.is_some()
    }

    fn memory_usage(&self) -> usize {
        self.tensor.as_ref().map_or(0, Tensor::byte_size)
    }
}

/// An owned registry entry.
pub enum ResourceEntry {
    Hashtable(Box<dyn LookupInterface>),
    Variable(ResourceVariable),
}

impl ResourceEntry {
    pub fn as_lookup(&self) -> Option<&dyn LookupInterface> {
        match self {
            ResourceEntry::Hashtable(table) => Some(&**table),
            ResourceEntry::Variable(_) => None,
        }
    }

    pub fn as_lookup_mut(&mut self) -> Option<&mut (dyn LookupInterface + 'static)> {
        match self {
            ResourceEntry::Hashtable(table) => Some(&mut **table),
            ResourceEntry::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&ResourceVariable> {
        match self {
            ResourceEntry::Variable(var) => Some(var),
            ResourceEntry::Hashtable(_) => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut ResourceVariable> {
        match self {
            ResourceEntry::Variable(var) => Some(var),
            ResourceEntry::Hashtable(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceEntry::Hashtable(_) => "hashtable",
            ResourceEntry::Variable(_) => "variable",
        }
    }
}

impl Resource for ResourceEntry {
    fn is_initialized(&self) -> bool {
        match self {
            ResourceEntry::Hashtable(table) => table.is_initialized(),
            ResourceEntry::Variable(var) => var.is_initialized(),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            ResourceEntry::Hashtable(table) => table.memory_usage(),
            ResourceEntry::Variable(var) => var.memory_usage(),
        }
    }
}

impl std::fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceEntry::Hashtable(table) => f
                .debug_struct("Hashtable")
                .field("key_type", &table.key_type())
                .field("value_type", &table.value_type())
                .field("size", &table.size())
                .field("initialized", &table.is_initialized())
                .finish(),
            ResourceEntry::Variable(var) => f.debug_tuple("Variable").field(var).finish(),
        }
    }
}

/// Registry of resources keyed by host-assigned id.
#[derive(Debug, Default)]
pub struct ResourceMap {
    entries: HashMap<i32, ResourceEntry>,
}

/// Registry shared between threads.
pub type SharedResources = Arc<Mutex<ResourceMap>>;

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new, empty registry for sharing.
    pub fn shared() -> SharedResources {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn contains(&self, resource_id: i32) -> bool {
        self.entries.contains_key(&resource_id)
    }

    pub fn get(&self, resource_id: i32) -> Option<&ResourceEntry> {
        self.entries.get(&resource_id)
    }

    pub fn get_mut(&mut self, resource_id: i32) -> Option<&mut ResourceEntry> {
        self.entries.get_mut(&resource_id)
    }

    /// Files `entry` under `resource_id` unless the id is taken.
    ///
    /// Returns whether the entry was inserted.
    pub fn insert_if_absent(&mut self, resource_id: i32, entry: ResourceEntry) -> bool {
        if self.contains(resource_id) {
            return false;
        }
        self.entries.insert(resource_id, entry);
        true
    }

    /// Removes and returns the entry for `resource_id`.
    pub fn remove(&mut self, resource_id: i32) -> Option<ResourceEntry> {
        self.entries.remove(&resource_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resource ids in ascending order.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total approximate bytes held by all entries.
    pub fn memory_usage(&self) -> usize {
        self.entries.values().map(Resource::memory_usage).sum()
    }
}

/// Creates a hashtable under `resource_id` unless an entry already exists.
///
/// An existing entry is kept as is, even if its types differ from the
/// request. An unsupported type pair inserts nothing.
pub fn create_hashtable_resource_if_not_available(
    resources: &mut ResourceMap,
    resource_id: i32,
    key_dtype: DataType,
    value_dtype: DataType,
) {
    if resources.contains(resource_id) {
        return;
    }
    if let Some(table) = create_static_hashtable(key_dtype, value_dtype) {
        resources.insert_if_absent(resource_id, ResourceEntry::Hashtable(table));
        info!(resource_id, %key_dtype, %value_dtype, "Hashtable resource created");
    }
}

/// The hashtable filed under `resource_id`, if any.
pub fn get_hashtable_resource(
    resources: &mut ResourceMap,
    resource_id: i32,
) -> Option<&mut (dyn LookupInterface + 'static)> {
    resources.get_mut(resource_id)?.as_lookup_mut()
}

/// Creates an unassigned variable under `resource_id` unless an entry exists.
pub fn create_resource_variable_if_not_available(resources: &mut ResourceMap, resource_id: i32) {
    if resources.insert_if_absent(resource_id, ResourceEntry::Variable(ResourceVariable::new())) {
        info!(resource_id, "Resource variable created");
    }
}

/// The variable filed under `resource_id`, if any.
pub fn get_resource_variable(resources: &mut ResourceMap, resource_id: i32) -> Option<&mut ResourceVariable> {
    resources.get_mut(resource_id)?.as_variable_mut()
}
