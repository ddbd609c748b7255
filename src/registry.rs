//! Group key to state mapping
//!
//! Every engine owns one [`GroupRegistry`]. State is created lazily the first
//! time a group key is seen and lives until the registry is cleared or
//! replaced wholesale by a restore. There is no per-group eviction.

#[cfg(feature = "std")]
use std::{
    collections::{btree_map, BTreeMap},
    string::String,
};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{
    collections::{btree_map, BTreeMap},
    string::String,
};

/// Lazily populated map from group key to per-group state
///
/// Iteration order is an implementation detail; callers must not rely on it.
///
/// # Example
///
/// ```
/// use groupflow::registry::GroupRegistry;
///
/// let mut registry: GroupRegistry<u32> = GroupRegistry::new();
/// *registry.get_or_create("host=a", || 0) += 1;
/// *registry.get_or_create("host=a", || 0) += 1;
///
/// assert_eq!(registry.get("host=a"), Some(&2));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRegistry<S> {
    groups: BTreeMap<String, S>,
}

impl<S> Default for GroupRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> GroupRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    /// State for `key`, created with `factory` on first sight
    pub fn get_or_create<F>(&mut self, key: &str, factory: F) -> &mut S
    where
        F: FnOnce() -> S,
    {
        match self.groups.entry(String::from(key)) {
            btree_map::Entry::Occupied(entry) => entry.into_mut(),
            btree_map::Entry::Vacant(entry) => {
                log::debug!("creating state for group {:?}", key);
                entry.insert(factory())
            }
        }
    }

    /// State for `key`, if the group has been seen
    pub fn get(&self, key: &str) -> Option<&S> {
        self.groups.get(key)
    }

    /// Iterate over `(key, state)` pairs
    pub fn iter(&self) -> btree_map::Iter<'_, String, S> {
        self.groups.iter()
    }

    /// Iterate mutably over `(key, state)` pairs
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, S> {
        self.groups.iter_mut()
    }

    /// Iterate over known group keys
    pub fn keys(&self) -> btree_map::Keys<'_, String, S> {
        self.groups.keys()
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no group has been seen
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop every group
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Replace the whole contents, returning the previous map
    pub fn replace(&mut self, groups: BTreeMap<String, S>) -> BTreeMap<String, S> {
        core::mem::replace(&mut self.groups, groups)
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, S> {
        &self.groups
    }
}

impl<S> From<BTreeMap<String, S>> for GroupRegistry<S> {
    fn from(groups: BTreeMap<String, S>) -> Self {
        Self { groups }
    }
}

impl<'a, S> IntoIterator for &'a GroupRegistry<S> {
    type Item = (&'a String, &'a S);
    type IntoIter = btree_map::Iter<'a, String, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
