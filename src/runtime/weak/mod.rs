//! Weak-valued registry
//!
//! A map whose entries do not keep their values alive. Inserting takes a
//! strong reference but only a [`Weak`] is stored; once every other owner
//! drops its [`Rc`], the entry becomes invisible to lookups and iteration,
//! and is physically removed on the next [`WeakRegistry::purge`].
//!
//! # Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use lege::runtime::weak::WeakRegistry;
//!
//! let mut registry = WeakRegistry::new();
//! let value = Rc::new("task");
//! registry.insert(1u32, &value);
//! assert!(registry.lookup(&1).is_some());
//!
//! drop(value);
//! assert!(registry.lookup(&1).is_none());
//! ```

use indexmap::IndexMap;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// Associative store holding only weak references to its values.
pub struct WeakRegistry<K, V> {
    entries: IndexMap<K, Weak<V>>,
}

impl<K, V> WeakRegistry<K, V>
where
    K: Hash + Eq,
{
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Register `value` under `key` without taking ownership of it.
    ///
    /// Inserting a key whose entry is still live is a logic error: it trips a
    /// debug assertion, and release builds replace the old entry.
    pub fn insert(
        &mut self,
        key: K,
        value: &Rc<V>,
    ) {
        debug_assert!(
            !self.contains_live(&key),
            "duplicate live key inserted into weak registry"
        );
        self.entries.insert(key, Rc::downgrade(value));
    }

    /// Look up a value, returning `None` once it is otherwise unreferenced.
    #[inline]
    pub fn lookup(
        &self,
        key: &K,
    ) -> Option<Rc<V>> {
        self.entries.get(key).and_then(Weak::upgrade)
    }

    /// Remove an entry, returning the value if it was still alive.
    pub fn remove(
        &mut self,
        key: &K,
    ) -> Option<Rc<V>> {
        self.entries.swap_remove(key).and_then(|weak| weak.upgrade())
    }

    /// Whether `key` maps to a value that is still alive.
    #[inline]
    pub fn contains_live(
        &self,
        key: &K,
    ) -> bool {
        self.entries
            .get(key)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Visit every live entry. Dead entries are skipped.
    pub fn for_each<F>(
        &self,
        mut f: F,
    ) where
        F: FnMut(&K, Rc<V>),
    {
        for (key, weak) in &self.entries {
            if let Some(value) = weak.upgrade() {
                f(key, value);
            }
        }
    }

    /// Iterate over live entries.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Rc<V>)> + '_ {
        self.entries
            .iter()
            .filter_map(|(key, weak)| weak.upgrade().map(|value| (key, value)))
    }

    /// Number of entries whose values are still alive.
    pub fn len_live(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of stored slots, including dead ones not yet purged.
    #[inline]
    pub fn slots(&self) -> usize {
        self.entries.len()
    }

    /// Whether no live entry remains.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len_live() == 0
    }

    /// Drop slots whose values have been reclaimed. Returns how many went.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }
}

impl<K, V> Default for WeakRegistry<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for WeakRegistry<K, V>
where
    K: Hash + Eq + fmt::Debug,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("live", &self.len_live())
            .field("slots", &self.slots())
            .finish()
    }
}

#[cfg(test)]
mod tests;
