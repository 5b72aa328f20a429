// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Realm-wide registry of ES module entries

use crate::module_system::entry::{ModuleEntry, ModuleHandle, ModuleSource, ModuleState};
use crate::module_system::key::ModuleKey;
use crate::module_system::promise::ModulePromise;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Thread-safe map from module key to its entry.
///
/// Entries are created on first reference and live as long as the registry.
/// No guard is held once a method returns, so hosts called by the loader can
/// freely call back into the registry.
pub struct ModuleRegistry {
    /// Entries by resolved key
    entries: DashMap<ModuleKey, ModuleHandle>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get an entry without creating it
    pub fn get(&self, key: &ModuleKey) -> Option<ModuleHandle> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Get the entry for `key`, creating an unfetched one if absent
    pub fn ensure_registered(&self, key: &ModuleKey) -> ModuleHandle {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(ModuleEntry::new(key.clone()));
                vacant.insert(Arc::clone(&entry));
                tracing::trace!(module = %key, "registered module");
                entry
            }
        }
    }

    /// Raise `entry` to at least `state`. Never lowers it.
    pub fn mark_state(&self, entry: &ModuleEntry, state: ModuleState) {
        let previous = entry.raise_state(state);
        if previous < state {
            tracing::trace!(module = %entry.key(), from = %previous, to = %state, "module state");
        }
    }

    /// Supply source for `key` ahead of time, as a loader plugin or an
    /// earlier asynchronous import would. The synchronous loader will not
    /// ask the host to fetch it again.
    pub fn provide_fetch(&self, key: &ModuleKey, source: ModuleSource) -> ModuleHandle {
        let entry = self.ensure_registered(key);
        if entry.state() < ModuleState::Fetched {
            entry.set_fetch_result(ModulePromise::resolved(source));
            self.mark_state(&entry, ModuleState::Fetched);
        }
        entry
    }

    /// Check if a module is registered
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Get all registered keys
    pub fn keys(&self) -> Vec<ModuleKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of registered modules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        // Dependency arrays may form cycles of Arcs
        for entry in self.entries.iter() {
            entry.value().release_links();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_registered_is_create_if_absent() {
        let registry = ModuleRegistry::new();
        let key = ModuleKey::from("/a.mjs");
        assert!(registry.get(&key).is_none());

        let first = registry.ensure_registered(&key);
        let second = registry.ensure_registered(&key);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.state(), ModuleState::Unfetched);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mark_state_never_regresses() {
        let registry = ModuleRegistry::new();
        let entry = registry.ensure_registered(&ModuleKey::from("/a.mjs"));

        registry.mark_state(&entry, ModuleState::Linked);
        registry.mark_state(&entry, ModuleState::Fetched);
        assert_eq!(entry.state(), ModuleState::Linked);
    }

    #[test]
    fn test_provide_fetch() {
        let registry = ModuleRegistry::new();
        let key = ModuleKey::from("virtual:config");
        let entry = registry.provide_fetch(&key, ModuleSource::esm("export default 1"));

        assert_eq!(entry.state(), ModuleState::Fetched);
        assert!(entry.fetch_result().is_some_and(|p| p.is_settled()));
        assert!(registry.contains(&key));
        assert_eq!(registry.keys(), vec![key]);
    }

    #[test]
    fn test_drop_breaks_cycles() {
        let registry = ModuleRegistry::new();
        let a = registry.ensure_registered(&ModuleKey::from("/a.mjs"));
        let b = registry.ensure_registered(&ModuleKey::from("/b.mjs"));
        a.satisfy(vec![Arc::clone(&b)]);
        b.satisfy(vec![Arc::clone(&a)]);

        let weak = Arc::downgrade(&a);
        drop(registry);
        drop(b);
        drop(a);
        assert!(weak.upgrade().is_none());
    }
}
