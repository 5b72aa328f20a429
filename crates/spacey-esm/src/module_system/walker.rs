// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Breadth-first graph walk that fetches, parses and links every module
//! reachable from a root without suspending.
//!
//! Each entry is fetched and parsed at most once: a dependency is queued only
//! while this walk has not visited it, and an entry another call is still
//! linking is never queued. Cycles terminate because a module that was
//! already visited is still attached as a dependency, just never queued
//! again. An entry a failed call left parsed but without its dependency
//! array is linked again from its stored record.

use crate::error::Result;
use crate::module_system::entry::{ModuleEntry, ModuleHandle, ModuleState};
use crate::module_system::host::ModuleHost;
use crate::module_system::key::{ModuleKey, is_absolute_key};
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::settled;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// One traversal of the module graph.
///
/// The queue and visited set belong to this walk only; all shared state
/// lives in the registry.
pub struct GraphWalker<'a, H: ModuleHost + ?Sized> {
    registry: &'a ModuleRegistry,
    host: &'a H,
    queue: VecDeque<ModuleKey>,
    visited: HashSet<ModuleKey>,
}

/// Releases an entry's linking claim, including on early return
struct LinkingClaim<'e>(&'e ModuleEntry);

impl Drop for LinkingClaim<'_> {
    fn drop(&mut self) {
        self.0.finish_linking();
    }
}

impl<'a, H: ModuleHost + ?Sized> GraphWalker<'a, H> {
    /// Create a walker over `registry` using `host`
    pub fn new(registry: &'a ModuleRegistry, host: &'a H) -> Self {
        Self {
            registry,
            host,
            queue: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    /// Walk the graph rooted at `root`, returning the root's entry once every
    /// reachable module is linked. The first failure aborts the walk;
    /// modules linked before it stay linked.
    pub fn walk(mut self, root: &ModuleKey) -> Result<ModuleHandle> {
        let root_entry = self.registry.ensure_registered(root);

        let mut next = Some(Arc::clone(&root_entry));
        while let Some(entry) = next {
            self.visited.insert(entry.key().clone());
            if entry.is_satisfied() {
                self.follow_existing(&entry);
            } else {
                self.link(&entry)?;
            }
            next = self.pop_next();
        }

        tracing::debug!(root = %root, modules = self.visited.len(), "module graph linked");
        Ok(root_entry)
    }

    /// Fetch, parse and attach dependencies for one entry
    fn link(&mut self, entry: &ModuleEntry) -> Result<()> {
        let key = entry.key().clone();
        if !entry.begin_linking() {
            // Claimed by an outer call on this registry
            tracing::trace!(module = %key, "module is being linked elsewhere");
            return Ok(());
        }
        let _claim = LinkingClaim(entry);

        // An entry left unsatisfied by a failed call keeps its record
        if !entry.has_record() {
            if entry.state() < ModuleState::Fetched {
                tracing::debug!(module = %key, "fetching module");
                entry.set_fetch_result(self.host.fetch(&key));
            }
            let fetched = entry.fetch_result();
            let source = settled::extract_slot(fetched.as_ref(), &key).into_result(&key)?;
            self.registry.mark_state(entry, ModuleState::Fetched);

            tracing::debug!(module = %key, "parsing module");
            let parsed = self.host.parse(&key, &source);
            let record = settled::extract(&parsed, &key).into_result(&key)?;
            entry.set_record(record);
            self.registry.mark_state(entry, ModuleState::Linked);
        } else {
            tracing::trace!(module = %key, "reusing parsed record");
        }

        let specifiers = entry.requested_modules();
        let mut dependencies = Vec::with_capacity(specifiers.len());
        for specifier in &specifiers {
            let dep_key = if is_absolute_key(specifier) {
                ModuleKey::from(specifier.as_str())
            } else {
                self.host.resolve(specifier, &key)?
            };

            let dep = self.registry.ensure_registered(&dep_key);
            self.enqueue(&dep);
            entry.link_dependency(specifier, Arc::clone(&dep));
            dependencies.push(dep);
        }

        tracing::debug!(module = %key, dependencies = dependencies.len(), "module linked");
        entry.satisfy(dependencies);
        Ok(())
    }

    /// Queue the dependencies of an entry an earlier call already linked,
    /// so modules it left unlinked are still reached. Calls no host hook.
    fn follow_existing(&mut self, entry: &ModuleEntry) {
        tracing::trace!(module = %entry.key(), "reusing linked module");
        for dep in entry.dependencies() {
            self.enqueue(&dep);
        }
    }

    fn enqueue(&mut self, dep: &ModuleEntry) {
        if !self.visited.contains(dep.key()) && !dep.is_linking() {
            self.queue.push_back(dep.key().clone());
        }
    }

    /// Pop the next key worth visiting, dropping duplicates and entries
    /// another call is linking.
    fn pop_next(&mut self) -> Option<ModuleHandle> {
        while let Some(key) = self.queue.pop_front() {
            if self.visited.contains(&key) {
                tracing::trace!(module = %key, "skipping queued module");
                continue;
            }
            let entry = self.registry.ensure_registered(&key);
            if entry.is_linking() {
                tracing::trace!(module = %key, "skipping module linked elsewhere");
                continue;
            }
            return Some(entry);
        }
        None
    }
}
