// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module entries and the records they carry

use crate::module_system::key::ModuleKey;
use crate::module_system::promise::ModulePromise;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Shared handle to a registry entry
pub type ModuleHandle = Arc<ModuleEntry>;

/// Value produced by evaluating a module (its namespace object)
pub type Exports = serde_json::Value;

/// Load state of a module. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ModuleState {
    /// Registered, no source yet
    Unfetched = 0,
    /// Source available
    Fetched = 1,
    /// Parsed; dependencies are being or have been attached
    Linked = 2,
    /// Link+evaluate completed
    Evaluated = 3,
}

impl ModuleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ModuleState::Unfetched,
            1 => ModuleState::Fetched,
            2 => ModuleState::Linked,
            _ => ModuleState::Evaluated,
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Unfetched => "unfetched",
            ModuleState::Fetched => "fetched",
            ModuleState::Linked => "linked",
            ModuleState::Evaluated => "evaluated",
        };
        f.write_str(name)
    }
}

/// Module type detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleType {
    /// ECMAScript module (import/export)
    #[default]
    ESM,
    /// CommonJS module (require/module.exports)
    CommonJS,
    /// JSON file
    Json,
    /// Runtime built-in (`node:fs`, ...)
    Builtin,
    /// Unknown/detect from content
    Unknown,
}

impl ModuleType {
    /// Detect module type from file path
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs") => ModuleType::ESM,
            Some("cjs") => ModuleType::CommonJS,
            Some("json") => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }

    /// Detect module type from package.json "type" field
    pub fn from_package_type(type_field: Option<&str>) -> Self {
        match type_field {
            Some("module") => ModuleType::ESM,
            _ => ModuleType::CommonJS,
        }
    }
}

/// Source text produced by a host fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Source text
    pub code: Arc<str>,
    /// How the source should be parsed
    pub module_type: ModuleType,
}

impl ModuleSource {
    /// Create a source of the given type
    pub fn new(code: impl Into<Arc<str>>, module_type: ModuleType) -> Self {
        Self {
            code: code.into(),
            module_type,
        }
    }

    /// ES module source
    pub fn esm(code: impl Into<Arc<str>>) -> Self {
        Self::new(code, ModuleType::ESM)
    }
}

/// Parsed form of a module
#[derive(Debug, Clone, Default)]
pub struct ModuleRecord {
    /// Import specifiers in declaration order
    requested_modules: Vec<String>,
    /// Specifier -> resolved entry, filled in while linking
    dependencies_map: HashMap<String, ModuleHandle>,
    /// Names this module exports
    exports: Vec<String>,
    module_type: ModuleType,
    has_top_level_await: bool,
}

impl ModuleRecord {
    /// Create a record requesting `specifiers` in order
    pub fn new<I, S>(specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requested_modules: specifiers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the module type
    pub fn with_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = module_type;
        self
    }

    /// Set the exported names
    pub fn with_exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = names.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the module body as using top-level `await`
    pub fn with_top_level_await(mut self, tla: bool) -> Self {
        self.has_top_level_await = tla;
        self
    }

    /// Import specifiers in declaration order
    pub fn requested_modules(&self) -> &[String] {
        &self.requested_modules
    }

    /// The entry a specifier was linked to
    pub fn dependency(&self, specifier: &str) -> Option<&ModuleHandle> {
        self.dependencies_map.get(specifier)
    }

    /// Number of linked specifiers
    pub fn linked_count(&self) -> usize {
        self.dependencies_map.len()
    }

    /// Exported names
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Module type
    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    /// Whether the module body uses top-level `await`
    pub fn has_top_level_await(&self) -> bool {
        self.has_top_level_await
    }
}

/// Registry record tracking a module's load state and dependencies
pub struct ModuleEntry {
    key: ModuleKey,
    state: AtomicU8,
    fetch_result: RwLock<Option<ModulePromise<ModuleSource>>>,
    record: RwLock<Option<ModuleRecord>>,
    dependencies: RwLock<Vec<ModuleHandle>>,
    satisfied: AtomicBool,
    /// Set while a walk is fetching, parsing or linking this entry
    linking: AtomicBool,
    exports: RwLock<Option<Exports>>,
}

impl ModuleEntry {
    pub(crate) fn new(key: ModuleKey) -> Self {
        Self {
            key,
            state: AtomicU8::new(ModuleState::Unfetched as u8),
            fetch_result: RwLock::new(None),
            record: RwLock::new(None),
            dependencies: RwLock::new(Vec::new()),
            satisfied: AtomicBool::new(false),
            linking: AtomicBool::new(false),
            exports: RwLock::new(None),
        }
    }

    /// Module key
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// Current state
    pub fn state(&self) -> ModuleState {
        ModuleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Raise the state to at least `state`, returning the previous state
    pub(crate) fn raise_state(&self, state: ModuleState) -> ModuleState {
        ModuleState::from_u8(self.state.fetch_max(state as u8, Ordering::AcqRel))
    }

    /// The fetch outcome, once a fetch has been started
    pub fn fetch_result(&self) -> Option<ModulePromise<ModuleSource>> {
        self.fetch_result.read().clone()
    }

    pub(crate) fn set_fetch_result(&self, promise: ModulePromise<ModuleSource>) {
        *self.fetch_result.write() = Some(promise);
    }

    /// A copy of the parsed record
    pub fn record(&self) -> Option<ModuleRecord> {
        self.record.read().clone()
    }

    /// Whether a record has been stored
    pub fn has_record(&self) -> bool {
        self.record.read().is_some()
    }

    /// Run `f` on the stored record without copying it
    pub fn with_record<R>(&self, f: impl FnOnce(&ModuleRecord) -> R) -> Option<R> {
        self.record.read().as_ref().map(f)
    }

    /// Import specifiers in declaration order (empty before parsing)
    pub fn requested_modules(&self) -> Vec<String> {
        self.with_record(|record| record.requested_modules.clone())
            .unwrap_or_default()
    }

    pub(crate) fn set_record(&self, record: ModuleRecord) {
        *self.record.write() = Some(record);
    }

    pub(crate) fn link_dependency(&self, specifier: &str, dependency: ModuleHandle) {
        if let Some(record) = self.record.write().as_mut() {
            record
                .dependencies_map
                .insert(specifier.to_string(), dependency);
        }
    }

    /// Resolved dependencies, in the order of `requested_modules`
    pub fn dependencies(&self) -> Vec<ModuleHandle> {
        self.dependencies.read().clone()
    }

    /// Whether dependencies have been fully attached
    pub fn is_satisfied(&self) -> bool {
        self.satisfied.load(Ordering::Acquire)
    }

    /// Attach the dependency array and mark the entry satisfied
    pub(crate) fn satisfy(&self, dependencies: Vec<ModuleHandle>) {
        *self.dependencies.write() = dependencies;
        self.satisfied.store(true, Ordering::Release);
    }

    /// Whether some call is in the middle of linking this entry
    pub fn is_linking(&self) -> bool {
        self.linking.load(Ordering::Acquire)
    }

    /// Claim the entry for linking. Returns `false` if it is already claimed.
    pub(crate) fn begin_linking(&self) -> bool {
        !self.linking.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn finish_linking(&self) {
        self.linking.store(false, Ordering::Release);
    }

    /// Value produced by link+evaluate
    pub fn exports(&self) -> Option<Exports> {
        self.exports.read().clone()
    }

    pub(crate) fn set_exports(&self, exports: Exports) {
        *self.exports.write() = Some(exports);
    }

    /// Drop references to other entries so reference cycles can be freed
    pub(crate) fn release_links(&self) {
        self.dependencies.write().clear();
        if let Some(record) = self.record.write().as_mut() {
            record.dependencies_map.clear();
        }
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Dependencies can be cyclic; only print their keys
        let dependencies: Vec<ModuleKey> = self
            .dependencies
            .read()
            .iter()
            .map(|dep| dep.key.clone())
            .collect();
        f.debug_struct("ModuleEntry")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("satisfied", &self.is_satisfied())
            .field("linking", &self.is_linking())
            .field("dependencies", &dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_monotonic() {
        let entry = ModuleEntry::new(ModuleKey::from("/a.mjs"));
        assert_eq!(entry.state(), ModuleState::Unfetched);

        assert_eq!(entry.raise_state(ModuleState::Linked), ModuleState::Unfetched);
        assert_eq!(entry.raise_state(ModuleState::Fetched), ModuleState::Linked);
        assert_eq!(entry.state(), ModuleState::Linked);

        entry.raise_state(ModuleState::Evaluated);
        entry.raise_state(ModuleState::Unfetched);
        assert_eq!(entry.state(), ModuleState::Evaluated);
    }

    #[test]
    fn test_linking_claim_is_exclusive() {
        let entry = ModuleEntry::new(ModuleKey::from("/a.mjs"));
        assert!(!entry.is_linking());
        assert!(entry.begin_linking());
        assert!(!entry.begin_linking());
        assert!(entry.is_linking());

        entry.finish_linking();
        assert!(!entry.is_linking());
    }

    #[test]
    fn test_module_type_from_path() {
        assert_eq!(ModuleType::from_path(Path::new("foo.mjs")), ModuleType::ESM);
        assert_eq!(ModuleType::from_path(Path::new("foo.cjs")), ModuleType::CommonJS);
        assert_eq!(ModuleType::from_path(Path::new("foo.json")), ModuleType::Json);
        assert_eq!(ModuleType::from_path(Path::new("foo.js")), ModuleType::Unknown);
    }

    #[test]
    fn test_module_type_from_package() {
        assert_eq!(ModuleType::from_package_type(Some("module")), ModuleType::ESM);
        assert_eq!(ModuleType::from_package_type(Some("commonjs")), ModuleType::CommonJS);
        assert_eq!(ModuleType::from_package_type(None), ModuleType::CommonJS);
    }

    #[test]
    fn test_link_dependency_requires_record() {
        let entry = ModuleEntry::new(ModuleKey::from("/a.mjs"));
        let dep = Arc::new(ModuleEntry::new(ModuleKey::from("/b.mjs")));

        entry.link_dependency("./b.mjs", Arc::clone(&dep));
        assert!(entry.record().is_none());

        entry.set_record(ModuleRecord::new(["./b.mjs"]));
        entry.link_dependency("./b.mjs", Arc::clone(&dep));
        let record = entry.record().unwrap();
        assert!(Arc::ptr_eq(record.dependency("./b.mjs").unwrap(), &dep));
    }

    #[test]
    fn test_debug_does_not_recurse_through_cycles() {
        let a = Arc::new(ModuleEntry::new(ModuleKey::from("/a.mjs")));
        let b = Arc::new(ModuleEntry::new(ModuleKey::from("/b.mjs")));
        a.satisfy(vec![Arc::clone(&b)]);
        b.satisfy(vec![Arc::clone(&a)]);

        let rendered = format!("{:?}", a);
        assert!(rendered.contains("/b.mjs"));

        a.release_links();
        b.release_links();
        assert!(a.dependencies().is_empty());
    }
}
