// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem module host
//!
//! Resolves, reads and scans modules from local disk. Evaluation produces a
//! namespace object listing each module's exports; module bodies are not
//! executed.

mod resolver;
pub mod scanner;

pub use resolver::{BUILTIN_MODULES, ModuleResolver, find_package_type};

use crate::config::LoaderConfig;
use crate::error::{Exception, Result};
use crate::module_system::{
    Exports, ModuleEntry, ModuleHandle, ModuleHost, ModuleKey, ModulePromise, ModuleRecord,
    ModuleSource, ModuleType, settled,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::Path;

/// [`ModuleHost`] backed by the local filesystem
pub struct FsHost {
    config: LoaderConfig,
    resolver: ModuleResolver,
    virtual_modules: DashMap<ModuleKey, ModuleSource>,
}

impl FsHost {
    /// Create a host with default configuration
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    /// Create a host with the given configuration
    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            resolver: ModuleResolver::new(&config),
            config,
            virtual_modules: DashMap::new(),
        }
    }

    /// The loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The module resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Serve `source` for `key` without reading from disk
    pub fn add_virtual_module(&self, key: impl Into<ModuleKey>, source: ModuleSource) {
        let key = key.into();
        tracing::debug!(module = %key, "registered virtual module");
        self.virtual_modules.insert(key, source);
    }

    fn read_source(&self, key: &ModuleKey) -> std::result::Result<ModuleSource, Exception> {
        if let Some(source) = self.virtual_modules.get(key) {
            return Ok(source.value().clone());
        }

        if key.as_str().starts_with(self.config.builtin_prefix.as_str()) {
            if self.resolver.is_builtin(key.as_str()) {
                return Ok(ModuleSource::new("", ModuleType::Builtin));
            }
            return Err(Exception::new(format!("No such built-in module: {}", key)));
        }

        let path = key
            .to_file_path()
            .ok_or_else(|| Exception::with_name("TypeError", format!("Unsupported module key: {}", key)))?;

        tracing::debug!(path = %path.display(), "reading module source");
        let code = std::fs::read_to_string(&path)
            .map_err(|err| Exception::new(format!("Cannot read module '{}': {}", path.display(), err)))?;
        Ok(ModuleSource::new(code, module_type_for(&path)))
    }
}

impl Default for FsHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Type from the extension, falling back to the nearest package.json for
/// extensions that do not decide it
fn module_type_for(path: &Path) -> ModuleType {
    match ModuleType::from_path(path) {
        ModuleType::Unknown if path.extension().is_some_and(|ext| ext == "js") => {
            find_package_type(path).unwrap_or(ModuleType::Unknown)
        }
        module_type => module_type,
    }
}

fn parse_source(source: &ModuleSource) -> std::result::Result<ModuleRecord, Exception> {
    let no_imports = || ModuleRecord::new(Vec::<String>::new());

    let record = match source.module_type {
        ModuleType::Json => {
            serde_json::from_str::<serde_json::Value>(&source.code)
                .map_err(|err| Exception::with_name("SyntaxError", err.to_string()))?;
            no_imports().with_type(ModuleType::Json).with_exports(["default"])
        }
        ModuleType::Builtin => no_imports().with_type(ModuleType::Builtin),
        ModuleType::CommonJS => no_imports().with_type(ModuleType::CommonJS).with_exports(["default"]),
        ModuleType::ESM | ModuleType::Unknown => {
            let syntax = scanner::scan(&source.code);
            if source.module_type == ModuleType::Unknown && !syntax.is_module() {
                no_imports().with_type(ModuleType::CommonJS).with_exports(["default"])
            } else {
                ModuleRecord::new(syntax.imports)
                    .with_type(ModuleType::ESM)
                    .with_exports(syntax.exports)
                    .with_top_level_await(syntax.top_level_await)
            }
        }
    };
    Ok(record)
}

/// Walk the linked graph below `root`, looking for top-level `await`
fn graph_has_top_level_await(root: &ModuleEntry) -> Option<ModuleKey> {
    let mut seen = HashSet::new();
    let mut stack: Vec<ModuleHandle> = root.dependencies();
    if root.with_record(ModuleRecord::has_top_level_await).unwrap_or(false) {
        return Some(root.key().clone());
    }
    seen.insert(root.key().clone());

    while let Some(entry) = stack.pop() {
        if !seen.insert(entry.key().clone()) {
            continue;
        }
        if entry.with_record(ModuleRecord::has_top_level_await).unwrap_or(false) {
            return Some(entry.key().clone());
        }
        stack.extend(entry.dependencies());
    }
    None
}

fn namespace(root: &ModuleEntry) -> std::result::Result<Exports, Exception> {
    let record = root
        .record()
        .ok_or_else(|| Exception::new(format!("Module '{}' is not linked", root.key())))?;

    match record.module_type() {
        ModuleType::Json => {
            let fetched = root.fetch_result();
            let source = settled::extract_slot(fetched.as_ref(), root.key())
                .into_result(root.key())
                .map_err(crate::EsmError::into_exception)?;
            serde_json::from_str(&source.code).map_err(|err| Exception::with_name("SyntaxError", err.to_string()))
        }
        _ => Ok(Exports::Object(
            record
                .exports()
                .iter()
                .map(|name| (name.clone(), Exports::Null))
                .collect(),
        )),
    }
}

impl ModuleHost for FsHost {
    fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey> {
        self.resolver.resolve(specifier, referrer)
    }

    fn fetch(&self, key: &ModuleKey) -> ModulePromise<ModuleSource> {
        match self.read_source(key) {
            Ok(source) => ModulePromise::resolved(source),
            Err(exception) => ModulePromise::rejected(exception),
        }
    }

    fn parse(&self, key: &ModuleKey, source: &ModuleSource) -> ModulePromise<ModuleRecord> {
        tracing::trace!(module = %key, module_type = ?source.module_type, "scanning module");
        match parse_source(source) {
            Ok(record) => ModulePromise::resolved(record),
            Err(exception) => ModulePromise::rejected(exception),
        }
    }

    fn link_and_evaluate(&self, root: &ModuleEntry) -> ModulePromise<Exports> {
        if let Some(key) = graph_has_top_level_await(root) {
            tracing::debug!(root = %root.key(), module = %key, "graph uses top-level await");
            return ModulePromise::pending();
        }

        match namespace(root) {
            Ok(exports) => ModulePromise::resolved(exports),
            Err(exception) => ModulePromise::rejected(exception),
        }
    }
}
