// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `require()` of an ES module

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::module_system::entry::{Exports, ModuleEntry, ModuleHandle, ModuleState};
use crate::module_system::host::ModuleHost;
use crate::module_system::key::{ModuleKey, is_absolute_key};
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::settled;
use crate::module_system::walker::GraphWalker;
use std::sync::Arc;

/// Load, link and evaluate the ES module `root` and everything it imports,
/// without suspending.
///
/// A root that was already evaluated is returned as-is.
#[tracing::instrument(level = "debug", skip_all, fields(root = %root))]
pub fn require_esm_synchronously<H: ModuleHost + ?Sized>(
    registry: &ModuleRegistry,
    host: &H,
    root: &ModuleKey,
) -> Result<ModuleHandle> {
    require_esm(registry, host, root, true)
}

/// Like [`require_esm_synchronously`], but stops once the graph is linked
/// when `evaluate` is false.
pub fn require_esm<H: ModuleHost + ?Sized>(
    registry: &ModuleRegistry,
    host: &H,
    root: &ModuleKey,
    evaluate: bool,
) -> Result<ModuleHandle> {
    if let Some(entry) = registry.get(root) {
        if entry.state() >= ModuleState::Evaluated {
            tracing::trace!(module = %root, "module already evaluated");
            return Ok(entry);
        }
    }

    let entry = GraphWalker::new(registry, host).walk(root)?;
    if evaluate {
        link_and_evaluate(registry, host, &entry)?;
    }
    Ok(entry)
}

/// Run the host's link+evaluate step on a linked root.
///
/// Pending results mean some module needs to suspend (top-level `await`),
/// which a synchronous `require()` cannot do.
pub fn link_and_evaluate<H: ModuleHost + ?Sized>(
    registry: &ModuleRegistry,
    host: &H,
    root: &ModuleEntry,
) -> Result<Exports> {
    let key = root.key();
    tracing::debug!(module = %key, "evaluating module");

    let evaluated = host.link_and_evaluate(root);
    let exports = settled::extract(&evaluated, key).into_result(key)?;

    root.set_exports(exports.clone());
    registry.mark_state(root, ModuleState::Evaluated);
    Ok(exports)
}

/// Synchronous ESM loader bound to a registry and a host
pub struct SyncEsmLoader<H> {
    registry: Arc<ModuleRegistry>,
    host: H,
    config: LoaderConfig,
}

impl<H: ModuleHost> SyncEsmLoader<H> {
    /// Create a loader with a fresh registry
    pub fn new(host: H) -> Self {
        Self::with_registry(Arc::new(ModuleRegistry::new()), host)
    }

    /// Create a loader sharing an existing registry
    pub fn with_registry(registry: Arc<ModuleRegistry>, host: H) -> Self {
        Self {
            registry,
            host,
            config: LoaderConfig::default(),
        }
    }

    /// Set the loader configuration
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// The module registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The module host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Require the module with key `root`
    pub fn require(&self, root: &ModuleKey) -> Result<ModuleHandle> {
        require_esm(&self.registry, &self.host, root, self.config.evaluate)
    }

    /// Resolve `specifier` as `require()` called from `referrer` would, then
    /// require it
    pub fn require_specifier(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleHandle> {
        let key = if is_absolute_key(specifier) {
            ModuleKey::from(specifier)
        } else {
            self.host.resolve(specifier, referrer)?
        };
        self.require(&key)
    }

    /// Exports of a module evaluated by an earlier `require`
    pub fn exports_of(&self, key: &ModuleKey) -> Option<Exports> {
        self.registry.get(key).and_then(|entry| entry.exports())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EsmError, Exception};
    use crate::module_system::entry::{ModuleRecord, ModuleSource};
    use crate::module_system::promise::ModulePromise;
    use parking_lot::Mutex;

    /// Single leaf module whose evaluation outcome is configurable
    struct LeafHost {
        evaluation: Mutex<Option<ModulePromise<Exports>>>,
        evaluations: Mutex<usize>,
    }

    impl LeafHost {
        fn new(evaluation: ModulePromise<Exports>) -> Self {
            Self {
                evaluation: Mutex::new(Some(evaluation)),
                evaluations: Mutex::new(0),
            }
        }
    }

    impl ModuleHost for LeafHost {
        fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey> {
            Err(EsmError::module_not_found(specifier, referrer))
        }

        fn fetch(&self, _key: &ModuleKey) -> ModulePromise<ModuleSource> {
            ModulePromise::resolved(ModuleSource::esm("export default 1"))
        }

        fn parse(&self, _key: &ModuleKey, _source: &ModuleSource) -> ModulePromise<ModuleRecord> {
            ModulePromise::resolved(ModuleRecord::new(Vec::<String>::new()).with_exports(["default"]))
        }

        fn link_and_evaluate(&self, _root: &ModuleEntry) -> ModulePromise<Exports> {
            *self.evaluations.lock() += 1;
            self.evaluation
                .lock()
                .clone()
                .unwrap_or_else(|| ModulePromise::rejected(Exception::new("no evaluation")))
        }
    }

    #[test]
    fn test_evaluates_root_once() {
        let host = LeafHost::new(ModulePromise::resolved(serde_json::json!({ "default": 1 })));
        let loader = SyncEsmLoader::new(host);
        let key = ModuleKey::from("/leaf.mjs");

        let first = loader.require(&key).unwrap();
        assert_eq!(first.state(), ModuleState::Evaluated);
        assert_eq!(loader.exports_of(&key), Some(serde_json::json!({ "default": 1 })));

        let second = loader.require(&key).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*loader.host().evaluations.lock(), 1);
    }

    #[test]
    fn test_pending_evaluation_is_async_module() {
        let host = LeafHost::new(ModulePromise::pending());
        let loader = SyncEsmLoader::new(host);
        let key = ModuleKey::from("/tla.mjs");

        let err = loader.require(&key).unwrap_err();
        assert_eq!(
            err.to_string(),
            "require() async module \"/tla.mjs\" is unsupported. use \"await import()\" instead."
        );
        assert_eq!(loader.registry().get(&key).unwrap().state(), ModuleState::Linked);
    }

    #[test]
    fn test_rejected_evaluation_is_rethrown() {
        let host = LeafHost::new(ModulePromise::rejected(Exception::with_name("ReferenceError", "x is not defined")));
        let loader = SyncEsmLoader::new(host);

        let err = loader.require(&ModuleKey::from("/bad.mjs")).unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: x is not defined");
    }

    #[test]
    fn test_link_only_config() {
        let host = LeafHost::new(ModulePromise::resolved(Exports::Null));
        let config = LoaderConfig {
            evaluate: false,
            ..LoaderConfig::default()
        };
        let loader = SyncEsmLoader::new(host).with_config(config);

        let entry = loader.require(&ModuleKey::from("/leaf.mjs")).unwrap();
        assert_eq!(entry.state(), ModuleState::Linked);
        assert_eq!(*loader.host().evaluations.lock(), 0);
    }
}
