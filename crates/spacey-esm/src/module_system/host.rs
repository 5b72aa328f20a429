// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host hooks the synchronous loader drives

use crate::error::Result;
use crate::module_system::entry::{Exports, ModuleEntry, ModuleRecord, ModuleSource};
use crate::module_system::key::ModuleKey;
use crate::module_system::promise::ModulePromise;
use std::sync::Arc;

/// Resolution, fetching, parsing and evaluation supplied by the embedder.
///
/// Every hook is called from inside a synchronous `require()`. Hooks that
/// cannot finish inline must hand back a pending [`ModulePromise`]; the
/// loader then fails with
/// [`EsmError::AsyncModuleUnsupported`](crate::EsmError::AsyncModuleUnsupported)
/// instead of waiting. Hooks may call back into the loader.
pub trait ModuleHost {
    /// Resolve `specifier` imported by `referrer` to a module key.
    fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey>;

    /// Start fetching the source for `key`.
    fn fetch(&self, key: &ModuleKey) -> ModulePromise<ModuleSource>;

    /// Parse fetched source into a module record.
    fn parse(&self, key: &ModuleKey, source: &ModuleSource) -> ModulePromise<ModuleRecord>;

    /// Link and evaluate `root`, whose reachable graph is fully linked.
    fn link_and_evaluate(&self, root: &ModuleEntry) -> ModulePromise<Exports>;
}

impl<H: ModuleHost + ?Sized> ModuleHost for &H {
    fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey> {
        (**self).resolve(specifier, referrer)
    }

    fn fetch(&self, key: &ModuleKey) -> ModulePromise<ModuleSource> {
        (**self).fetch(key)
    }

    fn parse(&self, key: &ModuleKey, source: &ModuleSource) -> ModulePromise<ModuleRecord> {
        (**self).parse(key, source)
    }

    fn link_and_evaluate(&self, root: &ModuleEntry) -> ModulePromise<Exports> {
        (**self).link_and_evaluate(root)
    }
}

impl<H: ModuleHost + ?Sized> ModuleHost for Arc<H> {
    fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey> {
        (**self).resolve(specifier, referrer)
    }

    fn fetch(&self, key: &ModuleKey) -> ModulePromise<ModuleSource> {
        (**self).fetch(key)
    }

    fn parse(&self, key: &ModuleKey, source: &ModuleSource) -> ModulePromise<ModuleRecord> {
        (**self).parse(key, source)
    }

    fn link_and_evaluate(&self, root: &ModuleEntry) -> ModulePromise<Exports> {
        (**self).link_and_evaluate(root)
    }
}
