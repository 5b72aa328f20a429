// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Synchronous ES module loading
//!
//! Lets CommonJS `require()` load an ES module graph in a single call frame.
//!
//! ## Pipeline
//! - [`GraphWalker`] fetches, parses and links every reachable module,
//!   breadth-first, through a [`ModuleHost`]
//! - [`settled::extract`] reads each host result without awaiting it
//! - [`link_and_evaluate`] evaluates the linked root
//!
//! Anything that would have to suspend (a host future that is not ready,
//! top-level `await`) fails with
//! [`EsmError::AsyncModuleUnsupported`](crate::EsmError::AsyncModuleUnsupported).

mod entry;
mod host;
mod key;
mod promise;
mod registry;
mod require_esm;
pub mod settled;
mod walker;

pub use entry::{Exports, ModuleEntry, ModuleHandle, ModuleRecord, ModuleSource, ModuleState, ModuleType};
pub use host::ModuleHost;
pub use key::{ModuleKey, is_absolute_key};
pub use promise::{ModulePromise, PromiseState};
pub use registry::ModuleRegistry;
pub use require_esm::{SyncEsmLoader, link_and_evaluate, require_esm, require_esm_synchronously};
pub use settled::Settled;
pub use walker::GraphWalker;
