// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-esm
//!
//! Synchronous ES module loading for CommonJS `require()` in the Spacey
//! runtime.
//!
//! `require()` of an ES module has to fetch, parse, link and evaluate the
//! whole import graph before it returns, without going back to the event
//! loop. This crate provides:
//!
//! - A shared [`ModuleRegistry`] of module entries and their load state
//! - A breadth-first graph walk that links every reachable module
//! - Settled-value extraction from host promises, without awaiting them
//! - [`EsmError::AsyncModuleUnsupported`] for graphs that would need to
//!   suspend (top-level `await`, slow host hooks)
//! - [`FsHost`], a filesystem host using Node.js resolution rules
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_esm::{FsHost, ModuleKey, SyncEsmLoader};
//!
//! let loader = SyncEsmLoader::new(FsHost::new());
//! let entry = loader.require(&ModuleKey::from("/app/lib/index.mjs"))?;
//! println!("{:?}", entry.exports());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fs_host;
pub mod module_system;

// Re-exports
pub use config::LoaderConfig;
pub use error::{EsmError, Exception, Result};
pub use fs_host::FsHost;
pub use module_system::{
    Exports, ModuleEntry, ModuleHost, ModuleKey, ModulePromise, ModuleRecord, ModuleRegistry,
    ModuleSource, ModuleState, ModuleType, Settled, SyncEsmLoader, require_esm_synchronously,
};

/// Version of the spacey-esm crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
