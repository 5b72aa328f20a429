// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Settled-value extraction
//!
//! Reads the outcome of a [`ModulePromise`] without suspending. A promise
//! that has not settled, or that settled with another promise which has not,
//! is reported as [`Settled::Pending`]; the synchronous loader treats that as
//! fatal.

use crate::error::{EsmError, Exception, Result};
use crate::module_system::key::ModuleKey;
use crate::module_system::promise::{Inspection, ModulePromise};
use std::collections::HashSet;

/// Outcome of looking at a promise without awaiting it
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    /// Fulfilled
    Value(T),
    /// Rejected
    Error(Exception),
    /// Still unsettled
    Pending,
}

impl<T> Settled<T> {
    /// Check if the promise was still pending
    pub fn is_pending(&self) -> bool {
        matches!(self, Settled::Pending)
    }

    /// Convert into a loader result. Pending becomes
    /// [`EsmError::AsyncModuleUnsupported`] naming `key`.
    pub fn into_result(self, key: &ModuleKey) -> Result<T> {
        match self {
            Settled::Value(value) => Ok(value),
            Settled::Error(exception) => Err(EsmError::Exception(exception)),
            Settled::Pending => {
                tracing::warn!(module = %key, "module did not settle synchronously");
                Err(EsmError::AsyncModuleUnsupported(key.clone()))
            }
        }
    }
}

/// Extract the settled value of `promise`, produced on behalf of module `key`.
///
/// Promises fulfilled with another promise are looked through until a value,
/// a rejection or a pending promise is found. Rejections without a message
/// are given one that names `key`.
pub fn extract<T: Clone>(promise: &ModulePromise<T>, key: &ModuleKey) -> Settled<T> {
    let mut current = promise.clone();
    let mut seen = HashSet::new();
    loop {
        match current.inspect() {
            Inspection::Fulfilled(value) => return Settled::Value(value),
            Inspection::Rejected(reason) => {
                return Settled::Error(reason.with_module_context(key));
            }
            Inspection::Pending => return Settled::Pending,
            // A chain that leads back to itself never settles
            Inspection::Adopted(_) if !seen.insert(current.id()) => return Settled::Pending,
            Inspection::Adopted(inner) => current = inner,
        }
    }
}

/// [`extract`] for a slot that may never have been filled; an empty slot is
/// still pending.
pub fn extract_slot<T: Clone>(promise: Option<&ModulePromise<T>>, key: &ModuleKey) -> Settled<T> {
    match promise {
        Some(promise) => extract(promise, key),
        None => Settled::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ModuleKey {
        ModuleKey::from("/lib/tla.mjs")
    }

    #[test]
    fn test_extract_value() {
        let promise = ModulePromise::resolved("source".to_string());
        assert_eq!(extract(&promise, &key()), Settled::Value("source".to_string()));
    }

    #[test]
    fn test_extract_pending() {
        let promise = ModulePromise::<u8>::pending();
        assert!(extract(&promise, &key()).is_pending());
        assert!(extract_slot::<u8>(None, &key()).is_pending());
    }

    #[test]
    fn test_extract_rejection_keeps_message() {
        let promise = ModulePromise::<u8>::rejected(Exception::with_name("SyntaxError", "bad"));
        assert_eq!(
            extract(&promise, &key()),
            Settled::Error(Exception::with_name("SyntaxError", "bad"))
        );
        assert!(promise.is_handled());
    }

    #[test]
    fn test_extract_rejection_without_message() {
        let promise = ModulePromise::<u8>::rejected(Exception::undefined());
        let Settled::Error(err) = extract(&promise, &key()) else {
            panic!("expected a rejection");
        };
        assert_eq!(
            err.message(),
            Some("An error occurred occurred while parsing module \"/lib/tla.mjs\"")
        );
    }

    #[test]
    fn test_double_wrapped_promises() {
        let inner = ModulePromise::<u8>::pending();
        let outer = ModulePromise::resolved_with(inner.clone());
        assert!(extract(&outer, &key()).is_pending());

        inner.resolve(3);
        assert_eq!(extract(&outer, &key()), Settled::Value(3));

        let rejected = ModulePromise::resolved_with(ModulePromise::<u8>::rejected(Exception::new("x")));
        assert_eq!(extract(&rejected, &key()), Settled::Error(Exception::new("x")));
    }

    #[test]
    fn test_adoption_cycle_is_pending() {
        let a = ModulePromise::<u8>::pending();
        let b = ModulePromise::<u8>::pending();
        assert!(a.adopt(b.clone()));
        assert!(b.adopt(a.clone()));
        assert!(extract(&a, &key()).is_pending());
    }

    #[test]
    fn test_pending_into_result() {
        let err = Settled::<u8>::Pending.into_result(&key()).unwrap_err();
        assert!(matches!(err, EsmError::AsyncModuleUnsupported(k) if k == key()));
    }
}
