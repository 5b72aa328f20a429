// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Promise cells returned by module hosts
//!
//! Host operations are future-shaped: they may complete inline, fail, or need
//! to suspend. A [`ModulePromise`] records which of those happened so the
//! synchronous loader can inspect the outcome without awaiting anything.

use crate::error::Exception;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique ID generator for promises
static PROMISE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Promise state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet
    Pending,
    /// Settled with a value (possibly another promise)
    Fulfilled,
    /// Settled with an exception
    Rejected,
}

enum Slot<T> {
    Pending,
    Fulfilled(T),
    /// Fulfilled with another promise that has to be looked through
    Adopted(ModulePromise<T>),
    Rejected(Exception),
}

struct Inner<T> {
    slot: Slot<T>,
    /// Whether a rejection has been observed
    handled: bool,
}

/// What a single look at a promise found.
pub(crate) enum Inspection<T> {
    Pending,
    Fulfilled(T),
    Adopted(ModulePromise<T>),
    Rejected(Exception),
}

/// A settle-once promise shared between a host and the loader.
pub struct ModulePromise<T> {
    id: u64,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> ModulePromise<T> {
    fn with_slot(slot: Slot<T>) -> Self {
        Self {
            id: PROMISE_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
            inner: Arc::new(Mutex::new(Inner {
                slot,
                handled: false,
            })),
        }
    }

    /// Create a new pending promise
    pub fn pending() -> Self {
        Self::with_slot(Slot::Pending)
    }

    /// Create a fulfilled promise
    pub fn resolved(value: T) -> Self {
        Self::with_slot(Slot::Fulfilled(value))
    }

    /// Create a rejected promise
    pub fn rejected(reason: Exception) -> Self {
        Self::with_slot(Slot::Rejected(reason))
    }

    /// Create a promise fulfilled with another promise
    pub fn resolved_with(other: ModulePromise<T>) -> Self {
        Self::with_slot(Slot::Adopted(other))
    }

    /// Drive `future` until it either completes or would suspend.
    ///
    /// The future is polled exactly once with a no-op waker. If it is not
    /// ready by then it is dropped and the promise stays pending forever.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Exception>>,
    {
        match future.now_or_never() {
            Some(Ok(value)) => Self::resolved(value),
            Some(Err(reason)) => Self::rejected(reason),
            None => Self::pending(),
        }
    }

    /// Unique id, for diagnostics
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> PromiseState {
        match self.inner.lock().slot {
            Slot::Pending => PromiseState::Pending,
            Slot::Fulfilled(_) | Slot::Adopted(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Check if promise is pending
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Check if promise is settled (fulfilled or rejected)
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Whether a rejection of this promise has been observed
    pub fn is_handled(&self) -> bool {
        self.inner.lock().handled
    }

    /// Fulfill the promise. Returns `false` if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Slot::Fulfilled(value))
    }

    /// Reject the promise. Returns `false` if it was already settled.
    pub fn reject(&self, reason: Exception) -> bool {
        self.settle(Slot::Rejected(reason))
    }

    /// Fulfill the promise with another promise. Adopting itself rejects
    /// with a `TypeError`, as a chaining cycle never settles.
    pub fn adopt(&self, other: ModulePromise<T>) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return self.reject(Exception::with_name(
                "TypeError",
                "Chaining cycle detected for promise",
            ));
        }
        self.settle(Slot::Adopted(other))
    }

    fn settle(&self, slot: Slot<T>) -> bool {
        let mut inner = self.inner.lock();
        if !matches!(inner.slot, Slot::Pending) {
            return false;
        }
        inner.slot = slot;
        true
    }
}

impl<T: Clone> ModulePromise<T> {
    /// Look at the promise once. Observing a rejection marks it handled.
    pub(crate) fn inspect(&self) -> Inspection<T> {
        let mut inner = self.inner.lock();
        let inspection = match &inner.slot {
            Slot::Pending => Inspection::Pending,
            Slot::Fulfilled(value) => Inspection::Fulfilled(value.clone()),
            Slot::Adopted(promise) => Inspection::Adopted(promise.clone()),
            Slot::Rejected(reason) => Inspection::Rejected(reason.clone()),
        };
        if matches!(inspection, Inspection::Rejected(_)) {
            inner.handled = true;
        }
        inspection
    }
}

impl<T> Clone for ModulePromise<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ModulePromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulePromise")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Needs one more poll than a synchronous caller will give it
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = Result<u32, Exception>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.0 {
                return Poll::Ready(Ok(1));
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    #[test]
    fn test_settles_once() {
        let promise = ModulePromise::pending();
        assert!(promise.is_pending());
        assert!(promise.resolve(1));
        assert!(!promise.resolve(2));
        assert!(!promise.reject(Exception::new("late")));
        assert!(matches!(promise.inspect(), Inspection::Fulfilled(1)));
    }

    #[test]
    fn test_clones_share_state() {
        let promise = ModulePromise::<u32>::pending();
        let observer = promise.clone();
        promise.reject(Exception::new("boom"));
        assert_eq!(observer.state(), PromiseState::Rejected);
        assert_eq!(observer.id(), promise.id());
    }

    #[test]
    fn test_from_ready_future() {
        let ok = ModulePromise::from_future(async { Ok::<_, Exception>(7) });
        assert!(matches!(ok.inspect(), Inspection::Fulfilled(7)));

        let err = ModulePromise::<u32>::from_future(async { Err(Exception::new("nope")) });
        assert_eq!(err.state(), PromiseState::Rejected);
    }

    #[test]
    fn test_from_suspending_future() {
        let promise = ModulePromise::from_future(YieldOnce(false));
        assert!(promise.is_pending());

        let never = ModulePromise::from_future(futures::future::pending::<Result<u32, Exception>>());
        assert!(never.is_pending());
    }

    #[test]
    fn test_inspecting_rejection_marks_handled() {
        let promise = ModulePromise::<u32>::rejected(Exception::new("boom"));
        assert!(!promise.is_handled());
        let _ = promise.inspect();
        assert!(promise.is_handled());
    }

    #[test]
    fn test_self_adoption_rejects() {
        let promise = ModulePromise::<u32>::pending();
        assert!(promise.adopt(promise.clone()));
        assert_eq!(promise.state(), PromiseState::Rejected);
    }
}
