//! The owner mixin
//!
//! [`CallbackGuard`] is the reusable capability an owning type composes
//! with, held as a named field. It owns the anchor, mints callback tokens
//! in both flavors, and exposes the one-way lifecycle hook
//! [`CallbackGuard::set_deleted`].
//!
//! # Composing a guard into an owner
//!
//! ```no_run
//! use async_call_guard::{CallbackGuard, LockPolicy};
//! use std::os::raw::c_int;
//!
//! struct Sensor {
//!     // First field: its drop invalidates the anchor before the rest of
//!     // the sensor is torn down, even without a manual Drop impl.
//!     guard: CallbackGuard<Sensor>,
//!     reading: c_int,
//! }
//!
//! impl Sensor {
//!     fn new() -> Box<Self> {
//!         let mut sensor = Box::new(Sensor {
//!             guard: CallbackGuard::new(LockPolicy::Mutex),
//!             reading: 0,
//!         });
//!         let raw: *mut Sensor = &mut *sensor;
//!         // Safety: the box keeps the address stable, and the guard's
//!         // drop invalidates the anchor before the box is reclaimed.
//!         unsafe { sensor.guard.bind(raw) };
//!         sensor
//!     }
//! }
//! ```
//!
//! Owners with a manual `Drop` whose body (or later-declared fields) must
//! not race a callback should call [`CallbackGuard::set_deleted`] at the
//! top of `drop` — exactly the place a destructor-side invalidation
//! belongs. The guard's own field drop then finds the anchor already
//! invalidated and does nothing.

use crate::anchor::{SharedAnchor, WeakAnchor};
use crate::config::LockPolicy;
use crate::token::CallToken;
use crate::trampoline::bind_callback;
use crate::types::{BoundCallback, RawContext};
use std::marker::PhantomData;

/// Per-owner callback lifetime guard.
///
/// State machine per owner: `Live` (resolution may succeed) transitions
/// once, via [`Self::set_deleted`], to `Invalidated` (every resolution
/// returns empty). The transition is one-way and terminal.
pub struct CallbackGuard<T> {
    anchor: SharedAnchor,
    _owner: PhantomData<fn(*mut T)>,
}

impl<T> CallbackGuard<T> {
    /// Create a guard with the given lock policy. The anchor starts empty
    /// until [`Self::bind`] points it at the owner.
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            anchor: SharedAnchor::new(policy),
            _owner: PhantomData,
        }
    }

    /// Point the guard at its owner. Called once, right after the owner
    /// reaches its final address.
    ///
    /// # Safety
    ///
    /// - `owner` must stay valid at this address until
    ///   [`Self::set_deleted`] has completed (heap-box or otherwise pinned
    ///   storage; a moved owner invalidates the pointer silently).
    /// - Under the mutex policy callbacks may resolve the owner from an
    ///   arbitrary thread, so the caller must ensure `T` tolerates that
    ///   (`T: Send` access discipline) and that the owner is not mutated
    ///   elsewhere while a callback could be in flight; resolved callbacks
    ///   themselves are serialized by the guard lock.
    /// - Under the no-op policy the caller must guarantee that callback
    ///   delivery and owner destruction share one thread.
    pub unsafe fn bind(&self, owner: *mut T) {
        unsafe { self.anchor.bind(owner.cast()) }
    }

    /// Untyped token flavor: an opaque context to pair with a fixed
    /// `extern "C"` resolver supplied by the owner, which recovers the
    /// owner via [`CallToken::from_context`].
    ///
    /// Each call mints a fresh one-shot token; the external API owes it
    /// exactly one eventual invocation, otherwise the token leaks.
    pub fn context(&self) -> RawContext {
        CallToken::new(self.anchor.downgrade()).into_context()
    }

    /// Typed trampoline flavor: adapt any callable — plain function,
    /// method handle, or capturing closure — into the external API's
    /// context/function-pointer pair. See [`bind_callback`].
    pub fn callback_context<A, F>(&self, callback: F) -> BoundCallback<A>
    where
        F: FnMut(&mut T, A) + Send + 'static,
    {
        bind_callback(self.anchor.downgrade(), callback)
    }

    /// Invalidate the anchor: every outstanding token resolves to empty
    /// from now on. Idempotent; blocks only for the bounded critical
    /// section of an in-flight resolution.
    pub fn set_deleted(&self) {
        self.anchor.invalidate();
    }

    /// True while the guard is bound to a live owner.
    pub fn is_live(&self) -> bool {
        self.anchor.is_live()
    }

    /// Weak handle to the anchor, for building custom token shapes on top
    /// of the same lifetime machinery.
    pub fn anchor(&self) -> WeakAnchor {
        self.anchor.downgrade()
    }
}

impl<T> Default for CallbackGuard<T> {
    fn default() -> Self {
        Self::new(LockPolicy::default())
    }
}

impl<T> Drop for CallbackGuard<T> {
    fn drop(&mut self) {
        // Backstop for owners without a manual Drop: the guard field drops
        // before the owner's storage is reclaimed.
        self.set_deleted();
    }
}
