//! The lifetime anchor
//!
//! The anchor is the indirection the owner's destructor invalidates. It
//! holds the one true pointer to the owner, protected by the guard lock,
//! and is reachable from callback tokens only through a weak handle. After
//! invalidation (or after the owner releases its strong handle entirely) a
//! weak handle stays valid and simply resolves to nothing — it never
//! dangles.
//!
//! Resolution hands back an [`OwnerRef`] rather than a raw pointer: the
//! owner can only be touched through a handle that provably holds the
//! guard lock and a live anchor, which is what rules out use-after-free.

use crate::config::LockPolicy;
use crate::lock::GuardLock;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::{Arc, Weak};

/// Shared anchor storage: the guard lock plus the owner slot.
pub(crate) struct AnchorState {
    lock: GuardLock,
    owner: UnsafeCell<*mut ()>,
}

// The owner slot is only read or written while the guard lock is held
// (under the no-op policy: only from the single thread the integration
// contract allows).
unsafe impl Send for AnchorState {}
unsafe impl Sync for AnchorState {}

impl AnchorState {
    pub(crate) fn lock(&self) -> &GuardLock {
        &self.lock
    }

    /// Caller must hold the guard lock.
    unsafe fn owner_slot(&self) -> *mut () {
        *self.owner.get()
    }

    /// Caller must hold the guard lock.
    unsafe fn set_owner_slot(&self, owner: *mut ()) {
        *self.owner.get() = owner;
    }
}

/// Strong handle to the anchor, held by the owner (via its guard).
///
/// Created once per owner, bound once, invalidated once; never recreated.
pub struct SharedAnchor {
    state: Arc<AnchorState>,
}

impl SharedAnchor {
    /// Create an anchor with an empty owner slot.
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            state: Arc::new(AnchorState {
                lock: GuardLock::new(policy),
                owner: UnsafeCell::new(ptr::null_mut()),
            }),
        }
    }

    /// Point the anchor at the owner.
    ///
    /// # Safety
    ///
    /// `owner` must stay valid at this address until [`Self::invalidate`]
    /// has completed. An anchor is bound at most once.
    pub unsafe fn bind(&self, owner: *mut ()) {
        let _held = self.state.lock.acquire();
        debug_assert!(
            unsafe { self.state.owner_slot() }.is_null(),
            "anchor bound twice"
        );
        unsafe { self.state.set_owner_slot(owner) };
    }

    /// Obtain a weak, observing handle for callback tokens.
    pub fn downgrade(&self) -> WeakAnchor {
        WeakAnchor {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Clear the owner slot so every outstanding weak handle resolves to
    /// nothing from now on. Idempotent.
    ///
    /// Blocks until any in-flight resolution has released the guard lock,
    /// which is exactly what keeps a concurrent callback from observing a
    /// half-destroyed owner.
    pub fn invalidate(&self) {
        let _held = self.state.lock.acquire();
        unsafe { self.state.set_owner_slot(ptr::null_mut()) };
    }

    /// True while the anchor points at a live owner.
    pub fn is_live(&self) -> bool {
        let _held = self.state.lock.acquire();
        !unsafe { self.state.owner_slot() }.is_null()
    }
}

/// Weak, observing handle to an anchor.
#[derive(Clone)]
pub struct WeakAnchor {
    state: Weak<AnchorState>,
}

impl WeakAnchor {
    /// Resolve the anchor back to its owner, if the owner still exists.
    ///
    /// Acquires the guard lock before reading the owner slot; the lock is
    /// held for as long as the returned [`OwnerRef`] lives. Returns `None`
    /// when the anchor was invalidated or its storage fully released —
    /// the expected "owner is gone" outcome, not an error.
    ///
    /// # Safety
    ///
    /// `T` must be the type whose pointer was bound to this anchor.
    pub unsafe fn resolve<T>(&self) -> Option<OwnerRef<T>> {
        // If the upgrade fails, the owner released its strong handle, and
        // that only happens after invalidation completed; skipping the
        // lock is then benign.
        let state = self.state.upgrade()?;
        state.lock.raw_acquire();
        let raw = unsafe { state.owner_slot() };
        if raw.is_null() {
            state.lock.raw_release();
            return None;
        }
        Some(OwnerRef {
            ptr: raw.cast::<T>(),
            state,
        })
    }
}

/// Locked access to a resolved, live owner.
///
/// Dereferences to the owner. The guard lock is held for the lifetime of
/// this handle and released when it drops, so the owner cannot be
/// invalidated while the handle exists. Keep the critical section short:
/// the owner's destructor blocks on it.
pub struct OwnerRef<T> {
    ptr: *mut T,
    state: Arc<AnchorState>,
}

impl<T> Deref for OwnerRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Invariant: ptr was non-null under the lock and the lock is still
        // held, so the owner has not been torn down.
        unsafe { &*self.ptr }
    }
}

impl<T> DerefMut for OwnerRef<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.ptr }
    }
}

impl<T> Drop for OwnerRef<T> {
    fn drop(&mut self) {
        self.state.lock().raw_release();
    }
}
