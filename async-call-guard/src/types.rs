//! Core types for the callback lifetime guard
//!
//! This module defines the ABI-facing aliases that cross the external
//! callback boundary and the error taxonomy for boundary misuse. The
//! "owner is gone" outcome is deliberately *not* an error (see
//! [`crate::token::CallToken::from_context`]); only malformed or foreign
//! context pointers are.

use std::os::raw::c_void;

/// Opaque context pointer handed across the external async API.
///
/// The pointer is produced by the guard (from a heap-allocated callback
/// token) and must be passed back, exactly once, to the callback the guard
/// paired it with.
pub type RawContext = *mut c_void;

/// The C callback shape the guard interoperates with: an opaque context
/// plus one delivered result argument.
///
/// `A` must be an FFI-safe type chosen to match the external API's
/// declared callback signature (e.g. `c_int`).
pub type RawCallback<A> = unsafe extern "C" fn(context: RawContext, arg: A);

/// Result type for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// A context/callback pair ready to hand to an external registration call
/// shaped as `register(context, callback, ...)`.
///
/// Produced by [`crate::guard::CallbackGuard::callback_context`] and
/// [`crate::trampoline::bind_callback`].
pub struct BoundCallback<A> {
    /// Opaque context pointer owning a one-shot trampoline token
    pub context: RawContext,
    /// Static trampoline with the exact external callback signature
    pub callback: RawCallback<A>,
}

// Manual impls: the derived ones would put an `A: Clone`/`A: Copy` bound
// on a struct that only stores a pointer and a function pointer.
impl<A> Clone for BoundCallback<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for BoundCallback<A> {}

impl<A> std::fmt::Debug for BoundCallback<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCallback")
            .field("context", &self.context)
            .field("callback", &(self.callback as *const ()))
            .finish()
    }
}

/// Errors that can occur at the guard's boundaries
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("callback context pointer is null")]
    NullContext,

    #[error("callback context does not point at a live call token (tag 0x{0:08X})")]
    BadToken(u32),

    #[error("unknown lock policy: {0} (expected \"mutex\" or \"noop\")")]
    UnknownLockPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_callback_is_copyable() {
        unsafe extern "C" fn noop(_context: RawContext, _arg: i32) {}

        let bound = BoundCallback {
            context: std::ptr::null_mut(),
            callback: noop as RawCallback<i32>,
        };
        let copy = bound;
        assert_eq!(copy.context, bound.context);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", GuardError::NullContext),
            "callback context pointer is null"
        );
        assert!(format!("{}", GuardError::BadToken(0xDEAD_D00D)).contains("0xDEADD00D"));
    }
}
