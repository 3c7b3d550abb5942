//! Typed-callback adaptation
//!
//! The trampoline lets an owner hand an arbitrary typed callable — a plain
//! function, a method handle like `Owner::response`, or a capturing
//! closure — to a C-only async API, while still routing delivery through
//! the callback token for lifetime safety.
//!
//! [`bind_callback`] packages the callable into a heap token and pairs its
//! address with a monomorphized `extern "C"` trampoline of the exact shape
//! the external API expects. When the external API fires, the trampoline
//! reconstructs the token, resolves the anchor under the guard lock, and
//! only invokes the stored callable if the owner is still live.

use crate::anchor::WeakAnchor;
use crate::token::{POISONED_TAG, TRAMPOLINE_TAG};
use crate::types::{BoundCallback, RawCallback, RawContext};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

/// Callback token extended with the caller-supplied callable.
///
/// Same layout discipline as the plain token: `repr(C)` with the tag word
/// first, so the boundary checks can tell the two apart.
#[repr(C)]
struct TrampolineToken<T, A, F> {
    tag: u32,
    anchor: WeakAnchor,
    callback: F,
    _owner: PhantomData<fn(*mut T, A)>,
}

/// Adapt `callback` into the external API's context/function-pointer pair.
///
/// The returned [`BoundCallback`] is ready for a registration call shaped
/// as `register(context, callback, ...)`. Creating the pair has no side
/// effects on the anchor; as with every token, the external API owes the
/// pair exactly one eventual invocation, on whatever thread it likes.
///
/// The callable receives the live owner and the delivered argument, and
/// runs under the guard lock — keep it short, and do not re-enter the
/// guard from inside it (the lock is non-recursive).
pub fn bind_callback<T, A, F>(anchor: WeakAnchor, callback: F) -> BoundCallback<A>
where
    F: FnMut(&mut T, A) + Send + 'static,
{
    let token = Box::new(TrampolineToken::<T, A, F> {
        tag: TRAMPOLINE_TAG,
        anchor,
        callback,
        _owner: PhantomData,
    });
    BoundCallback {
        context: Box::into_raw(token).cast(),
        callback: trampoline::<T, A, F> as RawCallback<A>,
    }
}

/// The static callback handed to the external API.
///
/// Reconstruct token → lock → resolve anchor → invoke callable if the
/// owner is live → free the token. Exactly one of "callable invoked" and
/// "delivery dropped" happens, and the token is freed on both paths.
#[allow(improper_ctypes_definitions)] // A is the external API's own argument type
unsafe extern "C" fn trampoline<T, A, F>(context: RawContext, arg: A)
where
    F: FnMut(&mut T, A) + Send + 'static,
{
    if context.is_null() {
        log::error!("async callback delivered a null context");
        return;
    }
    let tag = unsafe { *context.cast::<u32>() };
    if tag != TRAMPOLINE_TAG {
        debug_assert!(
            false,
            "context 0x{:X} does not hold a live trampoline token (tag 0x{:08X})",
            context as usize, tag
        );
        log::error!("rejected trampoline context with tag 0x{:08X}", tag);
        return;
    }

    let mut token = unsafe { Box::from_raw(context.cast::<TrampolineToken<T, A, F>>()) };
    token.tag = POISONED_TAG;

    match unsafe { token.anchor.resolve::<T>() } {
        Some(mut owner) => {
            // The owner's own callback logic answers for its errors; the
            // one thing the guard enforces is that no panic crosses the
            // ABI boundary.
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (token.callback)(&mut *owner, arg)));
            if outcome.is_err() {
                log::error!("callback panicked; unwind suppressed at the ABI boundary");
            }
        }
        None => log::debug!("async callback arrived after its owner was torn down; dropping it"),
    }
    // token freed here, exactly once, on both paths
}
