//! The callback token and `from_context`
//!
//! A [`CallToken`] is the one-shot, type-erased unit of context that
//! crosses the external async boundary as a single opaque pointer.
//! Ownership transfers implicitly with the pointer: the guard allocates
//! the token, the external API carries the pointer around, and whichever
//! callback finally receives it consumes the token exactly once via
//! [`CallToken::from_context`].
//!
//! Tokens carry a leading tag word so that boundary misuse (null, foreign
//! or already-consumed pointers) is detectable: every token type in this
//! crate is `repr(C)` with the tag first, and the tag is poisoned right
//! before the token's memory is handed back to the allocator. Misuse is
//! still undefined by contract — the checks are best-effort diagnostics,
//! not a recovery path.

use crate::anchor::{OwnerRef, WeakAnchor};
use crate::types::{GuardError, RawContext, Result};

/// Tag carried by a live untyped token.
pub(crate) const TOKEN_TAG: u32 = 0x4143_4754;
/// Tag carried by a live trampoline token.
pub(crate) const TRAMPOLINE_TAG: u32 = 0x4143_4742;
/// Written into a token just before it is freed.
pub(crate) const POISONED_TAG: u32 = 0xDEAD_D00D;

/// One-shot, type-erased callback context.
///
/// Created by [`crate::guard::CallbackGuard::context`], consumed by
/// [`CallToken::from_context`]. A token whose callback is never invoked
/// is never freed: the caller of the external API owes the guard exactly
/// one eventual invocation per token.
#[repr(C)]
pub struct CallToken {
    tag: u32,
    anchor: WeakAnchor,
}

impl CallToken {
    pub(crate) fn new(anchor: WeakAnchor) -> Self {
        Self {
            tag: TOKEN_TAG,
            anchor,
        }
    }

    /// Move the token to the heap and return its address as the opaque
    /// context pointer for an external API's context slot.
    ///
    /// No side effects on the anchor; the token only observes it.
    pub fn into_context(self) -> RawContext {
        Box::into_raw(Box::new(self)).cast()
    }

    /// Consume the token behind `context` and resolve it to the owner.
    ///
    /// Returns `Ok(None)` when the owner was invalidated before the
    /// callback arrived — the expected outcome, surfaced at debug level.
    /// Returns `Err` for boundary misuse: a null pointer, or a pointer
    /// whose tag does not identify a live untyped token. In both error
    /// cases nothing is freed, since the guard cannot know what the
    /// pointer actually is.
    ///
    /// # Safety
    ///
    /// `context` must be null or a pointer previously returned by
    /// [`CallToken::into_context`] that has not been consumed yet, and `T`
    /// must be the owner type the originating guard was bound to. Calling
    /// this twice with the same pointer is undefined behavior (the debug
    /// assertion and tag poisoning make that likely to be caught, nothing
    /// more).
    pub unsafe fn try_from_context<T>(context: RawContext) -> Result<Option<OwnerRef<T>>> {
        if context.is_null() {
            return Err(GuardError::NullContext);
        }

        // Peek at the tag before taking ownership back.
        let tag = unsafe { *context.cast::<u32>() };
        if tag != TOKEN_TAG {
            debug_assert!(
                false,
                "context 0x{:X} does not hold a live call token (tag 0x{:08X})",
                context as usize, tag
            );
            return Err(GuardError::BadToken(tag));
        }

        let mut token = unsafe { Box::from_raw(context.cast::<CallToken>()) };
        token.tag = POISONED_TAG;

        let resolved = unsafe { token.anchor.resolve::<T>() };
        if resolved.is_none() {
            log::debug!("call token resolved after its owner was invalidated");
        }
        Ok(resolved)
        // token freed here, exactly once, on both outcomes
    }

    /// Tolerant flavor of [`Self::try_from_context`] for use inside
    /// `extern "C"` resolvers: boundary misuse is logged and mapped to
    /// `None` instead of propagating, so nothing unwinds across the ABI.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::try_from_context`].
    pub unsafe fn from_context<T>(context: RawContext) -> Option<OwnerRef<T>> {
        match unsafe { Self::try_from_context::<T>(context) } {
            Ok(resolved) => resolved,
            Err(err) => {
                log::error!("rejected callback context: {err}");
                None
            }
        }
    }
}
