//! Async Call Guard Library
//!
//! A reusable callback lifetime guard for bridging C-style asynchronous
//! APIs ("fire a callback into a raw context pointer") to an owning object
//! whose lifetime is independent of when — or on which thread — the async
//! operation completes.
//!
//! # Architecture
//!
//! The guard is intentionally minimal and focused on lifetime safety:
//! - Packages an opaque, type-erased context plus callback pointer for any
//!   C ABI callback slot
//! - Resolves that context back to the owner only if the owner still
//!   exists
//! - Serializes "resolve a pending callback" against "owner destructs" so
//!   neither observes a half-destroyed object
//!
//! The library does NOT:
//! - Schedule or order callbacks
//! - Retry, batch, or cancel operations
//! - Guarantee delivery beyond at-most-once to a live owner
//!
//! The demo application layer (async-call-cli) shows the guard wired to a
//! simulated third-party async library.
//!
//! # Example Usage
//!
//! ```no_run
//! use async_call_guard::{CallToken, CallbackGuard, LockPolicy};
//! use std::os::raw::{c_int, c_void};
//!
//! struct Sensor {
//!     guard: CallbackGuard<Sensor>,
//!     last_reading: c_int,
//! }
//!
//! // Fixed resolver for the untyped flavor: the external API calls this
//! // with the opaque context and the delivered result.
//! unsafe extern "C" fn on_reading(context: *mut c_void, value: c_int) {
//!     match unsafe { CallToken::from_context::<Sensor>(context) } {
//!         Some(mut sensor) => sensor.last_reading = value,
//!         None => log::debug!("reading arrived after the sensor was dropped"),
//!     }
//! }
//!
//! let mut sensor = Box::new(Sensor {
//!     guard: CallbackGuard::new(LockPolicy::Mutex),
//!     last_reading: 0,
//! });
//! let raw: *mut Sensor = &mut *sensor;
//! // Safety: the box keeps the sensor's address stable until the guard
//! // invalidates the anchor on drop.
//! unsafe { sensor.guard.bind(raw) };
//!
//! // Hand (context, on_reading) to the external async API. Dropping the
//! // sensor first is fine: the late callback resolves to nothing.
//! let context = sensor.guard.context();
//!
//! // Typed flavor: any callable, no hand-written resolver.
//! let bound = sensor
//!     .guard
//!     .callback_context(|sensor: &mut Sensor, value: c_int| {
//!         sensor.last_reading = value;
//!     });
//! # let _ = (context, bound);
//! ```

// Public modules
pub mod anchor;
pub mod config;
pub mod guard;
pub mod lock;
pub mod token;
pub mod trampoline;
pub mod types;

// Re-export main types for convenience
pub use anchor::{OwnerRef, SharedAnchor, WeakAnchor};
pub use config::LockPolicy;
pub use guard::CallbackGuard;
pub use lock::{GuardLock, LockGuard};
pub use token::CallToken;
pub use trampoline::bind_callback;
pub use types::{BoundCallback, GuardError, RawCallback, RawContext, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an unbound guard mints tokens that resolve to nothing.
        let guard: CallbackGuard<u32> = CallbackGuard::new(LockPolicy::default());
        assert!(!guard.is_live());
        let context = guard.context();
        assert!(unsafe { CallToken::from_context::<u32>(context) }.is_none());
    }
}
