//! Simulated third-party async library
//!
//! Stands in for the external C API the guard must interoperate with: a
//! registration call that takes an opaque context and a C-shape callback,
//! does its work on its own thread, and fires the callback there. The
//! guard has no say in when (or on which thread) that happens — which is
//! the whole point of the demo.

use async_call_guard::{RawCallback, RawContext};
use std::os::raw::c_int;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The library moves the opaque context to its worker thread.
struct SendContext(RawContext);
unsafe impl Send for SendContext {}

/// `register(context, callback, in_param)`: after `delay`, computes
/// `in_param * 2` and fires `callback(context, result)` on a worker
/// thread.
///
/// Returns the worker's join handle so the demo can drain the in-flight
/// callback before exiting (the original library detaches instead).
pub fn long_async_function(
    context: RawContext,
    callback: RawCallback<c_int>,
    in_param: c_int,
    delay: Duration,
) -> JoinHandle<()> {
    let context = SendContext(context);
    thread::spawn(move || {
        let context = context;
        thread::sleep(delay);
        let out_param = in_param.wrapping_mul(2);
        log::debug!("async library firing callback with result {}", out_param);
        // Safety: the context/callback pair came from the guard, and this
        // is its single invocation.
        unsafe { (callback)(context.0, out_param) };
    })
}
