//! The safe demo service
//!
//! An owning object that registers callbacks with the simulated async
//! library through the lifetime guard. Whether the service outlives the
//! callback or not, delivery is safe: a late callback finds "no owner"
//! instead of freed memory.

use crate::config::CallbackFlavor;
use crate::extlib;
use async_call_guard::{BoundCallback, CallToken, CallbackGuard, LockPolicy};
use std::os::raw::{c_int, c_void};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct SafeService {
    // First field: backstop invalidation before `param` is torn down.
    guard: CallbackGuard<SafeService>,
    param: c_int,
}

impl SafeService {
    pub fn new(param: c_int, policy: LockPolicy) -> Box<Self> {
        let mut service = Box::new(SafeService {
            guard: CallbackGuard::new(policy),
            param,
        });
        let raw: *mut SafeService = &mut *service;
        // Safety: the box keeps the service's address stable until Drop
        // runs set_deleted.
        unsafe { service.guard.bind(raw) };
        log::info!("service created with param {}", param);
        service
    }

    /// Register one async operation with the external library.
    pub fn execute(&self, flavor: CallbackFlavor, delay: Duration) -> JoinHandle<()> {
        log::info!("registering {:?} callback, delay {:?}", flavor, delay);
        match flavor {
            CallbackFlavor::Raw => {
                // Untyped context paired with the fixed resolver below.
                extlib::long_async_function(self.guard.context(), response_cb, self.param, delay)
            }
            CallbackFlavor::Typed => {
                // Method handle through the typed trampoline.
                let bound: BoundCallback<c_int> =
                    self.guard.callback_context(SafeService::response);
                extlib::long_async_function(bound.context, bound.callback, self.param, delay)
            }
            CallbackFlavor::Closure => {
                // Capturing closure through the same trampoline shape.
                let captured = self.param;
                let bound = self.guard.callback_context(
                    move |service: &mut SafeService, out_param: c_int| {
                        log::debug!(
                            "closure flavor: captured param {}, delivered {}",
                            captured,
                            out_param
                        );
                        service.response(out_param);
                    },
                );
                extlib::long_async_function(bound.context, bound.callback, self.param, delay)
            }
        }
    }

    pub fn response(&mut self, out_param: c_int) {
        log::info!(
            "received response. param: {}, out_param: {}",
            self.param,
            out_param
        );
        println!(
            "received response. service param {} -> result {}",
            self.param, out_param
        );
    }
}

impl Drop for SafeService {
    fn drop(&mut self) {
        // Invalidate first, so a callback racing this destructor observes
        // "no owner" instead of a half-dead service.
        self.guard.set_deleted();
        log::info!("service dropped");
    }
}

/// Fixed resolver for the raw context flavor.
unsafe extern "C" fn response_cb(context: *mut c_void, out_param: c_int) {
    match unsafe { CallToken::from_context::<SafeService>(context) } {
        Some(mut service) => service.response(out_param),
        None => {
            log::warn!("no service instance to deliver the response to");
            println!("no service instance to make callback call");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_flavors_deliver_to_a_live_service() {
        for flavor in [
            CallbackFlavor::Raw,
            CallbackFlavor::Typed,
            CallbackFlavor::Closure,
        ] {
            let service = SafeService::new(5, LockPolicy::Mutex);
            let worker = service.execute(flavor, Duration::from_millis(1));
            worker.join().unwrap();
        }
    }

    #[test]
    fn test_late_callback_after_drop_is_harmless() {
        let service = SafeService::new(5, LockPolicy::Mutex);
        let worker = service.execute(CallbackFlavor::Typed, Duration::from_millis(50));
        drop(service);
        worker.join().unwrap();
    }
}
