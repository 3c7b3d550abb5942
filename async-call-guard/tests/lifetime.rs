//! End-to-end lifetime tests
//!
//! Exercises the guard the way a real integration does: an owner registers
//! callbacks with a C-shape async boundary, and delivery races (or
//! follows) the owner's destruction. Covers the live path, the owner-gone
//! path, and concurrent destruction on the mutex policy.

use async_call_guard::{BoundCallback, CallToken, CallbackGuard, LockPolicy, RawContext};
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

struct Owner {
    guard: CallbackGuard<Owner>,
    value: c_int,
    observed: Vec<(c_int, c_int)>,
}

impl Owner {
    fn new(value: c_int, policy: LockPolicy) -> Box<Self> {
        let mut owner = Box::new(Owner {
            guard: CallbackGuard::new(policy),
            value,
            observed: Vec::new(),
        });
        let raw: *mut Owner = &mut *owner;
        unsafe { owner.guard.bind(raw) };
        owner
    }

    fn record(&mut self, result: c_int) {
        self.observed.push((self.value, result));
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        // Invalidate before `observed` and `value` are torn down.
        self.guard.set_deleted();
    }
}

/// Fixed resolver for the untyped context flavor.
unsafe extern "C" fn record_cb(context: *mut c_void, result: c_int) {
    if let Some(mut owner) = unsafe { CallToken::from_context::<Owner>(context) } {
        owner.record(result);
    }
}

/// Context pointers are handed to foreign threads by the external API.
struct SendContext(RawContext);
unsafe impl Send for SendContext {}

#[test]
fn test_live_owner_observes_value_and_result() {
    // Owner with value 5, delivery of 10 before destruction: the callback
    // observes exactly (5, 10), once.
    let owner = Owner::new(5, LockPolicy::Mutex);
    let bound: BoundCallback<c_int> = owner.guard.callback_context(Owner::record);
    unsafe { (bound.callback)(bound.context, 10) };
    assert_eq!(owner.observed, vec![(5, 10)]);
}

#[test]
fn test_untyped_flavor_reaches_live_owner() {
    let owner = Owner::new(5, LockPolicy::Mutex);
    let context = owner.guard.context();
    unsafe { record_cb(context, 10) };
    assert_eq!(owner.observed, vec![(5, 10)]);
}

#[test]
fn test_delivery_after_drop_reports_no_owner() {
    let owner = Owner::new(5, LockPolicy::Mutex);
    let context = owner.guard.context();
    drop(owner);
    // The resolver runs, finds nothing, and nothing crashes.
    unsafe { record_cb(context, 10) };
}

#[test]
fn test_trampoline_after_drop_skips_the_callable() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);

    let owner = Owner::new(5, LockPolicy::Mutex);
    let bound = owner
        .guard
        .callback_context(move |_owner: &mut Owner, _result: c_int| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    drop(owner);
    unsafe { (bound.callback)(bound.context, 10) };
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn test_closure_forwards_captured_state_once() {
    let captured = 21;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    let owner = Owner::new(5, LockPolicy::Mutex);
    let bound = owner
        .guard
        .callback_context(move |owner: &mut Owner, result: c_int| {
            assert_eq!(captured, 21);
            assert_eq!(owner.value, 5);
            assert_eq!(result, 10);
            counter.fetch_add(1, Ordering::SeqCst);
        });
    unsafe { (bound.callback)(bound.context, 10) };
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_noop_policy_single_threaded_roundtrip() {
    // Single thread throughout: the no-op policy's integration contract.
    let owner = Owner::new(3, LockPolicy::Noop);
    let bound: BoundCallback<c_int> = owner.guard.callback_context(Owner::record);
    unsafe { (bound.callback)(bound.context, 6) };
    assert_eq!(owner.observed, vec![(3, 6)]);

    let context = owner.guard.context();
    drop(owner);
    unsafe { record_cb(context, 6) };
}

#[test]
fn test_foreign_thread_delivery_races_destruction() {
    // Delivery on a foreign thread with varying delays, destruction on
    // this one. Every run must end with either a live observation or a
    // clean "no owner" — never a torn state, never a crash.
    for delay_us in [0u64, 50, 200, 1000, 5000] {
        let (tx, rx) = mpsc::channel();
        let owner = Owner::new(7, LockPolicy::Mutex);
        let context = SendContext(owner.guard.context());

        let worker = thread::spawn(move || {
            let context = context;
            thread::sleep(Duration::from_micros(delay_us));
            let outcome = match unsafe { CallToken::from_context::<Owner>(context.0) } {
                Some(mut owner) => {
                    // Live resolution sees a consistent owner.
                    assert_eq!(owner.value, 7);
                    owner.record(14);
                    "live"
                }
                None => "empty",
            };
            tx.send(outcome).unwrap();
        });

        thread::sleep(Duration::from_micros(100));
        drop(owner);
        worker.join().unwrap();

        let outcome = rx.recv().unwrap();
        assert!(outcome == "live" || outcome == "empty");
    }
}

#[test]
fn test_many_resolutions_race_one_destruction() {
    const RESOLVERS: usize = 8;

    let live = Arc::new(AtomicUsize::new(0));
    let empty = Arc::new(AtomicUsize::new(0));

    let owner = Owner::new(3, LockPolicy::Mutex);
    let contexts: Vec<SendContext> = (0..RESOLVERS)
        .map(|_| SendContext(owner.guard.context()))
        .collect();

    let workers: Vec<_> = contexts
        .into_iter()
        .map(|context| {
            let live = Arc::clone(&live);
            let empty = Arc::clone(&empty);
            thread::spawn(move || {
                let context = context;
                match unsafe { CallToken::from_context::<Owner>(context.0) } {
                    Some(mut owner) => {
                        assert_eq!(owner.value, 3);
                        owner.record(6);
                        live.fetch_add(1, Ordering::SeqCst);
                    }
                    None => {
                        empty.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_micros(200));
    drop(owner);
    for worker in workers {
        worker.join().unwrap();
    }

    // Every token was consumed exactly once, one way or the other.
    assert_eq!(
        live.load(Ordering::SeqCst) + empty.load(Ordering::SeqCst),
        RESOLVERS
    );
}

#[test]
fn test_destruction_waits_for_inflight_resolution() {
    // A resolution that holds the lock delays set_deleted until it is
    // done; the owner must still be fully consistent inside the callback.
    let (entered_tx, entered_rx) = mpsc::channel();

    let owner = Owner::new(11, LockPolicy::Mutex);
    let context = SendContext(owner.guard.context());

    let worker = thread::spawn(move || {
        let context = context;
        if let Some(mut owner) = unsafe { CallToken::from_context::<Owner>(context.0) } {
            entered_tx.send(()).unwrap();
            // Hold the lock with the owner resolved while the main thread
            // tries to destroy it.
            thread::sleep(Duration::from_millis(50));
            assert_eq!(owner.value, 11);
            owner.record(22);
        } else {
            entered_tx.send(()).unwrap();
        }
    });

    // Wait until the worker has either resolved or given up, then race
    // the destructor against the held lock.
    entered_rx.recv().unwrap();
    drop(owner);
    worker.join().unwrap();
}
