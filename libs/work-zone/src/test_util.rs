// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg_attr(loom, allow(dead_code, reason = "guard tests don't run under loom"))]
pub(crate) type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;

/// Minimal test-and-set lock, used as the scheduler lock in tests.
///
/// Always built on `core` atomics, even under loom, because `lock_api` needs a `const` init.
#[cfg_attr(loom, allow(dead_code, reason = "guard tests don't run under loom"))]
pub(crate) struct RawSpinLock {
    locked: AtomicBool,
}

// Safety: the lock is only ever acquired through a successful `false -> true` transition and
// released by the holder.
unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const, reason = "required by lock_api")]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        while !self.try_lock() {
            while self.is_locked() {
                std::thread::yield_now();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Installs a thread-local fmt subscriber filtered by `RUST_LOG`.
#[must_use]
pub(crate) fn trace_init() -> impl Drop {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .with_test_writer()
        .set_default()
}
