// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// A lock whose held-ness can be asserted by a [`DebugGuard`].
///
/// The guard only ever asks whether the lock is held right now, it never acquires or releases
/// it. Implementations for lock types that cannot tell *who* holds them (such as plain spin
/// locks) report whether the lock is held by anyone.
pub trait HeldLock: Sync {
    /// Returns `true` if the lock is currently held.
    fn is_held(&self) -> bool;
}

impl<R, T> HeldLock for lock_api::Mutex<R, T>
where
    R: lock_api::RawMutex + Sync,
    T: ?Sized + Send,
{
    #[inline]
    fn is_held(&self) -> bool {
        self.is_locked()
    }
}

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        use core::fmt;
        use core::ptr::NonNull;

        /// Remembers an externally owned lock so call sites can assert it is held.
        ///
        /// In builds without `debug_assertions` this type is zero-sized and all of its methods
        /// compile to nothing.
        pub struct DebugGuard {
            lock: Option<NonNull<dyn HeldLock>>,
        }

        // Safety: the guard only ever hands out shared references to the lock, and `HeldLock`
        // requires the lock to be `Sync`.
        unsafe impl Send for DebugGuard {}
        // Safety: see above
        unsafe impl Sync for DebugGuard {}

        impl DebugGuard {
            #[must_use]
            pub const fn new() -> Self {
                Self { lock: None }
            }

            /// Records `lock` as the lock protecting the guarded call sites.
            ///
            /// # Safety
            ///
            /// The caller must ensure `lock` outlives every later call to
            /// [`assert_protected`](Self::assert_protected).
            #[inline]
            pub unsafe fn init<L: HeldLock + 'static>(&mut self, lock: &L) {
                let lock: NonNull<dyn HeldLock> = NonNull::from(lock);
                self.lock = Some(lock);
            }

            /// Asserts the recorded lock is held. Does nothing if no lock was recorded.
            ///
            /// # Panics
            ///
            /// Panics if a lock was recorded and is not currently held.
            #[inline]
            #[track_caller]
            pub fn assert_protected(&self) {
                if let Some(lock) = self.lock {
                    // Safety: `init` requires the lock to outlive us.
                    let lock = unsafe { lock.as_ref() };
                    assert!(
                        lock.is_held(),
                        "work zone entered without holding its protecting lock"
                    );
                }
            }
        }

        impl fmt::Debug for DebugGuard {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct("DebugGuard")
                    .field("lock", &self.lock.map(NonNull::as_ptr))
                    .finish()
            }
        }
    } else {
        /// Remembers an externally owned lock so call sites can assert it is held.
        ///
        /// This build has `debug_assertions` disabled so the guard remembers nothing.
        #[derive(Debug)]
        pub struct DebugGuard(());

        impl DebugGuard {
            #[must_use]
            pub const fn new() -> Self {
                Self(())
            }

            /// # Safety
            ///
            /// The caller must ensure `lock` outlives every later call to
            /// [`assert_protected`](Self::assert_protected).
            #[inline(always)]
            pub unsafe fn init<L: HeldLock + 'static>(&mut self, _lock: &L) {}

            #[inline(always)]
            pub fn assert_protected(&self) {}
        }
    }
}

impl Default for DebugGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::test_util::SpinMutex;

    #[test]
    fn unset_guard_never_fires() {
        let guard = DebugGuard::new();
        guard.assert_protected();
    }

    #[test]
    fn held_lock_passes() {
        let lock = SpinMutex::new(());
        let mut guard = DebugGuard::new();
        // Safety: `lock` outlives `guard`
        unsafe { guard.init(&lock) };

        let _held = lock.lock();
        guard.assert_protected();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic = "without holding its protecting lock"]
    fn released_lock_fires() {
        let lock = SpinMutex::new(());
        let mut guard = DebugGuard::new();
        // Safety: `lock` outlives `guard`
        unsafe { guard.init(&lock) };

        guard.assert_protected();
    }

    #[test]
    fn spin_mutex_reports_held() {
        let lock = SpinMutex::new(0_u32);
        assert!(!lock.is_held());
        let held = lock.lock();
        assert!(lock.is_held());
        drop(held);
        assert!(!lock.is_held());
    }
}
