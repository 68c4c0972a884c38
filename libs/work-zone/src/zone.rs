// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::guard::{DebugGuard, HeldLock};
use crate::loom::loom_const_fn;
use crate::loom::sync::atomic::Ordering;
use crate::state::{Snapshot, State};
use crate::{Admission, LeaveResult};

/// How often [`WorkZone::try_leave`] re-checks a state that changed under its
/// compare-and-swap before handing a [`LeaveResult::PendingSignal`] back to the caller.
///
/// While a context is admitted only `PENDING` (and seeing it ends the attempt) and `OWNED` (at
/// most once) can change, so three attempts always observe a stable state.
const LEAVE_ATTEMPTS: usize = 3;

/// Lock-free admission state machine protecting a single task.
///
/// See the [crate-level documentation](crate) for the protocol.
///
/// # Implementation Notes
///
/// The zone is a single atomic word with three bits: `ADMITTED`, `OWNED` and `PENDING`.
/// Admissions and notifications are unconditional `fetch_or`s that decide their outcome from
/// the prior value. Departures are the only transitions that clear bits, and they always look
/// at `PENDING` first: a notification that lands while a worker is on its way out either makes
/// the clearing compare-and-swap fail or is seen before it is attempted.
pub struct WorkZone {
    state: State,
    guard: DebugGuard,
}

// === impl WorkZone ===

impl WorkZone {
    loom_const_fn! {
        /// Returns an idle, unowned zone.
        #[must_use]
        pub const fn new() -> WorkZone {
            WorkZone {
                state: State::new(),
                guard: DebugGuard::new(),
            }
        }
    }

    /// Records the lock that callers of [`try_enter`](Admission::try_enter) must hold.
    ///
    /// The lock is only ever inspected by a debug assertion, builds without
    /// `debug_assertions` ignore it entirely.
    ///
    /// # Safety
    ///
    /// `lock` must outlive every later call to `try_enter` on this zone.
    pub unsafe fn init_guard<L: HeldLock + 'static>(&mut self, lock: &L) {
        // Safety: ensured by caller
        unsafe { self.guard.init(lock) };
    }

    /// Returns a snapshot of the current state.
    ///
    /// If other threads are operating on the zone the snapshot may already be stale.
    #[must_use]
    pub fn state(&self) -> Snapshot {
        self.state.load(Ordering::Acquire)
    }

    /// Returns `true` if nobody is admitted, nobody owns the task and nothing is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }
}

impl Admission for WorkZone {
    #[track_caller]
    fn try_enter_owner(&self) -> bool {
        let prev = self.state.enter(true);
        tracing::trace!(state = ?prev, "WorkZone::try_enter_owner");

        debug_assert!(
            !(prev.get(Snapshot::ADMITTED) && prev.get(Snapshot::OWNED)),
            "owning admission collided with an admitted owner! state={prev:?}"
        );

        !prev.get(Snapshot::ADMITTED)
    }

    #[track_caller]
    fn try_enter(&self) -> bool {
        self.guard.assert_protected();

        let prev = self.state.enter(false);
        tracing::trace!(state = ?prev, "WorkZone::try_enter");

        !prev.get(Snapshot::ADMITTED)
    }

    #[track_caller]
    fn try_leave(&self) -> LeaveResult {
        let mut current = self.state.load(Ordering::Acquire);

        for _ in 0..LEAVE_ATTEMPTS {
            tracing::trace!(state = ?current, "WorkZone::try_leave");
            debug_assert!(
                current.get(Snapshot::ADMITTED),
                "tried to leave a work zone that was not entered! state={current:?}"
            );

            // A notification arrived, stay admitted and let the caller process it.
            if current.get(Snapshot::PENDING) {
                let _prev = self.state.take_signal();
                debug_assert!(_prev.get(Snapshot::PENDING));
                return LeaveResult::PendingSignal;
            }

            match self.state.try_clear(current) {
                Ok(prev) if prev.get(Snapshot::OWNED) => return LeaveResult::DepartedOwner,
                Ok(_) => return LeaveResult::DepartedNotOwner,
                Err(actual) => current = actual,
            }
        }

        tracing::trace!(state = ?current, "WorkZone::try_leave; attempts exhausted");
        LeaveResult::PendingSignal
    }

    fn notify(&self) -> bool {
        let prev = self.state.signal();
        tracing::trace!(state = ?prev, "WorkZone::notify");

        prev.get(Snapshot::ADMITTED)
    }

    #[track_caller]
    fn assert_entered(&self) {
        debug_assert!(
            self.state.load(Ordering::Relaxed).get(Snapshot::ADMITTED),
            "work zone was expected to be entered! state={:?}",
            self.state
        );
    }
}

impl Default for WorkZone {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkZone")
            .field("state", &self.state)
            .field("guard", &self.guard)
            .finish()
    }
}
