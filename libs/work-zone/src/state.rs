// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(
    impl_trait_overcaptures,
    reason = "mycelium_bitfield is not updated to edition 2024 yet"
)]

use core::fmt;

use crate::loom::loom_const_fn;
use crate::loom::sync::atomic::{AtomicUsize, Ordering};

/// The state word of a [`WorkZone`](crate::WorkZone). The zone stores its state in a single
/// atomic `usize` with the following layout:
///
/// ```text
/// | 63     3 | 2       2 | 1     1 | 0        0 |
/// |  unused  |  pending  |  owned  |  admitted  |
/// ```
pub(crate) struct State {
    val: AtomicUsize,
}

mycelium_bitfield::bitfield! {
    /// A snapshot of a work zone's state.
    ///
    /// Snapshots taken from a zone that is shared with other threads may be stale by the time
    /// they are inspected, they are meant for diagnostics and assertions.
    #[derive(PartialEq, Eq)]
    pub struct Snapshot<usize> {
        /// If set, an execution context currently holds the right to run the task's logic.
        pub const ADMITTED: bool;
        /// If set, the current (or most recently) admitted context is responsible for disposing
        /// of or re-registering the task once it departs.
        pub const OWNED: bool;
        /// If set, a notification has been delivered that no departure has observed yet.
        pub const PENDING: bool;
    }
}

const ENTER: usize = Snapshot::ADMITTED.raw_mask();
const ENTER_OWNER: usize = Snapshot::ADMITTED.raw_mask() | Snapshot::OWNED.raw_mask();
const PENDING: usize = Snapshot::PENDING.raw_mask();
const IDLE: usize = 0;

impl State {
    loom_const_fn! {
        /// Returns the all-clear state of a fresh zone (idle, unowned, nothing pending).
        pub(crate) const fn new() -> State {
            State {
                val: AtomicUsize::new(IDLE),
            }
        }
    }

    pub(crate) fn load(&self, ordering: Ordering) -> Snapshot {
        Snapshot(self.val.load(ordering))
    }

    /// Sets `ADMITTED` (and `OWNED` if `owner` is true), returning the prior state.
    ///
    /// The `Acquire` half synchronizes with the `Release` of the previous departure so the new
    /// holder observes everything the last one did to the task.
    pub(crate) fn enter(&self, owner: bool) -> Snapshot {
        let bits = if owner { ENTER_OWNER } else { ENTER };
        Snapshot(self.val.fetch_or(bits, Ordering::Acquire))
    }

    /// Sets `PENDING`, returning the prior state.
    pub(crate) fn signal(&self) -> Snapshot {
        Snapshot(self.val.fetch_or(PENDING, Ordering::AcqRel))
    }

    /// Clears `PENDING` and nothing else, returning the prior state.
    pub(crate) fn take_signal(&self) -> Snapshot {
        Snapshot(self.val.fetch_and(!PENDING, Ordering::AcqRel))
    }

    /// Attempts to clear the whole word, provided it still equals `current`.
    ///
    /// On failure the freshly observed state is returned.
    pub(crate) fn try_clear(&self, current: Snapshot) -> Result<Snapshot, Snapshot> {
        self.val
            .compare_exchange(current.0, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .map(Snapshot)
            .map_err(Snapshot)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}

impl Snapshot {
    /// Returns `true` if no bit is set, i.e. the zone is idle, unowned and nothing is pending.
    #[must_use]
    pub fn is_idle(self) -> bool {
        self.0 == IDLE
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(Snapshot::ADMITTED.raw_mask(), 0b001);
        assert_eq!(Snapshot::OWNED.raw_mask(), 0b010);
        assert_eq!(Snapshot::PENDING.raw_mask(), 0b100);
    }

    #[test]
    fn take_signal_leaves_admission_alone() {
        let state = State::new();
        let _ = state.enter(true);
        let _ = state.signal();

        let prev = state.take_signal();
        assert!(prev.get(Snapshot::PENDING));

        let now = state.load(Ordering::Relaxed);
        assert!(now.get(Snapshot::ADMITTED));
        assert!(now.get(Snapshot::OWNED));
        assert!(!now.get(Snapshot::PENDING));
    }

    #[test]
    fn try_clear_reports_concurrent_change() {
        let state = State::new();
        let before = state.enter(false);
        assert!(before.is_idle());

        let seen = state.load(Ordering::Relaxed);
        let _ = state.signal();

        let actual = state.try_clear(seen).unwrap_err();
        assert!(actual.get(Snapshot::PENDING));
        assert!(actual.get(Snapshot::ADMITTED));

        let prev = state.try_clear(actual).unwrap();
        assert_eq!(prev, actual);
        assert!(state.load(Ordering::Relaxed).is_idle());
    }
}
