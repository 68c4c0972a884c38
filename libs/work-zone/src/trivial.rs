// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::guard::HeldLock;
use crate::{Admission, LeaveResult};

/// An [`Admission`] implementation for configurations where only one context can ever touch a
/// task.
///
/// Every admission succeeds, every departure is a departure as owner, and a notification is
/// never observed by anyone else so requesters always schedule the task themselves.
#[derive(Debug, Default, Copy, Clone)]
pub struct TrivialZone;

impl TrivialZone {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Accepts a lock for parity with [`WorkZone::init_guard`](crate::WorkZone::init_guard).
    ///
    /// # Safety
    ///
    /// Always safe to call, `lock` is never stored.
    #[inline(always)]
    pub unsafe fn init_guard<L: HeldLock + 'static>(&mut self, _lock: &L) {}

    #[must_use]
    pub fn is_idle(&self) -> bool {
        true
    }
}

impl Admission for TrivialZone {
    #[inline(always)]
    fn try_enter_owner(&self) -> bool {
        true
    }

    #[inline(always)]
    fn try_enter(&self) -> bool {
        true
    }

    #[inline(always)]
    fn try_leave(&self) -> LeaveResult {
        LeaveResult::DepartedOwner
    }

    #[inline(always)]
    fn notify(&self) -> bool {
        false
    }

    #[inline(always)]
    fn assert_entered(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Departure, WakeAction};

    #[test]
    fn always_admits() {
        let zone = TrivialZone::new();
        assert!(zone.try_enter());
        assert!(zone.try_enter());
        assert!(zone.try_enter_owner());
        assert_eq!(zone.try_leave(), LeaveResult::DepartedOwner);
    }

    #[test]
    fn requester_always_schedules() {
        let zone = TrivialZone::new();
        assert_eq!(zone.wake(), WakeAction::Schedule);
        let mut signals = 0;
        assert_eq!(zone.depart(|| signals += 1), Departure::Owner);
        assert_eq!(signals, 0);
        assert!(zone.is_idle());
    }
}
