// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Lock-free admission control for tasks shared between a worker pool and asynchronous
//! requesters.
//!
//! A task (for example a client session) is run by a bounded pool of workers and is parked
//! between bursts of work. Any thread may hand it new input and wake it at any time. A
//! [`WorkZone`] is the atomic state machine deciding, at any instant, who may run the task and
//! who has to dispose of it, so that wakeups are never lost, a task is never admitted twice and
//! exactly one party ends up responsible for it.
//!
//! # Protocol
//!
//! - A *scheduler* admits a task with [`Admission::try_enter`] (or
//!   [`Admission::try_enter_owner`]) and only enqueues it if that returned `true`.
//! - A *worker* runs the task, then calls [`Admission::try_leave`] until it returns a terminal
//!   result, reprocessing input on every [`LeaveResult::PendingSignal`]. [`Admission::depart`]
//!   runs that loop.
//! - A *requester* publishes input, then calls [`Admission::notify`]. If nobody was admitted it
//!   has to admit and enqueue the task itself. [`Admission::wake`] runs that sequence.

#![cfg_attr(not(test), no_std)]

mod guard;
mod loom;
mod state;
#[cfg(test)]
mod test_util;
mod trivial;
mod zone;

pub use guard::{DebugGuard, HeldLock};
pub use state::Snapshot;
pub use trivial::TrivialZone;
pub use zone::WorkZone;

cfg_if::cfg_if! {
    if #[cfg(feature = "single-threaded")] {
        /// The zone used when no real concurrency is possible.
        pub type DefaultZone = TrivialZone;
    } else {
        /// The lock-free zone.
        pub type DefaultZone = WorkZone;
    }
}

/// The result of a single [`Admission::try_leave`] attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum LeaveResult {
    /// A notification arrived since the last attempt. The caller has *not* departed; it must
    /// process pending input and call `try_leave` again.
    PendingSignal,
    /// The caller departed. Someone else is responsible for the task, hand it back to the event
    /// poller.
    DepartedNotOwner,
    /// The caller departed and is responsible for disposing of or re-registering the task.
    DepartedOwner,
}

/// A terminal departure, as returned by [`Admission::depart`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Departure {
    /// The departing context owns the task.
    Owner,
    /// The departing context does not own the task.
    NotOwner,
}

/// What a requester has to do after [`Admission::wake`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum WakeAction {
    /// An admitted context will observe the notification at its next departure attempt.
    Notified,
    /// Nobody was admitted. The caller now holds an owning admission and must enqueue the task.
    Schedule,
    /// Another context was admitted in between and inherits ownership at its departure.
    OwnershipPassed,
}

/// Admission, departure and notification of a single task.
pub trait Admission {
    /// Admits the caller as the task's owner.
    ///
    /// Returns `true` if the caller was admitted. If another context already holds admission
    /// this returns `false` but still marks the task as owned, the current holder inherits
    /// ownership and learns about it at its departure.
    fn try_enter_owner(&self) -> bool;

    /// Admits the caller without taking ownership.
    ///
    /// The caller must hold the lock protecting the scheduler's queue of this task.
    fn try_enter(&self) -> bool;

    /// Attempts to depart. The caller must hold an undeparted admission.
    fn try_leave(&self) -> LeaveResult;

    /// Delivers a notification.
    ///
    /// Returns `true` if a context is admitted and will observe the notification. On `false`
    /// nothing will ever observe it and the caller must perform an owning admission itself.
    fn notify(&self) -> bool;

    /// Asserts that some context is admitted. Does nothing in release builds.
    fn assert_entered(&self);

    /// Departs, calling `on_signal` to reprocess input for every pending notification
    /// encountered on the way out.
    fn depart(&self, mut on_signal: impl FnMut()) -> Departure
    where
        Self: Sized,
    {
        loop {
            match self.try_leave() {
                LeaveResult::PendingSignal => on_signal(),
                LeaveResult::DepartedOwner => return Departure::Owner,
                LeaveResult::DepartedNotOwner => return Departure::NotOwner,
            }
        }
    }

    /// Notifies the task, falling back to an owning admission if nobody was listening.
    ///
    /// Requesters that may race each other on an idle task must be serialized by whatever keeps
    /// the task alive while they call this, otherwise two owning admissions can collide.
    fn wake(&self) -> WakeAction
    where
        Self: Sized,
    {
        if self.notify() {
            WakeAction::Notified
        } else if self.try_enter_owner() {
            WakeAction::Schedule
        } else {
            WakeAction::OwnershipPassed
        }
    }
}
