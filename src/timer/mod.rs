//! Timer facility abstraction and its concrete implementations.
//!
//! The rest of the crate only talks to a [`TimerFacility`]: a triple of
//! create / set / close operations plus a clock. Two facilities ship with the crate:
//!
//! - [`ThreadTimers`]: a dedicated timer thread that hands due callbacks to a small pool of
//!   worker threads. Used by [`Runtime`](crate::Runtime) by default.
//! - [`ManualTimers`]: a virtual clock that only moves when told to, firing due callbacks
//!   on the caller's thread. Used for deterministic tests and simulations.
//!
//! [`binding`] turns a facility timer into an owned [`TimerHandle`] bound to exactly one
//! pending wait.

pub mod binding;
pub mod deadline;
pub mod manual;
pub(crate) mod queue;
pub mod thread;

pub use binding::TimerHandle;
pub use deadline::Deadline;
pub use manual::ManualTimers;
pub use thread::{ThreadTimers, TimerConfig};

use crate::error::TimerError;
use crate::utils::slab::Key;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Callback a facility invokes when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a timer inside its facility.
///
/// Identifiers are generational: once a timer is closed its identifier never designates
/// another timer, even if the facility reuses the storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) Key);

/// Platform timer facility the suspension machinery is built on.
///
/// Implementations must uphold the following:
///
/// - A callback is invoked at most once, and never from inside
///   [`create_timer`](Self::create_timer), [`set_timer`](Self::set_timer) or
///   [`close_timer`](Self::close_timer).
/// - After [`close_timer`](Self::close_timer) returns, a callback that has not been handed
///   out yet is dropped without being invoked.
/// - Deadlines already in the past fire as soon as possible.
pub trait TimerFacility: Send + Sync {
    /// Current time on the facility's clock.
    fn now(&self) -> Instant;

    /// Allocates a timer that will invoke `callback` once armed and due.
    fn create_timer(&self, callback: TimerCallback) -> Result<TimerId, TimerError>;

    /// Arms (or re-arms) a timer. Unknown or closed identifiers are ignored.
    fn set_timer(&self, id: TimerId, deadline: Deadline);

    /// Cancels any pending fire and releases the timer. Idempotent.
    fn close_timer(&self, id: TimerId);

    /// Lifetime counters of this facility.
    fn counts(&self) -> TimerCounts;
}

/// Snapshot of a facility's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerCounts {
    pub created: u64,
    pub armed: u64,
    pub fired: u64,
    pub released: u64,
    pub live: usize,
}

#[derive(Default)]
pub(crate) struct TimerStats {
    created: AtomicU64,
    armed: AtomicU64,
    fired: AtomicU64,
    released: AtomicU64,
}

impl TimerStats {
    pub(crate) fn created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn armed(&self) {
        self.armed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fired(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, live: usize) -> TimerCounts {
        TimerCounts {
            created: self.created.load(Ordering::Relaxed),
            armed: self.armed.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            live,
        }
    }
}
