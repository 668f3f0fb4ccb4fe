//! Periodic tick, the suspension behind every periodic sequence.

use super::Timers;
use super::resume::ResumeToken;
use super::suspend::Awaitable;
use crate::error::Error;
use crate::timer::{Deadline, TimerHandle};

use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) type TickWork<T> = Box<dyn FnMut(i64) -> Result<T, Error> + Send + 'static>;

/// Waits for the next tick of a fixed schedule and runs the per-tick work.
///
/// Tick `n` is due at `initial + period * n`. A tick whose deadline already passed is
/// armed to fire as soon as possible; ticks are never skipped.
pub struct PeriodicTick<T> {
    initial: Instant,
    period: Duration,
    tick: i64,
    work: TickWork<T>,
}

impl<T> PeriodicTick<T> {
    pub(crate) fn new(initial: Instant, period: Duration, work: TickWork<T>) -> Self {
        Self {
            initial,
            period,
            tick: 0,
            work,
        }
    }

    /// Index of the next tick to be produced.
    pub fn tick(&self) -> i64 {
        self.tick
    }

    pub fn next_deadline(&self) -> Deadline {
        Deadline::for_tick(self.initial, self.period, self.tick)
    }
}

impl<T> Awaitable for PeriodicTick<T> {
    type Output = T;

    fn ready(&self, _now: Instant) -> bool {
        false
    }

    fn suspend(&mut self, timers: &Timers, token: ResumeToken) -> Result<TimerHandle, Error> {
        let deadline = self.next_deadline();

        if deadline.is_elapsed(timers.now()) {
            debug!(tick = self.tick, "tick already due, firing as soon as possible");
        }

        timers.arm(deadline, token)
    }

    /// Runs the work for the current tick. The counter moves on even if the work fails.
    fn resume(&mut self) -> Result<T, Error> {
        let tick = self.tick;
        self.tick += 1;

        (self.work)(tick)
    }
}

impl<T> fmt::Debug for PeriodicTick<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTick")
            .field("initial", &self.initial)
            .field("period", &self.period)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
