//! One-shot delay.

use super::Timers;
use super::resume::ResumeToken;
use super::suspend::Awaitable;
use crate::error::Error;
use crate::timer::{Deadline, TimerHandle};

use std::time::{Duration, Instant};

/// Waits for a duration or until an instant, producing `()`.
///
/// A zero duration, or an instant already reached, completes without arming a timer.
#[derive(Clone, Copy, Debug)]
pub struct Delay {
    deadline: Deadline,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Deadline::after(duration),
        }
    }

    pub fn until(at: Instant) -> Self {
        Self {
            deadline: Deadline::at(at),
        }
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}

impl Awaitable for Delay {
    type Output = ();

    fn ready(&self, now: Instant) -> bool {
        self.deadline.is_elapsed(now)
    }

    fn suspend(&mut self, timers: &Timers, token: ResumeToken) -> Result<TimerHandle, Error> {
        timers.arm(self.deadline, token)
    }

    fn resume(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
