//! One-shot scheduled work.

use super::Timers;
use super::resume::ResumeToken;
use super::suspend::Awaitable;
use crate::error::Error;
use crate::timer::{Deadline, TimerHandle};

use std::fmt;
use std::time::Instant;

pub(crate) type OnceWork<T> = Box<dyn FnOnce() -> Result<T, Error> + Send + 'static>;

/// Runs a work function once an instant is reached and yields its result.
///
/// If the instant has already passed when first polled, the work runs synchronously.
pub struct Schedule<T> {
    at: Instant,
    work: Option<OnceWork<T>>,
}

impl<T> Schedule<T> {
    pub(crate) fn new(at: Instant, work: OnceWork<T>) -> Self {
        Self {
            at,
            work: Some(work),
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}

impl<T> Awaitable for Schedule<T> {
    type Output = T;

    fn ready(&self, now: Instant) -> bool {
        now >= self.at
    }

    fn suspend(&mut self, timers: &Timers, token: ResumeToken) -> Result<TimerHandle, Error> {
        timers.arm(Deadline::at(self.at), token)
    }

    fn resume(&mut self) -> Result<T, Error> {
        let work = self.work.take().ok_or(Error::UseAfterEnd)?;

        work()
    }
}

impl<T> fmt::Debug for Schedule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("at", &self.at)
            .field("pending", &self.work.is_some())
            .finish()
    }
}
