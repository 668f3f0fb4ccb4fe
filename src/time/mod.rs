//! Time utilities: delays, scheduled work and periodic sequences.
//!
//! Every operation here suspends on a timer of the [`Timers`] it was created from and never
//! blocks a thread. The free functions use the timers of the runtime entered on the current
//! thread; the methods on [`Timers`] work with any facility, including [`ManualTimers`].
//!
//! # Example: Sleep
//!
//! ```ignore
//! use tickflow::time::sleep_for;
//! use std::time::Duration;
//!
//! async fn wait() -> Result<(), tickflow::Error> {
//!     sleep_for(Duration::from_secs(2)).await
//! }
//! ```
//!
//! # Example: Periodic ticks
//!
//! ```ignore
//! use tickflow::AsyncSequenceExt;
//! use tickflow::time::interval;
//! use std::time::Duration;
//!
//! async fn count() -> Result<(), tickflow::Error> {
//!     let mut ticks = interval(Duration::from_secs(1));
//!     let mut cursor = ticks.begin().await?;
//!     while !cursor.is_at_end() {
//!         if *cursor.current_value()? >= 4 {
//!             break;
//!         }
//!         cursor.advance().await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`ManualTimers`]: crate::timer::ManualTimers

pub mod delay;
pub(crate) mod resume;
pub mod schedule;
pub mod suspend;
pub mod tick;

pub use delay::Delay;
pub use resume::ResumeToken;
pub use schedule::Schedule;
pub use suspend::{Awaitable, Suspension};
pub use tick::PeriodicTick;

use crate::error::{BoxError, Error};
use crate::runtime::context::current_timers;
use crate::sequence::Periodic;
use crate::timer::{Deadline, TimerFacility, TimerHandle, binding};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle to the timer facility suspension points are armed on.
///
/// Cheap to clone. Operations capture it when they are created, so the thread that
/// eventually resumes them does not matter.
#[derive(Clone)]
pub struct Timers {
    facility: Arc<dyn TimerFacility>,
}

impl Timers {
    pub fn new(facility: Arc<dyn TimerFacility>) -> Self {
        Self { facility }
    }

    /// Timers of the runtime entered on this thread.
    ///
    /// # Panics
    /// Panics if called outside of [`Runtime::block_on`](crate::Runtime::block_on).
    pub fn current() -> Self {
        Self::try_current().expect("no timers in current context; use Runtime::block_on")
    }

    pub fn try_current() -> Option<Self> {
        current_timers()
    }

    pub fn facility(&self) -> &Arc<dyn TimerFacility> {
        &self.facility
    }

    pub fn now(&self) -> Instant {
        self.facility.now()
    }

    /// Arms a timer completing `token` at `deadline`.
    pub fn arm(&self, deadline: Deadline, token: ResumeToken) -> Result<TimerHandle, Error> {
        Ok(binding::arm(&self.facility, deadline, token)?)
    }

    /// Suspends for `duration`. A zero duration completes immediately.
    pub fn sleep_for(&self, duration: Duration) -> Suspension<Delay> {
        Suspension::new(self.clone(), Delay::new(duration))
    }

    pub fn sleep_until(&self, at: Instant) -> Suspension<Delay> {
        Suspension::new(self.clone(), Delay::until(at))
    }

    /// Runs `work` at `at` and yields its result.
    pub fn schedule<T, F>(&self, at: Instant, work: F) -> Suspension<Schedule<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: 'static,
    {
        Suspension::new(self.clone(), Schedule::new(at, Box::new(move || Ok(work()))))
    }

    /// Like [`schedule`](Self::schedule) with a work function that can fail.
    pub fn try_schedule<T, E, F>(&self, at: Instant, work: F) -> Suspension<Schedule<T>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        Suspension::new(
            self.clone(),
            Schedule::new(at, Box::new(move || work().map_err(Error::work))),
        )
    }

    /// Lazy sequence producing `work(n)` at `initial + period * n` for `n = 0, 1, ...`.
    ///
    /// Nothing is armed until the sequence is first advanced.
    pub fn schedule_periodically<T, F>(
        &self,
        initial: Instant,
        period: Duration,
        mut work: F,
    ) -> Periodic<T>
    where
        F: FnMut(i64) -> T + Send + 'static,
        T: 'static,
    {
        Periodic::new(
            self.clone(),
            PeriodicTick::new(initial, period, Box::new(move |tick| Ok(work(tick)))),
        )
    }

    /// Like [`schedule_periodically`](Self::schedule_periodically) with a work function that
    /// can fail. A failure ends the sequence.
    pub fn try_schedule_periodically<T, E, F>(
        &self,
        initial: Instant,
        period: Duration,
        mut work: F,
    ) -> Periodic<T>
    where
        F: FnMut(i64) -> Result<T, E> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        Periodic::new(
            self.clone(),
            PeriodicTick::new(
                initial,
                period,
                Box::new(move |tick| work(tick).map_err(Error::work)),
            ),
        )
    }

    /// Sequence of tick indices, the first one due now.
    pub fn interval(&self, period: Duration) -> Periodic<i64> {
        self.schedule_periodically(self.now(), period, |tick| tick)
    }
}

impl<F: TimerFacility + 'static> From<Arc<F>> for Timers {
    fn from(facility: Arc<F>) -> Self {
        Self::new(facility)
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("counts", &self.facility.counts())
            .finish()
    }
}

/// Suspends for `duration` on the current runtime's timers.
///
/// # Panics
/// Panics if called outside of [`Runtime::block_on`](crate::Runtime::block_on).
pub fn sleep_for(duration: Duration) -> Suspension<Delay> {
    Timers::current().sleep_for(duration)
}

pub fn sleep_until(at: Instant) -> Suspension<Delay> {
    Timers::current().sleep_until(at)
}

/// Runs `work` at `at` on the current runtime's timers.
pub fn schedule<T, F>(at: Instant, work: F) -> Suspension<Schedule<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: 'static,
{
    Timers::current().schedule(at, work)
}

pub fn try_schedule<T, E, F>(at: Instant, work: F) -> Suspension<Schedule<T>>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: 'static,
    E: Into<BoxError> + 'static,
{
    Timers::current().try_schedule(at, work)
}

/// Periodic sequence on the current runtime's timers.
pub fn schedule_periodically<T, F>(initial: Instant, period: Duration, work: F) -> Periodic<T>
where
    F: FnMut(i64) -> T + Send + 'static,
    T: 'static,
{
    Timers::current().schedule_periodically(initial, period, work)
}

pub fn try_schedule_periodically<T, E, F>(
    initial: Instant,
    period: Duration,
    work: F,
) -> Periodic<T>
where
    F: FnMut(i64) -> Result<T, E> + Send + 'static,
    T: 'static,
    E: Into<BoxError> + 'static,
{
    Timers::current().try_schedule_periodically(initial, period, work)
}

pub fn interval(period: Duration) -> Periodic<i64> {
    Timers::current().interval(period)
}
