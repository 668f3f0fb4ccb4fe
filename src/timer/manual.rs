//! Virtual-clock timer facility.
//!
//! Time only moves when [`ManualTimers::advance`] is called, and due callbacks fire on the
//! caller's thread in deadline order. This makes timing behavior reproducible in tests and
//! simulations, at nanosecond resolution.

use super::queue::TimerQueue;
use super::{Deadline, TimerCallback, TimerCounts, TimerFacility, TimerId, TimerStats};
use crate::error::TimerError;

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

struct State {
    queue: TimerQueue,
    failures: usize,
    max_timers: Option<usize>,
}

/// Timer facility driven by a manually advanced clock.
pub struct ManualTimers {
    base: Instant,
    // Nanoseconds elapsed since `base`.
    offset: AtomicU64,
    state: Mutex<State>,
    stats: TimerStats,
}

impl ManualTimers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// Facility that refuses to hold more than `limit` timers at once.
    pub fn with_capacity(limit: usize) -> Arc<Self> {
        Arc::new(Self::build(Some(limit)))
    }

    fn build(max_timers: Option<usize>) -> Self {
        Self {
            base: Instant::now(),
            offset: AtomicU64::new(0),
            state: Mutex::new(State {
                queue: TimerQueue::new(),
                failures: 0,
                max_timers,
            }),
            stats: TimerStats::default(),
        }
    }

    /// Time elapsed on the virtual clock.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset.load(Ordering::Acquire))
    }

    /// Moves the clock forward and fires every timer that became due.
    ///
    /// Returns the number of callbacks invoked.
    pub fn advance(&self, by: Duration) -> usize {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset.fetch_add(nanos, Ordering::AcqRel);

        self.fire_due()
    }

    /// Fires timers due at the current virtual time without moving the clock.
    pub fn fire_due(&self) -> usize {
        let due = self.state.lock().queue.pop_due(self.now());
        let fired = due.len();

        for callback in due {
            self.stats.fired();
            callback();
        }

        if fired > 0 {
            trace!(fired, elapsed = ?self.elapsed(), "manual timers fired");
        }

        fired
    }

    /// Makes the next [`create_timer`](TimerFacility::create_timer) call fail.
    pub fn fail_next_create(&self) {
        self.state.lock().failures += 1;
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().queue.next_deadline()
    }

    /// Number of timers armed and not yet fired.
    pub fn armed(&self) -> usize {
        self.state.lock().queue.armed()
    }
}

impl TimerFacility for ManualTimers {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn create_timer(&self, callback: TimerCallback) -> Result<TimerId, TimerError> {
        let mut state = self.state.lock();

        if state.failures > 0 {
            state.failures -= 1;
            return Err(TimerError::Exhausted {
                limit: state.queue.len(),
            });
        }

        if let Some(limit) = state.max_timers
            && state.queue.len() >= limit
        {
            return Err(TimerError::Exhausted { limit });
        }

        let id = state.queue.insert(callback);
        self.stats.created();

        Ok(id)
    }

    fn set_timer(&self, id: TimerId, deadline: Deadline) {
        let at = deadline.resolve(self.now());

        if self.state.lock().queue.arm(id, at) {
            self.stats.armed();
        }
    }

    fn close_timer(&self, id: TimerId) {
        if self.state.lock().queue.remove(id) {
            self.stats.released();
        }
    }

    fn counts(&self) -> TimerCounts {
        let live = self.state.lock().queue.len();
        self.stats.snapshot(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    #[test]
    fn clock_starts_at_zero_and_advances() {
        let timers = ManualTimers::new();
        let start = timers.now();

        timers.advance(Duration::from_millis(500));
        timers.advance(Duration::from_millis(250));

        assert_eq!(timers.elapsed(), Duration::from_millis(750));
        assert_eq!(timers.now() - start, Duration::from_millis(750));
    }

    #[test]
    fn fires_only_when_clock_reaches_deadline() {
        let timers = ManualTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let id = timers
            .create_timer(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        timers.set_timer(id, Deadline::after(Duration::from_secs(2)));

        assert_eq!(timers.advance(Duration::from_millis(1999)), 0);
        assert_eq!(timers.armed(), 1);
        assert_eq!(timers.advance(Duration::from_millis(1)), 1);
        assert_eq!(timers.advance(Duration::from_secs(10)), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn injected_failure_applies_once() {
        let timers = ManualTimers::new();
        timers.fail_next_create();

        assert!(timers.create_timer(Box::new(|| {})).is_err());
        assert!(timers.create_timer(Box::new(|| {})).is_ok());
        assert_eq!(timers.counts().created, 1);
    }

    #[test]
    fn capacity_counts_unreleased_timers() {
        let timers = ManualTimers::with_capacity(1);
        let id = timers.create_timer(Box::new(|| {})).unwrap();

        assert!(matches!(
            timers.create_timer(Box::new(|| {})),
            Err(TimerError::Exhausted { limit: 1 })
        ));

        timers.close_timer(id);
        assert!(timers.create_timer(Box::new(|| {})).is_ok());
    }
}
