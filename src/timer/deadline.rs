//! Absolute and relative deadlines.

use std::time::{Duration, Instant};

// Fallback horizon when `now + duration` overflows the platform clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Point in time at which a suspended operation should resume.
///
/// A deadline is either an absolute [`Instant`] or a duration relative to the moment it is
/// handed to a timer facility. Deadlines in the past and zero durations are valid: they mean
/// "fire as soon as possible".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deadline {
    At(Instant),
    After(Duration),
}

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Deadline::At(instant)
    }

    pub fn after(duration: Duration) -> Self {
        Deadline::After(duration)
    }

    /// Deadline of the `tick`-th period counted from `initial`.
    ///
    /// Always computed from the origin, never from the previous fire time, so scheduling
    /// jitter in earlier ticks does not accumulate.
    pub fn for_tick(initial: Instant, period: Duration, tick: i64) -> Self {
        let offset = scale(period, tick.max(0) as u64).unwrap_or(FAR_FUTURE);

        Deadline::At(saturating_add(initial, offset))
    }

    /// Absolute instant this deadline designates when evaluated at `now`.
    pub fn resolve(self, now: Instant) -> Instant {
        match self {
            Deadline::At(instant) => instant,
            Deadline::After(duration) => saturating_add(now, duration),
        }
    }

    /// Time left until the deadline, clamped to zero for deadlines already passed.
    pub fn remaining(self, now: Instant) -> Duration {
        match self {
            Deadline::At(instant) => instant.saturating_duration_since(now),
            Deadline::After(duration) => duration,
        }
    }

    pub fn is_elapsed(self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }
}

fn scale(period: Duration, tick: u64) -> Option<Duration> {
    let nanos = period.as_nanos().checked_mul(u128::from(tick))?;
    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;

    Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

fn saturating_add(instant: Instant, duration: Duration) -> Instant {
    instant
        .checked_add(duration)
        .or_else(|| instant.checked_add(FAR_FUTURE))
        .unwrap_or(instant)
}
