//! Error types surfaced by timers, suspension points and sequences.
//!
//! Two layers exist:
//!
//! - [`TimerError`]: what a [`TimerFacility`](crate::timer::TimerFacility) reports when it
//!   cannot hand out a timer.
//! - [`Error`]: what a consumer observes through an awaited suspension point, an `advance`
//!   of a sequence, or a subscriber's `on_error`.
//!
//! Timer and work failures are terminal for the operation that hit them; they are never
//! swallowed and never reported out of band.

use thiserror::Error;

/// Boxed error produced by a user-supplied work function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of the timer facility itself.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer capacity exhausted ({limit} live timers)")]
    Exhausted { limit: usize },

    #[error("timer facility has shut down")]
    ShutDown,

    #[error("failed to start timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Error observed by the consumer of a suspension point or sequence.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform could not allocate or arm a timer for the pending wait.
    #[error("could not create timer: {0}")]
    TimerCreation(#[from] TimerError),

    /// The work function of a scheduled or periodic operation failed.
    #[error("work function failed: {0}")]
    WorkFunction(#[source] BoxError),

    /// A cursor or sequence was dereferenced or advanced past its end.
    #[error("sequence dereferenced or advanced past its end")]
    UseAfterEnd,

    /// A push source forwarded an error into a pull sequence.
    #[error("upstream sequence failed: {0}")]
    Upstream(String),
}

impl Error {
    /// Wraps a work function failure.
    pub fn work<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::WorkFunction(error.into())
    }

    /// Returns true if the error came from the timer facility.
    pub fn is_timer_creation(&self) -> bool {
        matches!(self, Error::TimerCreation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_error_keeps_source_message() {
        let error = Error::work("tick 2 exploded");

        assert!(matches!(error, Error::WorkFunction(_)));
        assert_eq!(error.to_string(), "work function failed: tick 2 exploded");
    }

    #[test]
    fn timer_error_converts_into_timer_creation() {
        let error: Error = TimerError::Exhausted { limit: 4 }.into();

        assert!(error.is_timer_creation());
        assert_eq!(
            error.to_string(),
            "could not create timer: timer capacity exhausted (4 live timers)"
        );
    }
}
