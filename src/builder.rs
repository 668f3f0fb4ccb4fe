//! Fluent builder for Runtime construction.
//!
//! # Example
//! ```ignore
//! let mut rt = RuntimeBuilder::new()
//!     .timer_worker_threads(1)
//!     .thread_name("sensor-timer")
//!     .build()?;
//! ```

use crate::error::Error;
use crate::runtime::Runtime;
use crate::time::Timers;
use crate::timer::{ThreadTimers, TimerConfig, TimerFacility};

use std::sync::Arc;
use tracing::debug;

/// Builder for [`Runtime`] instances.
///
/// By default the runtime starts its own [`ThreadTimers`] configured from the builder.
/// Supplying a facility with [`timer_facility`](Self::timer_facility) skips that and the
/// thread settings are ignored.
pub struct RuntimeBuilder {
    config: TimerConfig,
    facility: Option<Arc<dyn TimerFacility>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    /// Creates a builder with the default [`TimerConfig`].
    ///
    /// # Example
    /// ```ignore
    /// let builder = RuntimeBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            config: TimerConfig::default(),
            facility: None,
        }
    }

    /// Threads running fired timer callbacks. Zero runs them on the timer thread.
    ///
    /// # Arguments
    /// * `threads` - Number of callback worker threads
    pub fn timer_worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    /// Maximum number of timers alive at once; further creations fail.
    pub fn max_timers(mut self, limit: usize) -> Self {
        self.config.max_timers = limit;
        self
    }

    /// Name given to the timer thread; workers get a numeric suffix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Uses `facility` instead of starting timer threads.
    ///
    /// # Example
    /// ```ignore
    /// let manual = ManualTimers::new();
    /// let rt = RuntimeBuilder::new().timer_facility(manual.clone()).build()?;
    /// ```
    pub fn timer_facility<F>(mut self, facility: Arc<F>) -> Self
    where
        F: TimerFacility + 'static,
    {
        self.facility = Some(facility);
        self
    }

    /// Builds the runtime, consuming the builder.
    ///
    /// # Returns
    /// A runtime whose [`Timers`] use the supplied facility, or freshly started
    /// [`ThreadTimers`] otherwise
    ///
    /// # Errors
    /// Returns [`Error::TimerCreation`] if the timer threads cannot be started.
    pub fn build(self) -> Result<Runtime, Error> {
        let facility: Arc<dyn TimerFacility> = match self.facility {
            Some(facility) => facility,
            None => {
                debug!(config = ?self.config, "starting timer threads");
                ThreadTimers::with_config(self.config)?
            }
        };

        Ok(Runtime::with_timers(Timers::new(facility)))
    }
}
