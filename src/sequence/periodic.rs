//! Timer-driven periodic sequence.
//!
//! Each advance arms one timer for the next tick, waits for it, releases it and only then
//! runs the per-tick work on the consumer's poll. At most one timer is alive per sequence,
//! and none is alive once the sequence ended, was cancelled or was dropped.

use super::{AsyncSequence, Cancel, CancelHandle, SequenceState};
use crate::error::Error;
use crate::time::resume::ResumeSlot;
use crate::time::{Awaitable, PeriodicTick, Timers};
use crate::timer::TimerHandle;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

struct Core {
    state: SequenceState,
    timer: Option<TimerHandle>,
}

// Part of the sequence reachable from cancel handles on other threads.
struct Shared {
    core: Mutex<Core>,
    slot: Arc<ResumeSlot>,
}

impl Cancel for Shared {
    fn cancel(&self) {
        let timer = {
            let mut core = self.core.lock();

            match core.state {
                SequenceState::NotStarted | SequenceState::Suspended => {
                    core.state = SequenceState::Closed;
                    self.slot.revoke();
                    core.timer.take()
                }
                SequenceState::Producing => {
                    core.state = SequenceState::Cancelling;
                    None
                }
                SequenceState::Completed | SequenceState::Cancelling | SequenceState::Closed => {
                    return;
                }
            }
        };

        if let Some(mut timer) = timer {
            timer.disarm_and_release();
        }

        debug!("periodic sequence cancelled");
        self.slot.wake();
    }
}

/// Lazy sequence of values produced by a work function on a fixed tick schedule.
///
/// Created by [`Timers::schedule_periodically`]. The sequence never ends on its own; it
/// ends when the work fails, and is closed by [`cancel`](Self::cancel) or by dropping it.
pub struct Periodic<T> {
    timers: Timers,
    tick: PeriodicTick<T>,
    current: Option<T>,
    shared: Arc<Shared>,
    end_reported: bool,
}

// No field is structurally pinned.
impl<T> Unpin for Periodic<T> {}

impl<T> Periodic<T> {
    pub(crate) fn new(timers: Timers, tick: PeriodicTick<T>) -> Self {
        Self {
            timers,
            tick,
            current: None,
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    state: SequenceState::NotStarted,
                    timer: None,
                }),
                slot: ResumeSlot::new(),
            }),
            end_reported: false,
        }
    }

    pub fn state(&self) -> SequenceState {
        self.shared.core.lock().state
    }

    /// Index of the next tick to be produced.
    pub fn tick(&self) -> i64 {
        self.tick.tick()
    }

    /// Whether a timer is currently armed for the next tick.
    pub fn is_armed(&self) -> bool {
        self.shared.core.lock().timer.is_some()
    }

    /// Stops the sequence and releases its timer. Idempotent.
    ///
    /// A pending advance resolves to the end of the sequence. If the work function is
    /// running, the value it returns is discarded.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    fn finish(&mut self) -> Result<bool, Error> {
        self.current = None;

        if std::mem::replace(&mut self.end_reported, true) {
            Err(Error::UseAfterEnd)
        } else {
            Ok(false)
        }
    }
}

impl<T> AsyncSequence for Periodic<T> {
    type Item = T;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, Error>> {
        let shared = self.shared.clone();
        let mut core = shared.core.lock();

        match core.state {
            SequenceState::NotStarted | SequenceState::Suspended => {}
            SequenceState::Producing | SequenceState::Cancelling => {
                core.state = SequenceState::Closed;
                drop(core);
                return Poll::Ready(self.finish());
            }
            SequenceState::Completed | SequenceState::Closed => {
                drop(core);
                return Poll::Ready(self.finish());
            }
        }

        shared.slot.register(cx.waker());

        if core.timer.is_none() {
            let token = shared.slot.token();

            match self.tick.suspend(&self.timers, token) {
                Ok(timer) => {
                    core.timer = Some(timer);
                    core.state = SequenceState::Suspended;
                }
                Err(error) => {
                    shared.slot.revoke();
                    core.state = SequenceState::Completed;
                    drop(core);
                    self.current = None;
                    self.end_reported = true;
                    return Poll::Ready(Err(error));
                }
            }
        }

        if !shared.slot.take_fired() {
            return Poll::Pending;
        }

        if let Some(mut timer) = core.timer.take() {
            timer.disarm_and_release();
        }
        core.state = SequenceState::Producing;
        drop(core);

        self.current = None;
        let tick = self.tick.tick();
        let result = self.tick.resume();

        let mut core = shared.core.lock();

        if core.state == SequenceState::Cancelling {
            core.state = SequenceState::Closed;
            drop(core);
            debug!(tick, "value produced after cancellation discarded");
            return Poll::Ready(self.finish());
        }

        match result {
            Ok(value) => {
                core.state = SequenceState::Suspended;
                self.current = Some(value);
                debug!(tick, "tick produced");
                Poll::Ready(Ok(true))
            }
            Err(error) => {
                core.state = SequenceState::Completed;
                self.end_reported = true;
                debug!(tick, %error, "tick failed, sequence completed");
                Poll::Ready(Err(error))
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(&self.shared)
    }
}

impl<T> Drop for Periodic<T> {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

impl<T> fmt::Debug for Periodic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Periodic")
            .field("tick", &self.tick)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
