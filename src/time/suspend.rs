//! The suspend/resume protocol shared by every timer-driven wait.
//!
//! An [`Awaitable`] describes one kind of wait through three steps: `ready` decides whether
//! the wait can be skipped, `suspend` arms a timer that will complete a resume token, and
//! `resume` produces the result once the timer fired. [`Suspension`] drives those steps as a
//! [`Future`], releasing the timer before `resume` runs and on every early exit.

use super::Timers;
use super::resume::{ResumeSlot, ResumeToken};
use crate::error::Error;
use crate::timer::TimerHandle;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

/// One kind of timer-driven suspension.
pub trait Awaitable {
    type Output;

    /// Whether the wait is already over at `now`, in which case no timer is armed.
    fn ready(&self, now: Instant) -> bool;

    /// Arms a timer that invokes `token` when the wait is over.
    fn suspend(&mut self, timers: &Timers, token: ResumeToken) -> Result<TimerHandle, Error>;

    /// Produces the result of the wait. Called once, after the timer was released.
    fn resume(&mut self) -> Result<Self::Output, Error>;
}

enum Stage {
    Idle,
    Suspended(TimerHandle),
    Done,
}

/// Future driving one [`Awaitable`] to completion.
///
/// Dropping a pending suspension disarms and releases its timer. Polling it again after it
/// completed yields [`Error::UseAfterEnd`].
#[must_use = "suspensions do nothing unless awaited"]
pub struct Suspension<A> {
    awaitable: A,
    timers: Timers,
    slot: Arc<ResumeSlot>,
    stage: Stage,
}

// No field is structurally pinned.
impl<A> Unpin for Suspension<A> {}

impl<A: Awaitable> Suspension<A> {
    pub(crate) fn new(timers: Timers, awaitable: A) -> Self {
        Self {
            awaitable,
            timers,
            slot: ResumeSlot::new(),
            stage: Stage::Idle,
        }
    }

    pub fn awaitable(&self) -> &A {
        &self.awaitable
    }

    /// Whether a timer is currently armed for this suspension.
    pub fn is_suspended(&self) -> bool {
        matches!(self.stage, Stage::Suspended(_))
    }
}

impl<A: Awaitable> Future for Suspension<A> {
    type Output = Result<A::Output, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        match this.stage {
            Stage::Idle => {
                if this.awaitable.ready(this.timers.now()) {
                    this.stage = Stage::Done;
                    return Poll::Ready(this.awaitable.resume());
                }

                this.slot.register(cx.waker());
                let token = this.slot.token();

                match this.awaitable.suspend(&this.timers, token) {
                    Ok(handle) => this.stage = Stage::Suspended(handle),
                    Err(error) => {
                        this.slot.revoke();
                        this.stage = Stage::Done;
                        return Poll::Ready(Err(error));
                    }
                }

                // The timer may have fired before `suspend` returned.
                if !this.slot.take_fired() {
                    return Poll::Pending;
                }
            }
            Stage::Suspended(_) => {
                this.slot.register(cx.waker());

                if !this.slot.take_fired() {
                    return Poll::Pending;
                }
            }
            Stage::Done => return Poll::Ready(Err(Error::UseAfterEnd)),
        }

        if let Stage::Suspended(mut handle) = std::mem::replace(&mut this.stage, Stage::Done) {
            handle.disarm_and_release();
        }

        Poll::Ready(this.awaitable.resume())
    }
}

impl<A> fmt::Debug for Suspension<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match &self.stage {
            Stage::Idle => "idle",
            Stage::Suspended(_) => "suspended",
            Stage::Done => "done",
        };

        f.debug_struct("Suspension").field("stage", &stage).finish_non_exhaustive()
    }
}
