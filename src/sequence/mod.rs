//! Lazy asynchronous sequences.
//!
//! An [`AsyncSequence`] is pulled one element at a time: each advance is itself a
//! suspension, and the element it produced stays readable through
//! [`current`](AsyncSequence::current) until the next advance. [`AsyncSequenceExt`] layers
//! the cursor-based iteration protocol on top.
//!
//! Two sequences ship with the crate:
//!
//! - [`Periodic`]: timer-driven ticks, created by
//!   [`Timers::schedule_periodically`](crate::time::Timers::schedule_periodically).
//! - [`PushSequence`]: the pull side of a [`channel`], fed by a push source such as an
//!   [`Observable`](crate::bridge::Observable).

pub mod channel;
pub mod cursor;
pub mod periodic;

pub use channel::{PushSender, PushSequence, channel};
pub use cursor::{Advance, AsyncSequenceExt, Begin, Cursor, Values};
pub use periodic::Periodic;

use crate::error::Error;

use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Lifecycle of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceState {
    /// Created, never advanced. No timer exists yet.
    NotStarted,
    /// Waiting for the next element, or idle between advances.
    Suspended,
    /// Running the work function for the current element.
    Producing,
    /// Ended on its own, by exhaustion or by an error.
    Completed,
    /// Cancelled while producing; closes once the work returns.
    Cancelling,
    /// Cancelled. All resources are released.
    Closed,
}

impl SequenceState {
    /// Whether the sequence will never produce another element.
    pub fn is_terminal(self) -> bool {
        matches!(self, SequenceState::Completed | SequenceState::Closed)
    }
}

/// A pull-based sequence whose advance is asynchronous.
pub trait AsyncSequence {
    type Item;

    /// Moves to the next element.
    ///
    /// Resolves to `Ok(true)` when a new element is available through
    /// [`current`](Self::current), `Ok(false)` once when the sequence ended, and to an error
    /// when producing the element failed, which also ends the sequence. Advancing again
    /// after the end was reported yields [`Error::UseAfterEnd`].
    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, Error>>;

    /// Element produced by the last successful advance.
    fn current(&self) -> Option<&Self::Item>;

    /// Handle that cancels this sequence from any thread.
    fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::detached()
    }
}

impl<S: AsyncSequence + ?Sized> AsyncSequence for Box<S> {
    type Item = S::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, Error>> {
        (**self).poll_advance(cx)
    }

    fn current(&self) -> Option<&Self::Item> {
        (**self).current()
    }

    fn cancel_handle(&self) -> CancelHandle {
        (**self).cancel_handle()
    }
}

/// Target of a [`CancelHandle`].
pub trait Cancel: Send + Sync {
    /// Cancels the target. Must be idempotent.
    fn cancel(&self);
}

/// Cancels a sequence without owning it.
///
/// The handle does not keep the sequence alive; cancelling after it was dropped does
/// nothing.
#[derive(Clone, Default)]
pub struct CancelHandle {
    target: Option<Weak<dyn Cancel>>,
}

impl CancelHandle {
    pub fn new<C: Cancel + 'static>(target: &Arc<C>) -> Self {
        let target: Weak<dyn Cancel> = Arc::downgrade(target) as Weak<dyn Cancel>;

        Self {
            target: Some(target),
        }
    }

    /// Handle that cancels nothing.
    pub fn detached() -> Self {
        Self { target: None }
    }

    pub fn cancel(&self) {
        if let Some(target) = self.target.as_ref().and_then(Weak::upgrade) {
            target.cancel();
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("attached", &self.target.is_some())
            .finish()
    }
}
