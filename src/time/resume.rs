//! Single-assignment completion used to resume a suspended computation.
//!
//! A [`ResumeSlot`] belongs to the suspended side. Each suspension draws one
//! [`ResumeToken`] from it and hands the token to a timer callback. The token is consumed
//! when invoked, and the slot only accepts the token of the suspension currently armed, so a
//! suspension is resumed at most once and a late callback from a released timer is ignored.
//!
//! Tokens refer to their slot weakly: a callback firing after its suspension was destroyed
//! touches nothing.

use futures::task::AtomicWaker;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::task::Waker;
use tracing::trace;

struct SlotState {
    generation: u64,
    armed: Option<u64>,
    fired: bool,
}

pub(crate) struct ResumeSlot {
    state: Mutex<SlotState>,
    waker: AtomicWaker,
}

impl ResumeSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState {
                generation: 0,
                armed: None,
                fired: false,
            }),
            waker: AtomicWaker::new(),
        })
    }

    /// Issues the token for a new suspension, invalidating any previous one.
    pub(crate) fn token(self: &Arc<Self>) -> ResumeToken {
        let mut state = self.state.lock();
        state.generation += 1;
        state.armed = Some(state.generation);
        state.fired = false;

        ResumeToken {
            slot: Arc::downgrade(self),
            generation: state.generation,
        }
    }

    /// Consumes a completed resume, if there is one.
    pub(crate) fn take_fired(&self) -> bool {
        std::mem::take(&mut self.state.lock().fired)
    }

    /// Invalidates the outstanding token without resuming.
    pub(crate) fn revoke(&self) {
        let mut state = self.state.lock();
        state.armed = None;
        state.fired = false;
    }

    pub(crate) fn register(&self, waker: &Waker) {
        self.waker.register(waker);
    }

    pub(crate) fn wake(&self) {
        self.waker.wake();
    }
}

/// Capability to resume one suspended computation.
///
/// Invoking it consumes it; only the token of the currently armed suspension has any effect.
pub struct ResumeToken {
    slot: Weak<ResumeSlot>,
    generation: u64,
}

impl ResumeToken {
    pub fn resume(self) {
        let Some(slot) = self.slot.upgrade() else {
            trace!(generation = self.generation, "resume after suspension was dropped");
            return;
        };

        {
            let mut state = slot.state.lock();
            if state.armed != Some(self.generation) {
                trace!(generation = self.generation, "stale resume ignored");
                return;
            }
            state.armed = None;
            state.fired = true;
        }

        slot.wake();
    }
}

impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeToken")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
