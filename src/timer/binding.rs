//! Binding of one facility timer to one pending wait.
//!
//! [`arm`] allocates a timer whose only effect is to complete a [`ResumeToken`], and
//! returns the owned [`TimerHandle`]. The handle disarms and releases the timer when it is
//! released explicitly or dropped, whichever comes first, so every exit path of the owning
//! suspension point gives the platform resource back exactly once.

use super::{Deadline, TimerFacility, TimerId};
use crate::error::TimerError;
use crate::time::resume::ResumeToken;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Arms a timer that completes `token` at `deadline`.
///
/// The timer may fire before this function returns; the token tolerates that.
pub fn arm(
    facility: &Arc<dyn TimerFacility>,
    deadline: Deadline,
    token: ResumeToken,
) -> Result<TimerHandle, TimerError> {
    let id = facility
        .create_timer(Box::new(move || token.resume()))
        .inspect_err(|error| warn!(%error, "timer creation failed"))?;

    facility.set_timer(id, deadline);
    debug!(?id, ?deadline, "timer armed");

    Ok(TimerHandle {
        facility: facility.clone(),
        id: Some(id),
    })
}

/// Owned platform timer bound to a single suspension.
pub struct TimerHandle {
    facility: Arc<dyn TimerFacility>,
    id: Option<TimerId>,
}

impl TimerHandle {
    pub fn id(&self) -> Option<TimerId> {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    /// Cancels a pending fire and releases the timer. Idempotent, and safe after the timer
    /// already fired: the resume token is never invoked again.
    pub fn disarm_and_release(&mut self) {
        if let Some(id) = self.id.take() {
            self.facility.close_timer(id);
            trace!(?id, "timer released");
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.disarm_and_release();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").field("id", &self.id).finish()
    }
}
