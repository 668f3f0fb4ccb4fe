//! Thread-local runtime context.
//!
//! While [`Runtime::block_on`](crate::Runtime::block_on) runs, the current thread knows
//! the runtime's task queue and timers. This is what lets [`Task::spawn`](crate::Task::spawn)
//! and the free functions of [`time`](crate::time) work without an explicit handle.
//!
//! Contexts nest: the previous one is restored when the inner one exits, including by
//! unwinding.

use crate::runtime::queue::TaskQueue;
use crate::time::Timers;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    pub(crate) static CURRENT_QUEUE: RefCell<Option<Arc<TaskQueue>>> = const { RefCell::new(None) };

    pub(crate) static CURRENT_TIMERS: RefCell<Option<Timers>> = const { RefCell::new(None) };
}

struct Restore {
    queue: Option<Arc<TaskQueue>>,
    timers: Option<Timers>,
}

impl Drop for Restore {
    fn drop(&mut self) {
        CURRENT_QUEUE.with(|current| *current.borrow_mut() = self.queue.take());
        CURRENT_TIMERS.with(|current| *current.borrow_mut() = self.timers.take());
    }
}

/// Runs `function` with `queue` and `timers` installed as the current context.
pub(crate) fn enter_context<F, R>(queue: Arc<TaskQueue>, timers: Timers, function: F) -> R
where
    F: FnOnce() -> R,
{
    let _restore = Restore {
        queue: CURRENT_QUEUE.with(|current| current.borrow_mut().replace(queue)),
        timers: CURRENT_TIMERS.with(|current| current.borrow_mut().replace(timers)),
    };

    function()
}

pub(crate) fn current_queue() -> Option<Arc<TaskQueue>> {
    CURRENT_QUEUE.with(|current| current.borrow().clone())
}

pub(crate) fn current_timers() -> Option<Timers> {
    CURRENT_TIMERS.with(|current| current.borrow().clone())
}
