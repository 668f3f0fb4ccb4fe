//! Wakers used by the runtime.
//!
//! - [`task_waker`]: re-schedules a spawned task on its queue when woken.
//! - [`MainWaker`]: flags the future passed to `block_on` as ready and unparks the thread
//!   blocked in it.
//!
//! Both may be woken from any thread.

use crate::task::Runnable;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Wake, Waker};
use std::thread::Thread;

struct TaskWaker {
    task: Arc<dyn Runnable>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.task.clone().schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.task.clone().schedule();
    }
}

/// Creates a Waker that re-queues `task` when called.
pub(crate) fn task_waker(task: Arc<dyn Runnable>) -> Waker {
    Waker::from(Arc::new(TaskWaker { task }))
}

/// Waker of the main future driven by `block_on`.
pub(crate) struct MainWaker {
    notified: AtomicBool,
    thread: Thread,
}

impl MainWaker {
    pub(crate) fn new(thread: Thread) -> Arc<Self> {
        Arc::new(Self {
            notified: AtomicBool::new(false),
            thread,
        })
    }

    /// Returns whether a wake arrived since the last call.
    pub(crate) fn take_notified(&self) -> bool {
        self.notified.swap(false, Ordering::AcqRel)
    }
}

impl Wake for MainWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.thread.unpark();
    }
}
