//! Thread-safe task queue for managing ready tasks.
//!
//! Wakes can arrive from any thread, typically a timer worker completing a resume token.
//! They are turned into messages on this queue, which is consumed by the single thread
//! running [`Runtime::block_on`](crate::Runtime::block_on). Pushing unparks that thread.

use crate::task::Runnable;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::Thread;

/// A thread-safe, FIFO queue of tasks ready to be polled.
pub(crate) struct TaskQueue {
    ready: Mutex<VecDeque<Arc<dyn Runnable>>>,
    // Every task spawned on this queue, so shutdown can drop suspended ones too.
    spawned: Mutex<Registry>,
    owner: Mutex<Option<Thread>>,
    shutdown: AtomicBool,
}

struct Registry {
    tasks: Vec<Weak<dyn Runnable>>,
    prune_at: usize,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            spawned: Mutex::new(Registry {
                tasks: Vec::new(),
                prune_at: 64,
            }),
            owner: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Makes `thread` the one unparked when work arrives.
    pub(crate) fn attach(&self, thread: Thread) {
        *self.owner.lock() = Some(thread);
    }

    /// Records a freshly spawned task.
    pub(crate) fn register(&self, task: &Arc<dyn Runnable>) {
        let mut registry = self.spawned.lock();

        if registry.tasks.len() >= registry.prune_at {
            registry.tasks.retain(|task| task.strong_count() > 0);
            registry.prune_at = (registry.tasks.len() * 2).max(64);
        }

        registry.tasks.push(Arc::downgrade(task));
    }

    /// Enqueues a task and wakes the consuming thread.
    ///
    /// After shutdown the task is dropped instead.
    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        if self.is_shutdown() {
            return;
        }

        self.ready.lock().push_back(task);

        if let Some(owner) = self.owner.lock().as_ref() {
            owner.unpark();
        }
    }

    pub(crate) fn pop(&self) -> Option<Arc<dyn Runnable>> {
        self.ready.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.ready.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ready.lock().is_empty()
    }

    /// Stops accepting tasks and drops the futures of every task still alive.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let ready: Vec<_> = self.ready.lock().drain(..).collect();
        drop(ready);

        let spawned = std::mem::take(&mut self.spawned.lock().tasks);
        for task in spawned.iter().filter_map(Weak::upgrade) {
            task.shutdown();
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
