//! Task wrapper that combines futures with waker integration.
//!
//! A task owns a spawned future. Its waker re-queues it on the runtime that spawned it,
//! from whichever thread wakes it, and a task is queued at most once at a time no matter
//! how many wakes arrive while it waits.
//!
//! # Task Spawning
//!
//! ```ignore
//! use tickflow::Task;
//!
//! async fn spawn_example() {
//!     let handle = Task::spawn(async { 42 });
//!     assert_eq!(handle.await, 42);
//! }
//! ```
//!
//! # How Tasks Work
//!
//! 1. A future is wrapped in a [`Task`] and pushed on the runtime's task queue
//! 2. The executor polls it with a waker bound to the task
//! 3. When the future yields `Poll::Pending`, it is stored for later
//! 4. When a timer fires, the waker re-queues the task and unparks the runtime thread
//! 5. The task is polled again and can make progress

use crate::runtime::context::current_queue;
use crate::runtime::{TaskQueue, task_waker};

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A spawned task producing a `T`.
///
/// Tasks are created via [`Task::spawn`] or [`Runtime::spawn`](crate::Runtime::spawn)
/// and are only observed through their [`JoinHandle`].
pub struct Task<T> {
    future: Mutex<Option<BoxFuture<T>>>,
    result: Mutex<Option<T>>,
    queue: Arc<TaskQueue>,
    scheduled: AtomicBool,
    completed: AtomicBool,
    waiters: Mutex<Vec<Waker>>,
}

impl<T: Send + 'static> Task<T> {
    fn new<F>(future: F, queue: Arc<TaskQueue>) -> Arc<Self>
    where
        F: Future<Output = T> + Send + 'static,
    {
        Arc::new(Task {
            future: Mutex::new(Some(Box::pin(future))),
            result: Mutex::new(None),
            queue,
            scheduled: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
        })
    }

    /// Spawns a task on the current runtime context and returns its [`JoinHandle`].
    ///
    /// # Arguments
    /// * `future` - The future to run; it must be `Send` since timer wakes arrive from
    ///   other threads
    ///
    /// # Example
    /// ```ignore
    /// rt.block_on(async {
    ///     let handle = Task::spawn(async { 1 + 1 });
    ///     assert_eq!(handle.await, 2);
    /// });
    /// ```
    ///
    /// # Panics
    /// Panics if called outside of [`Runtime::block_on`](crate::Runtime::block_on).
    pub fn spawn<F>(future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let queue = current_queue().expect("Task::spawn() called outside of a runtime context");

        Self::spawn_on(&queue, future)
    }

    pub(crate) fn spawn_on<F>(queue: &Arc<TaskQueue>, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let task = Task::new(future, queue.clone());
        let runnable: Arc<dyn Runnable> = task.clone();

        queue.register(&runnable);
        runnable.schedule();

        JoinHandle { task }
    }

    /// Polls the task's future once.
    fn poll(self: &Arc<Self>) {
        // Cleared before polling so a wake during the poll queues the task again.
        self.scheduled.store(false, Ordering::Release);

        let waker = task_waker(self.clone());
        let mut context = Context::from_waker(&waker);

        let mut slot = self.future.lock();
        let Some(mut future) = slot.take() else {
            return;
        };

        match future.as_mut().poll(&mut context) {
            Poll::Pending => *slot = Some(future),
            Poll::Ready(value) => {
                drop(slot);
                drop(future);
                *self.result.lock() = Some(value);

                let waiters = {
                    let mut waiters = self.waiters.lock();
                    self.completed.store(true, Ordering::Release);
                    std::mem::take(&mut *waiters)
                };

                for waiter in waiters {
                    waiter.wake();
                }
            }
        }
    }
}

/// Object-safe view of a task used by the queue, the executor and wakers.
pub(crate) trait Runnable: Send + Sync {
    /// Polls the task once.
    fn run(self: Arc<Self>);

    /// Queues the task unless it is already queued or finished.
    fn schedule(self: Arc<Self>);

    /// Drops the task's future without completing it.
    fn shutdown(&self);
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        Task::poll(&self);
    }

    fn schedule(self: Arc<Self>) {
        if self.completed.load(Ordering::Acquire) || self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let queue = self.queue.clone();
        queue.push(self);
    }

    fn shutdown(&self) {
        let future = self.future.lock().take();
        drop(future);
    }
}

/// A future that resolves to the output of a spawned task.
///
/// Dropping the handle detaches the task; it keeps running.
pub struct JoinHandle<T> {
    task: Arc<Task<T>>,
}

impl<T> JoinHandle<T> {
    /// Whether the task completed; awaiting the handle then resolves immediately.
    pub fn is_finished(&self) -> bool {
        self.task.completed.load(Ordering::Acquire)
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut waiters = self.task.waiters.lock();

        if self.task.completed.load(Ordering::Acquire) {
            drop(waiters);
            let result = self
                .task
                .result
                .lock()
                .take()
                .expect("JoinHandle polled after completion");

            return Poll::Ready(result);
        }

        if !waiters.iter().any(|waiter| waiter.will_wake(cx.waker())) {
            waiters.push(cx.waker().clone());
        }

        Poll::Pending
    }
}
