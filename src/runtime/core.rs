//! Async runtime that executes futures and manages task scheduling.
//!
//! The runtime drives a main future via `block_on` and runs spawned tasks on the same
//! thread. Timer callbacks fire on the timer facility's threads; all they do is wake a
//! task, which pushes it onto the queue and unparks the runtime thread. Sequence work
//! functions therefore always run on the runtime thread, during a poll.

use crate::builder::RuntimeBuilder;
use crate::error::Error;
use crate::runtime::waker::MainWaker;
use crate::runtime::{Executor, TaskQueue, enter_context};
use crate::task::{JoinHandle, Task};
use crate::time::Timers;

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;
use tracing::{debug, trace};

/// Executor passes run after the main future completes.
const FINAL_PASSES: usize = 16;

/// Main async runtime for executing futures.
///
/// Owns the task queue, the executor and the [`Timers`] every suspension point created
/// inside [`block_on`](Self::block_on) uses.
///
/// Dropping the runtime drops every task that has not completed, which releases the
/// timers their pending suspensions hold.
pub struct Runtime {
    queue: Arc<TaskQueue>,
    executor: Executor,
    timers: Timers,
}

impl Runtime {
    /// Creates a runtime backed by a default [`ThreadTimers`](crate::timer::ThreadTimers).
    ///
    /// # Errors
    /// Fails if the timer threads cannot be started.
    ///
    /// # Example
    /// ```ignore
    /// let mut rt = Runtime::new()?;
    /// ```
    pub fn new() -> Result<Self, Error> {
        RuntimeBuilder::new().build()
    }

    /// Returns a [`RuntimeBuilder`] to configure the timers before building.
    ///
    /// # Example
    /// ```ignore
    /// let rt = Runtime::builder().timer_worker_threads(1).build()?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn with_timers(timers: Timers) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let executor = Executor::new(queue.clone());

        Self {
            queue,
            executor,
            timers,
        }
    }

    /// Timers every suspension point created inside this runtime uses.
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Spawns a background task, to be run by the next `block_on`.
    ///
    /// # Arguments
    /// * `future` - The future to run as a background task
    ///
    /// # Returns
    /// A [`JoinHandle`] resolving to the future's output
    ///
    /// # Example
    /// ```ignore
    /// let handle = rt.spawn(async { 6 * 7 });
    /// assert_eq!(rt.block_on(handle), 42);
    /// ```
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Task::spawn_on(&self.queue, future)
    }

    /// Blocks until the given future completes, running spawned tasks along the way.
    ///
    /// Establishes the runtime context, so [`Task::spawn`] and the free functions of
    /// [`time`](crate::time) work inside `future`. When neither the main future nor any
    /// task can make progress, the thread parks until a waker fires. Once the main future
    /// completes, tasks that are still runnable get a bounded number of passes.
    ///
    /// # Arguments
    /// * `future` - The future to execute and wait for completion
    ///
    /// # Returns
    /// The output value of the completed future
    ///
    /// # Example
    /// ```ignore
    /// let value = rt.block_on(async {
    ///     time::sleep_for(Duration::from_millis(10)).await?;
    ///     Ok::<_, Error>(42)
    /// })?;
    /// ```
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        let thread = thread::current();
        self.queue.attach(thread.clone());

        let main = MainWaker::new(thread);
        let waker = Waker::from(main.clone());
        let executor = &self.executor;
        let queue = &self.queue;

        enter_context(self.queue.clone(), self.timers.clone(), || {
            let mut future = pin!(future);
            let mut cx = Context::from_waker(&waker);

            loop {
                if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                    // Give runnable tasks a bounded number of passes; a task that keeps
                    // rescheduling itself must not hold the caller forever.
                    for _ in 0..FINAL_PASSES {
                        if executor.run() == 0 {
                            break;
                        }
                    }
                    return value;
                }

                let ran = executor.run();

                if main.take_notified() || !queue.is_empty() {
                    continue;
                }

                trace!(ran, "runtime idle, parking");
                thread::park();
            }
        })
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.queue.shutdown();
        debug!("runtime shut down");
    }
}
