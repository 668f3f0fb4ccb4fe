//! Thread-backed timer facility.
//!
//! A single timer thread sleeps on a condition variable until the earliest deadline, then
//! hands every due callback to a pool of worker threads over a channel. Callbacks therefore
//! always run off the thread that armed them, like a platform thread-pool timer.

use super::queue::TimerQueue;
use super::{Deadline, TimerCallback, TimerCounts, TimerFacility, TimerId, TimerStats};
use crate::error::TimerError;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, trace};

/// Settings for [`ThreadTimers`].
#[derive(Clone, Debug)]
pub struct TimerConfig {
    /// Threads invoking fired callbacks. Zero runs callbacks on the timer thread itself.
    pub worker_threads: usize,
    /// Upper bound on simultaneously allocated timers.
    pub max_timers: usize,
    /// Name of the timer thread; workers get a `-worker-N` suffix.
    pub thread_name: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_timers: 65_536,
            thread_name: "tickflow-timer".to_string(),
        }
    }
}

struct State {
    queue: TimerQueue,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    stats: TimerStats,
    max_timers: usize,
}

enum Dispatch {
    Inline,
    Pool(Sender<TimerCallback>),
}

impl Dispatch {
    fn run(&self, callback: TimerCallback) {
        match self {
            Dispatch::Inline => callback(),
            Dispatch::Pool(sender) => {
                // Workers only disconnect during shutdown, when dropping is correct.
                let _ = sender.send(callback);
            }
        }
    }
}

/// Timer facility backed by a dedicated timer thread and a worker pool.
///
/// Dropping the facility stops its threads; timers that have not fired by then are
/// discarded without invoking their callbacks.
pub struct ThreadTimers {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadTimers {
    /// Starts a facility with [`TimerConfig::default`].
    pub fn new() -> Result<Arc<Self>, TimerError> {
        Self::with_config(TimerConfig::default())
    }

    /// Starts the timer thread and its workers.
    pub fn with_config(config: TimerConfig) -> Result<Arc<Self>, TimerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: TimerQueue::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            stats: TimerStats::default(),
            max_timers: config.max_timers,
        });

        let mut threads = Vec::with_capacity(config.worker_threads + 1);

        let dispatch = if config.worker_threads == 0 {
            Dispatch::Inline
        } else {
            let (sender, receiver) = channel::unbounded();

            for n in 0..config.worker_threads {
                let receiver = receiver.clone();
                let handle = thread::Builder::new()
                    .name(format!("{}-worker-{n}", config.thread_name))
                    .spawn(move || run_worker(receiver))?;
                threads.push(handle);
            }

            Dispatch::Pool(sender)
        };

        let driver = shared.clone();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_driver(driver, dispatch))?;
        threads.push(handle);

        debug!(
            workers = config.worker_threads,
            max_timers = config.max_timers,
            "timer thread started"
        );

        Ok(Arc::new(Self {
            shared,
            threads: Mutex::new(threads),
        }))
    }
}

impl TimerFacility for ThreadTimers {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn create_timer(&self, callback: TimerCallback) -> Result<TimerId, TimerError> {
        let mut state = self.shared.state.lock();

        if state.shutdown {
            return Err(TimerError::ShutDown);
        }

        if state.queue.len() >= self.shared.max_timers {
            return Err(TimerError::Exhausted {
                limit: self.shared.max_timers,
            });
        }

        let id = state.queue.insert(callback);
        self.shared.stats.created();

        Ok(id)
    }

    fn set_timer(&self, id: TimerId, deadline: Deadline) {
        let mut state = self.shared.state.lock();
        let at = deadline.resolve(Instant::now());

        if state.queue.arm(id, at) {
            self.shared.stats.armed();
            self.shared.wakeup.notify_one();
        }
    }

    fn close_timer(&self, id: TimerId) {
        if self.shared.state.lock().queue.remove(id) {
            self.shared.stats.released();
        }
    }

    fn counts(&self) -> TimerCounts {
        let live = self.shared.state.lock().queue.len();
        self.shared.stats.snapshot(live)
    }
}

impl Drop for ThreadTimers {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wakeup.notify_all();

        let current = thread::current().id();
        for handle in self.threads.get_mut().drain(..) {
            // The last reference can be released by a callback running on a worker.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

fn run_driver(shared: Arc<Shared>, dispatch: Dispatch) {
    let mut state = shared.state.lock();

    loop {
        if state.shutdown {
            break;
        }

        let due = state.queue.pop_due(Instant::now());
        if !due.is_empty() {
            trace!(count = due.len(), "dispatching fired timers");
            MutexGuard::unlocked(&mut state, || {
                for callback in due {
                    shared.stats.fired();
                    dispatch.run(callback);
                }
            });
            continue;
        }

        match state.queue.next_deadline() {
            Some(at) => {
                shared.wakeup.wait_until(&mut state, at);
            }
            None => shared.wakeup.wait(&mut state),
        }
    }

    let dropped = state.queue.clear();
    debug!(dropped, "timer thread stopped");
}

fn run_worker(receiver: Receiver<TimerCallback>) {
    for callback in receiver.iter() {
        callback();
    }
}
