//! Drains ready tasks from the task queue.

use crate::runtime::TaskQueue;

use std::sync::Arc;

pub(crate) struct Executor {
    queue: Arc<TaskQueue>,
}

impl Executor {
    pub(crate) fn new(queue: Arc<TaskQueue>) -> Self {
        Self { queue }
    }

    /// Runs the tasks that are ready right now.
    ///
    /// Tasks re-queued while running wait for the next call, so a task that keeps waking
    /// itself cannot starve the main future. Returns the number of tasks run.
    pub(crate) fn run(&self) -> usize {
        let budget = self.queue.len();
        let mut ran = 0;

        while ran < budget {
            let Some(task) = self.queue.pop() else {
                break;
            };

            task.run();
            ran += 1;
        }

        ran
    }
}
