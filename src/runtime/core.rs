//! Single-threaded readiness scheduler.
//!
//! The scheduler owns every live task and is the only place in the crate that
//! blocks on the operating system. One pass of [`Scheduler::run`]:
//!
//! 1. Merges tasks staged by the [`Spawner`] since the previous pass
//! 2. Builds a poll set with one entry per waiting task
//! 3. Blocks in `poll(2)` until at least one entry is ready (or returns at
//!    once when some task can run without waiting)
//! 4. Resumes every ready task exactly once
//! 5. Drops tasks that finished, closing the sockets they owned
//!
//! The loop returns when no live task remains.

use crate::builder::SchedulerBuilder;
use crate::error::{Error, Result};
use crate::reactor::event::PollSet;
use crate::runtime::queue::Spawner;
use crate::task::{StartPolicy, Task, TaskId, TaskState};

use std::future::Future;

/// Counters describing one call to [`Scheduler::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Loop iterations, one per poll-set build.
    pub passes: u64,
    /// Task resumptions performed by the loop (eager first slices excluded).
    pub resumptions: u64,
    /// Tasks retired after finishing.
    pub completed: u64,
}

/// Owns live tasks and resumes them as the OS reports readiness.
pub struct Scheduler {
    tasks: Vec<Task>,
    spawner: Spawner,
    poll_set: PollSet,
}

impl Scheduler {
    /// Creates a scheduler with default settings.
    ///
    /// # Example
    /// ```
    /// let mut scheduler = sockrun::Scheduler::new();
    /// scheduler.spawn(async {});
    /// assert_eq!(scheduler.run().unwrap().completed, 1);
    /// ```
    pub fn new() -> Self {
        SchedulerBuilder::new().build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn with_config(poll_capacity: usize, default_start: StartPolicy) -> Self {
        Self {
            tasks: Vec::with_capacity(poll_capacity),
            spawner: Spawner::new(default_start),
            poll_set: PollSet::with_capacity(poll_capacity),
        }
    }

    /// Returns a handle that adds tasks to this scheduler, usable from inside running tasks.
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    /// Spawns a task with the default start policy.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn(future)
    }

    /// Spawns a task with an explicit start policy.
    pub fn spawn_with<F>(&self, policy: StartPolicy, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn_with(policy, future)
    }

    /// Live tasks, including those staged but not yet merged.
    pub fn live_tasks(&self) -> usize {
        self.tasks.len() + self.spawner.staged()
    }

    /// Current state of every live task: merged ones first, then staged ones.
    pub fn task_states(&self) -> Vec<(TaskId, TaskState)> {
        let mut states: Vec<_> = self
            .tasks
            .iter()
            .map(|task| (task.id(), task.state()))
            .collect();
        states.extend(self.spawner.staged_states());
        states
    }

    /// Runs until every task has finished.
    ///
    /// # Errors
    /// - [`Error::Poll`] if the readiness wait itself fails
    /// - [`Error::Stalled`] if live tasks remain but none waits on a condition
    ///   or was woken, since blocking would then never return
    ///
    /// A failure inside a task never ends the loop; the task simply finishes.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut ready = Vec::new();
        let mut waiting = Vec::new();

        loop {
            self.spawner.drain_into(&mut self.tasks);

            if self.tasks.is_empty() {
                tracing::debug!(?summary, "scheduler finished");
                return Ok(summary);
            }

            summary.passes += 1;
            self.poll_set.clear();
            ready.clear();
            waiting.clear();

            for (index, task) in self.tasks.iter().enumerate() {
                if let Some(readiness) = task.readiness() {
                    waiting.push((index, self.poll_set.push(readiness)));
                } else if task.is_runnable() {
                    ready.push(index);
                }
            }

            if ready.is_empty() && waiting.is_empty() {
                return Err(Error::Stalled {
                    tasks: self.tasks.len(),
                });
            }

            if !waiting.is_empty() {
                let block = ready.is_empty();
                tracing::trace!(entries = self.poll_set.len(), block, "waiting for readiness");

                self.poll_set.wait(block)?;

                ready.extend(
                    waiting
                        .iter()
                        .filter(|(_, entry)| self.poll_set.is_ready(*entry))
                        .map(|(index, _)| *index),
                );
            }

            for &index in &ready {
                self.tasks[index].resume();
                summary.resumptions += 1;
            }

            let before = self.tasks.len();
            self.tasks.retain(|task| !task.is_done());
            summary.completed += (before - self.tasks.len()) as u64;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.spawner.clear();
    }
}
