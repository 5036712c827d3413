//! Staging list for tasks spawned while the scheduler is running.
//!
//! Tasks created from inside another task's resumption (the accept loop
//! spawning a connection handler, for instance) are not pushed straight into
//! the scheduler's live collection, which may be mid-iteration. They are
//! staged here and merged at the start of the next pass, before the poll set
//! is built.

use crate::task::{StartPolicy, Task, TaskId, TaskState};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

struct Staging {
    tasks: RefCell<Vec<Task>>,
    next_id: Cell<u64>,
    default_start: StartPolicy,
}

/// Handle for adding tasks to a scheduler.
///
/// Cheap to clone; drivers keep one to register the tasks they create.
/// Single-threaded by construction (`!Send`).
#[derive(Clone)]
pub struct Spawner {
    staging: Rc<Staging>,
}

impl Spawner {
    pub(crate) fn new(default_start: StartPolicy) -> Self {
        Self {
            staging: Rc::new(Staging {
                tasks: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                default_start,
            }),
        }
    }

    /// Spawns `future` with the scheduler's default start policy.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawn_with(self.staging.default_start, future)
    }

    /// Spawns `future` with an explicit start policy.
    ///
    /// An eager task runs its first slice before this returns; if that slice
    /// already finishes the body, the task is never staged.
    pub fn spawn_with<F>(&self, policy: StartPolicy, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = TaskId(self.staging.next_id.get());
        self.staging.next_id.set(id.0 + 1);

        let mut task = Task::new(id, future);
        if policy == StartPolicy::Eager {
            task.resume();
        }

        tracing::debug!(task = %id, ?policy, state = ?task.state(), "task spawned");

        if !task.is_done() {
            self.staging.tasks.borrow_mut().push(task);
        }

        id
    }

    /// Number of tasks waiting to be merged into the live collection.
    pub fn staged(&self) -> usize {
        self.staging.tasks.borrow().len()
    }

    pub(crate) fn staged_states(&self) -> Vec<(TaskId, TaskState)> {
        self.staging
            .tasks
            .borrow()
            .iter()
            .map(|task| (task.id(), task.state()))
            .collect()
    }

    /// Moves staged tasks into `live`, returning how many were merged.
    pub(crate) fn drain_into(&self, live: &mut Vec<Task>) -> usize {
        let staged = std::mem::take(&mut *self.staging.tasks.borrow_mut());
        let merged = staged.len();

        live.extend(staged);

        merged
    }

    /// Drops every staged task.
    ///
    /// Staged tasks may hold a clone of this spawner, so the list has to be
    /// emptied explicitly to release them.
    pub(crate) fn clear(&self) {
        let staged = std::mem::take(&mut *self.staging.tasks.borrow_mut());
        drop(staged);
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("staged", &self.staged())
            .field("default_start", &self.staging.default_start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::runtime::yield_now;

    #[test]
    fn ids_are_unique_and_increasing() {
        let spawner = Spawner::new(StartPolicy::Lazy);
        let first = spawner.spawn(async {});
        let second = spawner.spawn(async {});

        assert!(first < second);
        assert_eq!(spawner.staged(), 2);
    }

    #[test]
    fn eager_task_that_finishes_is_never_staged() {
        let spawner = Spawner::new(StartPolicy::Lazy);
        spawner.spawn_with(StartPolicy::Eager, async {});

        assert_eq!(spawner.staged(), 0);
    }

    #[test]
    fn eager_task_is_staged_in_its_suspended_state() {
        let spawner = Spawner::new(StartPolicy::Eager);
        spawner.spawn(async {
            yield_now().await;
        });

        let mut live = Vec::new();
        assert_eq!(spawner.drain_into(&mut live), 1);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].state(), TaskState::Parked);
        assert_eq!(spawner.staged(), 0);
    }

    #[test]
    fn lazy_task_is_staged_unstarted() {
        let spawner = Spawner::new(StartPolicy::Lazy);
        spawner.spawn(async {});

        let mut live = Vec::new();
        spawner.drain_into(&mut live);
        assert_eq!(live[0].state(), TaskState::Runnable);
    }
}
