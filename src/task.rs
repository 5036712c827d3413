//! Resumable computations driven by the scheduler.
//!
//! A [`Task`] wraps a future whose body is ordinary sequential code: connect,
//! then write, then read, in a loop. Each `.await` on a socket operation is a
//! potential suspension point. When the operation would block it records a
//! [`Readiness`] for the task and the future returns `Pending`; the scheduler
//! resumes the task once the OS reports that exact condition.
//!
//! # Lifecycle
//!
//! 1. A task is created bound to its body, in [`TaskState::Runnable`]
//! 2. Each resumption polls the body until it suspends or returns
//! 3. A suspended task is [`TaskState::Waiting`] on exactly one condition
//!    (or [`TaskState::Parked`] if it yielded without one)
//! 4. A task whose body returned is [`TaskState::Done`]; its future, and every
//!    socket the body still owned, is dropped right away
//!
//! # Start policy
//!
//! [`StartPolicy::Eager`] runs the first slice of the body inside `spawn`;
//! [`StartPolicy::Lazy`] leaves that to the scheduler's next pass.
//!
//! ```no_run
//! use sockrun::{Scheduler, StartPolicy, TcpStream};
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.spawn_with(StartPolicy::Eager, async {
//!     if let Ok(stream) = TcpStream::connect("localhost", 8080).await {
//!         let _ = stream.write_all(b"\x01x").await;
//!     }
//! });
//! scheduler.run().unwrap();
//! ```

use crate::reactor::event::Readiness;
use crate::runtime::context::enter_task;
use crate::runtime::waker::{TaskWaker, make_waker};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// When a freshly spawned task runs its first slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartPolicy {
    /// Resume once immediately, inside the call that spawns the task.
    Eager,
    /// Wait for the scheduler's next pass.
    #[default]
    Lazy,
}

/// Identifier handed out by the spawner, unique per scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Observable state of a task between resumptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Not started yet.
    Runnable,
    /// Suspended until the OS reports the condition.
    Waiting(Readiness),
    /// Suspended without a condition; runnable again once its waker fires.
    Parked,
    /// Body returned; no resources held.
    Done,
}

/// A resumable computation owned by the scheduler.
pub struct Task {
    id: TaskId,
    future: Option<Pin<Box<dyn Future<Output = ()>>>>,
    state: TaskState,
    waker: Arc<TaskWaker>,
}

impl Task {
    pub(crate) fn new<F>(id: TaskId, future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self {
            id,
            future: Some(Box::pin(future)),
            state: TaskState::Runnable,
            waker: TaskWaker::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The condition this task waits on, `None` unless it is [`TaskState::Waiting`].
    pub fn readiness(&self) -> Option<Readiness> {
        match self.state {
            TaskState::Waiting(readiness) => Some(readiness),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }

    /// True when the scheduler should resume this task without consulting the OS.
    pub(crate) fn is_runnable(&self) -> bool {
        match self.state {
            TaskState::Runnable => true,
            TaskState::Parked => self.waker.is_notified(),
            TaskState::Waiting(_) | TaskState::Done => false,
        }
    }

    /// Runs the body until its next suspension point or until it returns.
    pub(crate) fn resume(&mut self) -> TaskState {
        let Some(future) = self.future.as_mut() else {
            return TaskState::Done;
        };

        self.waker.clear();
        let waker = make_waker(self.waker.clone());
        let mut context = Context::from_waker(&waker);

        let (poll, registered) = enter_task(|| future.as_mut().poll(&mut context));

        self.state = match (poll, registered) {
            (Poll::Ready(()), _) => {
                // Drops the body's locals, closing any socket it still owns.
                self.future = None;
                TaskState::Done
            }
            (Poll::Pending, Some(readiness)) => TaskState::Waiting(readiness),
            (Poll::Pending, None) => TaskState::Parked,
        };

        tracing::trace!(task = %self.id, state = ?self.state, "task resumed");

        self.state
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
