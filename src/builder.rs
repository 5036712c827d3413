//! Fluent configuration for [`Scheduler`].
//!
//! # Example
//!
//! ```
//! use sockrun::{SchedulerBuilder, StartPolicy};
//!
//! let scheduler = SchedulerBuilder::new()
//!     .poll_capacity(128)
//!     .default_start(StartPolicy::Eager)
//!     .build();
//! assert_eq!(scheduler.live_tasks(), 0);
//! ```

use crate::runtime::Scheduler;
use crate::task::StartPolicy;

const DEFAULT_POLL_CAPACITY: usize = 64;

/// Builder for [`Scheduler`] instances.
#[derive(Clone, Debug)]
pub struct SchedulerBuilder {
    poll_capacity: usize,
    default_start: StartPolicy,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            poll_capacity: DEFAULT_POLL_CAPACITY,
            default_start: StartPolicy::default(),
        }
    }

    /// Pre-allocates room for this many simultaneously waiting tasks.
    pub fn poll_capacity(mut self, capacity: usize) -> Self {
        self.poll_capacity = capacity;
        self
    }

    /// Start policy used by [`Scheduler::spawn`] and [`Spawner::spawn`](crate::Spawner::spawn).
    pub fn default_start(mut self, policy: StartPolicy) -> Self {
        self.default_start = policy;
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler::with_config(self.poll_capacity, self.default_start)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
