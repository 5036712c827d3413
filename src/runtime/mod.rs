//! Scheduler subsystem modules.

pub(crate) mod context;
mod core;
pub(crate) mod queue;
pub(crate) mod waker;
mod yield_now;

pub use core::{RunSummary, Scheduler};
pub use queue::Spawner;
pub use yield_now::{YieldNow, yield_now};
