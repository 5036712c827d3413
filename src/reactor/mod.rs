//! Readiness-driven I/O building blocks.
//!
//! - [`event`]: interests, readiness conditions and the `poll(2)` wrapper
//! - [`socket`]: owned non-blocking socket descriptors
//! - [`future`]: read/write futures and the bare readiness wait

pub mod event;
pub mod future;
pub mod socket;
