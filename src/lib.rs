//! Minimal cooperative scheduler for non-blocking socket I/O.
//!
//! Sequential-looking socket logic (connect, then write, then read, in a loop)
//! runs as tasks over non-blocking sockets, without a thread per connection.
//!
//! # Architecture
//!
//! - **Socket**: owned non-blocking descriptor, closed exactly once on drop
//! - **Async operations**: connect, read, write and accept futures; each tries
//!   its system call once and only suspends on would-block
//! - **Task**: a resumable computation holding at most one readiness condition
//! - **Scheduler**: owns live tasks, blocks in `poll(2)` until some condition
//!   holds, resumes those tasks and retires finished ones
//! - **Drivers**: the echo client and server built on the above
//!
//! Everything runs on one thread. The scheduler's readiness wait is the only
//! blocking call; there are no timers, so an operation can wait forever if
//! its peer never becomes ready.
//!
//! # Example
//!
//! ```no_run
//! use sockrun::{Scheduler, StartPolicy, TcpListener};
//! use sockrun::drivers::server::accept_loop;
//!
//! let listener = TcpListener::bind("0.0.0.0:7000".parse().unwrap(), 50).unwrap();
//! let mut scheduler = Scheduler::new();
//! let spawner = scheduler.spawner();
//! scheduler.spawn_with(StartPolicy::Eager, async move {
//!     accept_loop(listener, spawner, None).await;
//! });
//! scheduler.run().unwrap();
//! ```

mod builder;
pub mod drivers;
mod error;
pub mod logging;
pub mod net;
pub mod reactor;
pub mod runtime;
mod task;

pub use builder::SchedulerBuilder;
pub use error::{Error, Result};
pub use net::tcp_listener::TcpListener;
pub use net::tcp_stream::TcpStream;
pub use reactor::event::{Interest, Readiness};
pub use reactor::future::wait_for;
pub use reactor::socket::Socket;
pub use runtime::{RunSummary, Scheduler, Spawner, yield_now};
pub use task::{StartPolicy, Task, TaskId, TaskState};
