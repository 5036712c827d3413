//! Error type shared by the async socket operations, the scheduler and the drivers.

use crate::reactor::event::Readiness;

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while driving sockets through the scheduler.
///
/// Operation failures are handed back to the task that issued them; none of
/// these variants stop other tasks from running.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Address lookup for `host:port` failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Lookup succeeded but produced no candidate address.
    #[error("no usable address for {host}:{port}")]
    NoAddress { host: String, port: u16 },

    /// Creating or configuring a socket failed.
    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    /// The connection attempt was refused or failed while in progress.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// A read, write or accept failed with something other than would-block.
    #[error("transfer failed: {0}")]
    Transfer(#[source] io::Error),

    /// The peer echoed back different bytes than were sent.
    #[error("round trip mismatch at byte {offset} of {len}")]
    Mismatch { len: usize, offset: usize },

    /// Waiting on the OS readiness primitive failed.
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),

    /// Every live task is suspended without a readiness condition, so waiting would never return.
    #[error("{tasks} task(s) suspended without a readiness condition")]
    Stalled { tasks: usize },

    /// An operation tried to wait while its task already waits on another condition.
    #[error("task already waiting on {current:?}, cannot also wait on {requested:?}")]
    AlreadyWaiting {
        current: Readiness,
        requested: Readiness,
    },

    /// Driver configuration rejected before any socket was opened.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was polled outside of a scheduler-resumed task.
    #[error("async socket operation polled outside of a scheduler task")]
    NoTaskContext,
}

impl Error {
    /// Returns the OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Resolve { source, .. } => source.raw_os_error(),
            Error::Socket(err) | Error::Connect(err) | Error::Transfer(err) | Error::Poll(err) => {
                err.raw_os_error()
            }
            _ => None,
        }
    }

    pub(crate) fn last_socket() -> Self {
        Error::Socket(io::Error::last_os_error())
    }
}
