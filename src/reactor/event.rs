use crate::error::{Error, Result};

use libc::{F_GETFL, F_SETFL, O_NONBLOCK, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, fcntl, pollfd};
use std::io;
use std::os::unix::io::RawFd;

/// The direction of readiness a suspended operation needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Data (or a pending connection) can be taken from the socket.
    Readable,
    /// The socket accepts more outgoing data, or a pending connect has finished.
    Writable,
}

impl Interest {
    pub(crate) fn poll_events(self) -> i16 {
        match self {
            Interest::Readable => POLLIN,
            Interest::Writable => POLLOUT,
        }
    }
}

/// What the OS must report before a suspended task may continue.
///
/// A task holds at most one of these at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Readiness {
    pub fd: RawFd,
    pub interest: Interest,
}

impl Readiness {
    pub fn readable(fd: RawFd) -> Self {
        Self {
            fd,
            interest: Interest::Readable,
        }
    }

    pub fn writable(fd: RawFd) -> Self {
        Self {
            fd,
            interest: Interest::Writable,
        }
    }
}

// Conditions that always wake a waiter, whatever it registered for.
const FAILURE_EVENTS: i16 = POLLERR | POLLHUP | POLLNVAL;

/// One batch of descriptors handed to `poll(2)`.
///
/// Entries keep their insertion order, so the index returned by [`PollSet::push`]
/// identifies the same entry after [`PollSet::wait`].
pub(crate) struct PollSet {
    entries: Vec<pollfd>,
}

impl PollSet {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, readiness: Readiness) -> usize {
        self.entries.push(pollfd {
            fd: readiness.fd,
            events: readiness.interest.poll_events(),
            revents: 0,
        });

        self.entries.len() - 1
    }

    /// Blocks until at least one entry is ready, or returns at once when `block` is false.
    ///
    /// Interrupted waits are retried.
    pub(crate) fn wait(&mut self, block: bool) -> Result<usize> {
        let timeout = if block { -1 } else { 0 };

        loop {
            let ready = unsafe {
                libc::poll(
                    self.entries.as_mut_ptr(),
                    self.entries.len() as libc::nfds_t,
                    timeout,
                )
            };

            if ready >= 0 {
                return Ok(ready as usize);
            }

            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Poll(error));
            }
        }
    }

    /// True when the entry saw its registered interest, or an error/hangup/invalid-handle report.
    pub(crate) fn is_ready(&self, index: usize) -> bool {
        let entry = &self.entries[index];

        entry.revents & (entry.events | FAILURE_EVENTS) != 0
    }
}

pub(crate) fn set_nonblocking(file_descriptor: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    if flags & O_NONBLOCK != 0 {
        return Ok(());
    }

    let result = unsafe { fcntl(file_descriptor, F_SETFL, flags | O_NONBLOCK) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// True for the transient "try again later" outcome of a non-blocking call.
pub(crate) fn is_would_block(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK)
}
