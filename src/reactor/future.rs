//! Read, write and bare-readiness futures over non-blocking sockets.
//!
//! Every future here follows the same two-phase shape:
//!
//! - **Attempt**: the first poll tries the system call once. A result, an
//!   orderly shutdown (`Ok(0)`) or a hard error completes the future right away.
//! - **Suspend**: only would-block defers. The future records a
//!   [`Readiness`] for the running task and returns `Poll::Pending`; it does
//!   not retry on its own.
//!
//! When the scheduler resumes the task after the OS reported readiness, the
//! next poll repeats the attempt and produces the final result.
//!
//! # Examples
//!
//! ```no_run
//! use sockrun::Socket;
//!
//! # async fn echo_once(socket: Socket) -> sockrun::Result<()> {
//! let mut buffer = [0u8; 64];
//! let read = socket.read(&mut buffer).await?;
//! socket.write(&buffer[..read]).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::reactor::event::{Interest, Readiness, is_would_block};
use crate::reactor::socket::Socket;
use crate::runtime::context::register_readiness;

use std::future::Future;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Maps one attempt of a non-blocking call onto the future's output.
///
/// Interrupted calls are retried on the spot; would-block registers
/// `readiness` and suspends.
fn attempt<T>(
    readiness: Readiness,
    mut operation: impl FnMut() -> io::Result<T>,
    on_error: impl FnOnce(io::Error) -> Error,
) -> Poll<Result<T>> {
    loop {
        match operation() {
            Ok(value) => return Poll::Ready(Ok(value)),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) if is_would_block(&error) => {
                return match register_readiness(readiness) {
                    Ok(()) => Poll::Pending,
                    Err(error) => Poll::Ready(Err(error)),
                };
            }
            Err(error) => return Poll::Ready(Err(on_error(error))),
        }
    }
}

pub(crate) fn attempt_io<T>(
    readiness: Readiness,
    operation: impl FnMut() -> io::Result<T>,
) -> Poll<Result<T>> {
    attempt(readiness, operation, Error::Transfer)
}

/// Future that reads once from a non-blocking socket.
///
/// Created by [`Socket::read`]. Resolves to the number of bytes read,
/// `Ok(0)` once the peer has shut down its side.
pub struct ReadFuture<'a> {
    socket: &'a Socket,
    buffer: &'a mut [u8],
}

impl<'a> ReadFuture<'a> {
    pub(crate) fn new(socket: &'a Socket, buffer: &'a mut [u8]) -> Self {
        Self { socket, buffer }
    }
}

impl Future for ReadFuture<'_> {
    type Output = Result<usize>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let readiness = Readiness::readable(this.socket.as_raw_fd());

        attempt_io(readiness, || this.socket.try_read(&mut *this.buffer))
    }
}

/// Future that writes once to a non-blocking socket.
///
/// Created by [`Socket::write`]. Resolves to the number of bytes accepted by
/// the kernel, which may be fewer than requested.
pub struct WriteFuture<'a> {
    socket: &'a Socket,
    buffer: &'a [u8],
}

impl<'a> WriteFuture<'a> {
    pub(crate) fn new(socket: &'a Socket, buffer: &'a [u8]) -> Self {
        Self { socket, buffer }
    }
}

impl Future for WriteFuture<'_> {
    type Output = Result<usize>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let readiness = Readiness::writable(this.socket.as_raw_fd());

        attempt_io(readiness, || this.socket.try_write(this.buffer))
    }
}

/// Suspends the current task once until `fd` reports `interest`.
///
/// Useful for descriptors the crate does not wrap. The descriptor must stay
/// open until the future completes.
pub fn wait_for(fd: RawFd, interest: Interest) -> WaitFor {
    WaitFor {
        readiness: Readiness { fd, interest },
        suspended: false,
    }
}

/// Future returned by [`wait_for`].
#[derive(Debug)]
pub struct WaitFor {
    readiness: Readiness,
    suspended: bool,
}

impl Future for WaitFor {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.suspended {
            return Poll::Ready(Ok(()));
        }

        register_readiness(self.readiness)?;
        self.suspended = true;

        Poll::Pending
    }
}
