//! TCP listener for accepting incoming connections.
//!
//! # Usage
//!
//! ```no_run
//! use sockrun::{Scheduler, StartPolicy, TcpListener};
//!
//! let listener = TcpListener::bind("0.0.0.0:8080".parse().unwrap(), 50).unwrap();
//! let mut scheduler = Scheduler::new();
//! scheduler.spawn_with(StartPolicy::Eager, async move {
//!     while let Ok((stream, peer)) = listener.accept().await {
//!         println!("connection from {peer} on fd {:?}", stream.socket());
//!     }
//! });
//! scheduler.run().unwrap();
//! ```
use crate::error::{Error, Result};
use crate::net::future::AcceptFuture;
use crate::net::utils::{local_addr, socketaddr_to_storage};
use crate::reactor::socket::Socket;

use libc::{AF_INET, AF_INET6, SO_REUSEADDR, bind, c_int, listen, sockaddr};
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

/// A non-blocking listening socket.
///
/// Accepting never blocks the thread: when no connection is pending the
/// calling task suspends until the listener becomes readable.
#[derive(Debug)]
pub struct TcpListener {
    socket: Socket,
}

impl TcpListener {
    /// Binds a listener to `address` and starts listening.
    ///
    /// This method performs the following:
    /// 1. Creates a new non-blocking socket
    /// 2. Enables `SO_REUSEADDR`
    /// 3. Binds to the address
    /// 4. Starts listening with the given backlog
    ///
    /// # Arguments
    /// * `address` - Address to bind to; port `0` picks a free port
    /// * `backlog` - Maximum queue of not yet accepted connections
    pub fn bind(address: SocketAddr, backlog: u32) -> Result<Self> {
        let family = match address {
            SocketAddr::V4(_) => AF_INET,
            SocketAddr::V6(_) => AF_INET6,
        };

        let socket = Socket::stream(family)?;
        socket.set_option(SO_REUSEADDR, 1).map_err(Error::Socket)?;

        let (storage, length) = socketaddr_to_storage(&address);
        let result = unsafe {
            bind(
                socket.as_raw_fd(),
                &storage as *const _ as *const sockaddr,
                length,
            )
        };

        if result < 0 {
            return Err(Error::last_socket());
        }

        let backlog = backlog.min(c_int::MAX as u32) as c_int;
        if unsafe { listen(socket.as_raw_fd(), backlog) } < 0 {
            return Err(Error::last_socket());
        }

        tracing::debug!(%address, fd = socket.as_raw_fd(), backlog, "listening");

        Ok(Self { socket })
    }

    /// Accepts one incoming connection.
    ///
    /// # Returns
    /// The accepted stream (non-blocking) and the peer's address.
    pub fn accept(&self) -> AcceptFuture<'_> {
        AcceptFuture::new(&self.socket)
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        local_addr(self.socket.as_raw_fd())
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
