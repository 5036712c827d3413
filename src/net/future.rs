use crate::error::{Error, Result};
use crate::net::tcp_stream::TcpStream;
use crate::net::utils::{resolve_first, socketaddr_to_storage};
use crate::reactor::event::Readiness;
use crate::reactor::future::attempt_io;
use crate::reactor::socket::Socket;
use crate::runtime::context::register_readiness;

use libc::{AF_INET, AF_INET6, EINPROGRESS, EINTR, connect, sockaddr};
use std::future::Future;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future that accepts one pending connection on a listening socket.
///
/// The accepted socket is already in non-blocking mode.
pub struct AcceptFuture<'a> {
    listener: &'a Socket,
}

impl<'a> AcceptFuture<'a> {
    pub(crate) fn new(listener: &'a Socket) -> Self {
        Self { listener }
    }
}

impl Future for AcceptFuture<'_> {
    type Output = Result<(TcpStream, SocketAddr)>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let listener = self.listener;
        let readiness = Readiness::readable(listener.as_raw_fd());

        attempt_io(readiness, || listener.try_accept())
            .map_ok(|(socket, peer)| (TcpStream::from_socket(socket), peer))
    }
}

enum ConnectState {
    Start { host: String, port: u16 },
    Connecting { socket: Socket, address: SocketAddr },
    Finished,
}

/// Future that opens a TCP connection.
///
/// The first poll resolves the target, opens a non-blocking socket and issues
/// `connect`. Only "in progress" suspends the task (on writability); once
/// resumed, the outcome is read back from the socket's pending error.
pub struct ConnectFuture {
    state: ConnectState,
}

impl ConnectFuture {
    pub(crate) fn new(host: String, port: u16) -> Self {
        Self {
            state: ConnectState::Start { host, port },
        }
    }
}

fn start_connect(host: &str, port: u16) -> Result<(Socket, SocketAddr, bool)> {
    let address = resolve_first(host, port)?;
    let family = match address {
        SocketAddr::V4(_) => AF_INET,
        SocketAddr::V6(_) => AF_INET6,
    };

    let socket = Socket::stream(family)?;
    let (storage, length) = socketaddr_to_storage(&address);

    let result = unsafe {
        connect(
            socket.as_raw_fd(),
            &storage as *const _ as *const sockaddr,
            length,
        )
    };

    if result == 0 {
        return Ok((socket, address, true));
    }

    let error = io::Error::last_os_error();
    match error.raw_os_error() {
        // An interrupted connect keeps going in the background, like an in-progress one.
        Some(EINPROGRESS) | Some(EINTR) => Ok((socket, address, false)),
        _ => Err(Error::Connect(error)),
    }
}

impl Future for ConnectFuture {
    type Output = Result<TcpStream>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match mem::replace(&mut self.state, ConnectState::Finished) {
            ConnectState::Start { host, port } => match start_connect(&host, port) {
                Ok((socket, address, true)) => {
                    tracing::debug!(%address, fd = socket.as_raw_fd(), "connected immediately");
                    Poll::Ready(Ok(TcpStream::from_socket(socket)))
                }
                Ok((socket, address, false)) => {
                    if let Err(error) = register_readiness(Readiness::writable(socket.as_raw_fd()))
                    {
                        return Poll::Ready(Err(error));
                    }

                    self.state = ConnectState::Connecting { socket, address };
                    Poll::Pending
                }
                Err(error) => Poll::Ready(Err(error)),
            },
            ConnectState::Connecting { socket, address } => match socket.take_error() {
                Ok(None) => {
                    tracing::debug!(%address, fd = socket.as_raw_fd(), "connected");
                    Poll::Ready(Ok(TcpStream::from_socket(socket)))
                }
                Ok(Some(error)) | Err(error) => Poll::Ready(Err(Error::Connect(error))),
            },
            ConnectState::Finished => Poll::Ready(Err(Error::Connect(io::Error::other(
                "connect future polled after completion",
            )))),
        }
    }
}
