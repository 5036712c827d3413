use crate::error::{Error, Result};
use crate::net::future::ConnectFuture;
use crate::net::utils::{local_addr, peer_addr};
use crate::reactor::future::{ReadFuture, WriteFuture};
use crate::reactor::socket::Socket;

use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

/// A connected, non-blocking TCP stream.
///
/// Dropping the stream closes the connection.
#[derive(Debug)]
pub struct TcpStream {
    socket: Socket,
}

impl TcpStream {
    pub(crate) fn from_socket(socket: Socket) -> Self {
        Self { socket }
    }

    /// Connects to `host:port`.
    ///
    /// Only the first resolved address is attempted.
    pub fn connect(host: impl Into<String>, port: u16) -> ConnectFuture {
        ConnectFuture::new(host.into(), port)
    }

    pub fn read<'a>(&'a self, buffer: &'a mut [u8]) -> ReadFuture<'a> {
        self.socket.read(buffer)
    }

    pub fn write<'a>(&'a self, buffer: &'a [u8]) -> WriteFuture<'a> {
        self.socket.write(buffer)
    }

    pub async fn write_all(&self, mut buffer: &[u8]) -> Result<()> {
        while !buffer.is_empty() {
            let written = self.write(buffer).await?;
            if written == 0 {
                return Err(Error::Transfer(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                )));
            }
            buffer = &buffer[written..];
        }
        Ok(())
    }

    /// Fills `buffer` completely, failing with `UnexpectedEof` if the peer shuts down first.
    pub async fn read_exact(&self, mut buffer: &mut [u8]) -> Result<()> {
        while !buffer.is_empty() {
            let read = self.read(buffer).await?;
            if read == 0 {
                return Err(Error::Transfer(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection mid-message",
                )));
            }
            buffer = &mut std::mem::take(&mut buffer)[read..];
        }
        Ok(())
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        local_addr(self.socket.as_raw_fd())
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        peer_addr(self.socket.as_raw_fd())
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn into_socket(self) -> Socket {
        self.socket
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
