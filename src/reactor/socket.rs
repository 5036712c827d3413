//! Owned non-blocking socket descriptors.

use crate::error::{Error, Result};
use crate::net::utils::storage_to_socketaddr;
use crate::reactor::event::set_nonblocking;
use crate::reactor::future::{ReadFuture, WriteFuture};

use libc::{
    F_GETFD, F_SETFD, FD_CLOEXEC, SO_ERROR, SOCK_STREAM, SOL_SOCKET, accept, c_int, c_void, close,
    fcntl, getsockopt, recv, send, sockaddr, sockaddr_storage, socket, socklen_t,
};
use std::fmt;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

/// A socket descriptor with exactly one owner.
///
/// The descriptor is always in non-blocking mode and is closed exactly once,
/// when the `Socket` is dropped. Suspended tasks own their sockets through
/// their stack frames, so dropping a task releases whatever it still holds.
pub struct Socket {
    file_descriptor: RawFd,
}

impl Socket {
    /// Opens a non-blocking stream socket for the given address family.
    pub(crate) fn stream(family: c_int) -> Result<Self> {
        let file_descriptor = unsafe { socket(family, SOCK_STREAM, 0) };
        if file_descriptor < 0 {
            return Err(Error::last_socket());
        }

        // Owned from here on, so early returns close it.
        let socket = Self { file_descriptor };
        socket.configure().map_err(Error::Socket)?;

        Ok(socket)
    }

    /// Adopts an already open stream descriptor, switching it to non-blocking mode.
    ///
    /// Useful for handing sockets created elsewhere (for instance
    /// [`std::os::unix::net::UnixStream::pair`]) to scheduler tasks.
    pub fn from_owned_fd(fd: OwnedFd) -> Result<Self> {
        let socket = Self {
            file_descriptor: fd.into_raw_fd(),
        };
        socket.configure().map_err(Error::Socket)?;

        Ok(socket)
    }

    fn configure(&self) -> io::Result<()> {
        set_nonblocking(self.file_descriptor)?;

        let flags = unsafe { fcntl(self.file_descriptor, F_GETFD) };
        if flags < 0 || unsafe { fcntl(self.file_descriptor, F_SETFD, flags | FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }

        #[cfg(target_vendor = "apple")]
        self.set_option(libc::SO_NOSIGPIPE, 1)?;

        Ok(())
    }

    pub(crate) fn set_option(&self, option: c_int, value: c_int) -> io::Result<()> {
        let result = unsafe {
            libc::setsockopt(
                self.file_descriptor,
                SOL_SOCKET,
                option,
                &value as *const c_int as *const c_void,
                mem::size_of::<c_int>() as socklen_t,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Reads into `buffer`, suspending the current task until the socket is readable.
    ///
    /// Resolves to the number of bytes read; `Ok(0)` means the peer shut down.
    pub fn read<'a>(&'a self, buffer: &'a mut [u8]) -> ReadFuture<'a> {
        ReadFuture::new(self, buffer)
    }

    /// Writes from `buffer`, suspending the current task until the socket is writable.
    pub fn write<'a>(&'a self, buffer: &'a [u8]) -> WriteFuture<'a> {
        WriteFuture::new(self, buffer)
    }

    pub(crate) fn try_read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let result = unsafe {
            recv(
                self.file_descriptor,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
                0,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(result as usize)
    }

    pub(crate) fn try_write(&self, buffer: &[u8]) -> io::Result<usize> {
        let result = unsafe {
            send(
                self.file_descriptor,
                buffer.as_ptr() as *const c_void,
                buffer.len(),
                SEND_FLAGS,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(result as usize)
    }

    pub(crate) fn try_accept(&self) -> io::Result<(Socket, SocketAddr)> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        let client = unsafe {
            accept(
                self.file_descriptor,
                &mut storage as *mut _ as *mut sockaddr,
                &mut length,
            )
        };

        if client < 0 {
            return Err(io::Error::last_os_error());
        }

        let socket = Socket {
            file_descriptor: client,
        };
        socket.configure()?;

        Ok((socket, storage_to_socketaddr(&storage)?))
    }

    /// Returns and clears the pending socket error (`SO_ERROR`).
    pub(crate) fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut value: c_int = 0;
        let mut length = mem::size_of::<c_int>() as socklen_t;

        let result = unsafe {
            getsockopt(
                self.file_descriptor,
                SOL_SOCKET,
                SO_ERROR,
                &mut value as *mut c_int as *mut c_void,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok((value != 0).then(|| io::Error::from_raw_os_error(value)))
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("fd", &self.file_descriptor)
            .finish()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        tracing::trace!(fd = self.file_descriptor, "closing socket");

        unsafe {
            close(self.file_descriptor);
        }
    }
}
