use crate::error::{Error, Result};

use libc::{
    AF_INET, AF_INET6, getpeername, getsockname, in_addr, in6_addr, sa_family_t, sockaddr,
    sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t,
};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, ToSocketAddrs};
use std::os::unix::io::RawFd;

/// Resolves `host:port` and keeps only the first candidate address.
///
/// Later candidates are never tried, even if connecting to the first fails.
pub(crate) fn resolve_first(host: &str, port: u16) -> Result<SocketAddr> {
    let mut candidates = (host, port).to_socket_addrs().map_err(|source| Error::Resolve {
        host: host.to_owned(),
        port,
        source,
    })?;

    candidates.next().ok_or_else(|| Error::NoAddress {
        host: host.to_owned(),
        port,
    })
}

/// Converts a Rust socket address into the C representation `connect`/`bind` expect.
pub(crate) fn socketaddr_to_storage(address: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    let length = match address {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sin.sin_family = AF_INET as sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr = in_addr {
                s_addr: u32::from(*v4.ip()).to_be(),
            };
            set_len(&mut storage, mem::size_of::<sockaddr_in>());
            mem::size_of::<sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sin6.sin6_family = AF_INET6 as sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_addr = in6_addr {
                s6_addr: v6.ip().octets(),
            };
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_scope_id = v6.scope_id();
            set_len(&mut storage, mem::size_of::<sockaddr_in6>());
            mem::size_of::<sockaddr_in6>()
        }
    };

    (storage, length as socklen_t)
}

#[cfg(any(
    target_vendor = "apple",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
fn set_len(storage: &mut sockaddr_storage, length: usize) {
    storage.ss_len = length as u8;
}

#[cfg(not(any(
    target_vendor = "apple",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
fn set_len(_storage: &mut sockaddr_storage, _length: usize) {}

pub(crate) fn storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as i32 {
        AF_INET => {
            let sin = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        AF_INET6 => {
            let sin6 = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        family => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported address family {family}"),
        )),
    }
}

pub(crate) fn local_addr(file_descriptor: RawFd) -> io::Result<SocketAddr> {
    query_addr(file_descriptor, getsockname)
}

pub(crate) fn peer_addr(file_descriptor: RawFd) -> io::Result<SocketAddr> {
    query_addr(file_descriptor, getpeername)
}

fn query_addr(
    file_descriptor: RawFd,
    query: unsafe extern "C" fn(RawFd, *mut sockaddr, *mut socklen_t) -> i32,
) -> io::Result<SocketAddr> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

    let result = unsafe {
        query(
            file_descriptor,
            &mut storage as *mut _ as *mut sockaddr,
            &mut length,
        )
    };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    storage_to_socketaddr(&storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_round_trips_through_storage() {
        let address: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let (storage, length) = socketaddr_to_storage(&address);

        assert_eq!(length as usize, mem::size_of::<sockaddr_in>());
        assert_eq!(storage_to_socketaddr(&storage).unwrap(), address);
    }

    #[test]
    fn ipv6_round_trips_through_storage() {
        let address: SocketAddr = "[::1]:4242".parse().unwrap();
        let (storage, length) = socketaddr_to_storage(&address);

        assert_eq!(length as usize, mem::size_of::<sockaddr_in6>());
        assert_eq!(storage_to_socketaddr(&storage).unwrap(), address);
    }

    #[test]
    fn port_is_stored_in_network_order() {
        let address: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let (storage, _) = socketaddr_to_storage(&address);
        let sin = unsafe { &*(&storage as *const _ as *const sockaddr_in) };

        assert_eq!(sin.sin_port, 1u16.to_be());
    }

    #[test]
    fn literal_addresses_resolve_to_themselves() {
        let address = resolve_first("127.0.0.1", 9000).unwrap();
        assert_eq!(address, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn unknown_family_is_rejected() {
        let storage: sockaddr_storage = unsafe { mem::zeroed() };
        assert!(storage_to_socketaddr(&storage).is_err());
    }
}
