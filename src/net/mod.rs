//! TCP networking primitives.
//!
//! - [`tcp_listener`]: [`TcpListener`] for accepting connections
//! - [`tcp_stream`]: [`TcpStream`] for connecting, reading and writing
//! - [`future`]: the accept and connect futures
//!
//! [`TcpListener`]: tcp_listener::TcpListener
//! [`TcpStream`]: tcp_stream::TcpStream

pub mod future;
pub mod tcp_listener;
pub mod tcp_stream;
pub(crate) mod utils;
