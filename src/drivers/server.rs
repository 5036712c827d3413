//! Echo server: one accept loop plus one task per connection, all under one scheduler.

use crate::drivers::MAX_PAYLOAD;
use crate::error::Result;
use crate::net::tcp_listener::TcpListener;
use crate::net::tcp_stream::TcpStream;
use crate::runtime::{Scheduler, Spawner, yield_now};
use crate::task::StartPolicy;

use std::cell::Cell;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::unix::io::AsRawFd;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Settings for [`serve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    /// Port to listen on; `0` lets the OS pick one.
    pub port: u16,
    pub backlog: u32,
    /// Stop accepting after this many connections; `None` accepts forever.
    pub max_connections: Option<usize>,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            backlog: 50,
            max_connections: None,
        }
    }
}

/// Source of incoming connections for [`accept_loop`].
pub trait Acceptor {
    fn accept(&self) -> impl Future<Output = Result<(TcpStream, SocketAddr)>>;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = Result<(TcpStream, SocketAddr)>> {
        TcpListener::accept(self)
    }
}

/// What an accept loop did before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcceptStats {
    pub accepted: usize,
    pub failures: usize,
}

/// Echoes frames until the peer closes the connection.
///
/// Returns the number of frames echoed when the peer shuts down at a frame
/// boundary; any other end is an error.
pub async fn echo_connection(stream: TcpStream) -> Result<u64> {
    let mut buffer = [0u8; MAX_PAYLOAD];
    let mut frames = 0u64;

    loop {
        let mut prefix = [0u8; 1];
        if stream.read(&mut prefix).await? == 0 {
            return Ok(frames);
        }

        let payload = &mut buffer[..prefix[0] as usize];
        stream.read_exact(payload).await?;
        stream.write_all(payload).await?;
        frames += 1;
    }
}

fn spawn_connection(spawner: &Spawner, stream: TcpStream, peer: SocketAddr) {
    spawner.spawn_with(StartPolicy::Lazy, async move {
        let fd = stream.as_raw_fd();
        match echo_connection(stream).await {
            Ok(frames) => debug!(%peer, fd, frames, "connection closed"),
            Err(err) => warn!(%peer, fd, %err, "connection ended with error"),
        }
    });
}

/// Accepts connections and spawns an echo task for each.
///
/// A failed accept is logged and the loop keeps going, after yielding once so
/// a persistent error cannot starve the other tasks.
pub async fn accept_loop<A: Acceptor>(
    acceptor: A,
    spawner: Spawner,
    max_connections: Option<usize>,
) -> AcceptStats {
    let mut stats = AcceptStats::default();

    while max_connections.is_none_or(|limit| stats.accepted < limit) {
        match acceptor.accept().await {
            Ok((stream, peer)) => {
                stats.accepted += 1;
                debug!(%peer, fd = stream.as_raw_fd(), "accepted connection");
                spawn_connection(&spawner, stream, peer);
            }
            Err(err) => {
                stats.failures += 1;
                error!(%err, "accepting failed");
                yield_now().await;
            }
        }
    }

    stats
}

/// Runs the accept loop for `listener` and every connection it spawns until all are done.
pub fn serve_listener(listener: TcpListener, max_connections: Option<usize>) -> Result<AcceptStats> {
    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();
    let outcome = Rc::new(Cell::new(AcceptStats::default()));
    let recorded = outcome.clone();

    scheduler.spawn_with(StartPolicy::Eager, async move {
        let stats = accept_loop(listener, spawner, max_connections).await;
        info!(?stats, "accept loop stopped");
        recorded.set(stats);
    });

    let summary = scheduler.run()?;
    debug!(?summary, "server scheduler finished");

    Ok(outcome.get())
}

/// Binds the configured address and serves echo connections.
pub fn serve(config: &ServerConfig) -> Result<AcceptStats> {
    let listener = TcpListener::bind(config.address(), config.backlog)?;
    info!(address = %listener.local_addr().unwrap_or(config.address()), "listening");

    serve_listener(listener, config.max_connections)
}
