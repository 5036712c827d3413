//! Load-generating client: random payloads, echoed back and verified.

use crate::error::{Error, Result};
use crate::net::tcp_stream::TcpStream;
use crate::runtime::Scheduler;
use crate::task::StartPolicy;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Settings for [`run_clients`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Number of concurrent connection tasks.
    pub connections: usize,
    /// Smallest random payload length, at least 1.
    pub min_payload: u8,
    /// Largest random payload length.
    pub max_payload: u8,
    /// Round trips per connection; `None` runs until an error.
    pub exchanges: Option<u64>,
    /// Seed for reproducible payloads; each connection uses `seed + index`.
    pub seed: Option<u64>,
}

impl ClientConfig {
    pub fn new(port: u16, connections: usize) -> Self {
        Self {
            port,
            connections,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".into()));
        }
        if self.connections == 0 {
            return Err(Error::InvalidConfig(
                "at least one connection is required".into(),
            ));
        }
        if self.min_payload == 0 || self.min_payload > self.max_payload {
            return Err(Error::InvalidConfig(format!(
                "payload range {}..={} must be non-empty and start at 1 or more",
                self.min_payload, self.max_payload
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 0,
            connections: 1,
            min_payload: 1,
            max_payload: 100,
            exchanges: None,
            seed: None,
        }
    }
}

/// Counters shared by all client tasks of one run.
#[derive(Debug, Default)]
pub struct ClientStats {
    connected: Cell<usize>,
    round_trips: Cell<u64>,
    failures: Cell<usize>,
}

impl ClientStats {
    pub fn report(&self) -> ClientReport {
        ClientReport {
            connected: self.connected.get(),
            round_trips: self.round_trips.get(),
            failures: self.failures.get(),
        }
    }

    fn bump_failures(&self) {
        self.failures.set(self.failures.get() + 1);
    }
}

/// Snapshot of [`ClientStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientReport {
    pub connected: usize,
    pub round_trips: u64,
    /// Tasks that ended on an error (connect, transfer or mismatch).
    pub failures: usize,
}

/// Sends one framed payload and returns the bytes the peer sent back.
pub async fn exchange(stream: &TcpStream, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u8::try_from(payload.len()).map_err(|_| {
        Error::InvalidConfig(format!(
            "payload of {} bytes does not fit a one-byte length prefix",
            payload.len()
        ))
    })?;

    stream.write_all(&[length]).await?;
    stream.write_all(payload).await?;

    let mut echoed = vec![0u8; payload.len()];
    stream.read_exact(&mut echoed).await?;

    Ok(echoed)
}

/// Like [`exchange`], but fails with [`Error::Mismatch`] unless the echo matches.
pub async fn round_trip(stream: &TcpStream, payload: &[u8]) -> Result<()> {
    let echoed = exchange(stream, payload).await?;

    match payload.iter().zip(&echoed).position(|(sent, got)| sent != got) {
        Some(offset) => Err(Error::Mismatch {
            len: payload.len(),
            offset,
        }),
        None => Ok(()),
    }
}

/// One client connection: connect, then round trips with random payloads.
///
/// Any failure ends the task after logging it; the socket closes when the
/// task finishes.
pub async fn client_loop(config: Rc<ClientConfig>, stats: Rc<ClientStats>, mut rng: StdRng) {
    if let Err(err) = config.validate() {
        error!(%err, "client not started");
        stats.bump_failures();
        return;
    }

    let stream = match TcpStream::connect(config.host.as_str(), config.port).await {
        Ok(stream) => stream,
        Err(err) => {
            error!(host = %config.host, port = config.port, %err, "connect failed");
            stats.bump_failures();
            return;
        }
    };

    let fd = stream.as_raw_fd();
    info!(fd, "connected");
    stats.connected.set(stats.connected.get() + 1);

    let mut completed = 0u64;
    while config.exchanges.is_none_or(|limit| completed < limit) {
        let length = rng.gen_range(config.min_payload..=config.max_payload) as usize;
        let mut payload = vec![0u8; length];
        rng.fill(payload.as_mut_slice());

        let started = Instant::now();
        match round_trip(&stream, &payload).await {
            Ok(()) => {
                completed += 1;
                stats.round_trips.set(stats.round_trips.get() + 1);
                info!(
                    fd,
                    bytes = length,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "round trip OK"
                );
            }
            Err(err @ Error::Mismatch { .. }) => {
                error!(fd, %err, "round trip failed");
                stats.bump_failures();
                return;
            }
            Err(err) => {
                error!(fd, %err, "exchange failed");
                stats.bump_failures();
                return;
            }
        }
    }

    debug!(fd, completed, "client finished");
}

/// Opens `config.connections` client tasks under one scheduler and runs them to completion.
pub fn run_clients(config: ClientConfig) -> Result<ClientReport> {
    config.validate()?;

    let config = Rc::new(config);
    let stats = Rc::new(ClientStats::default());
    let mut scheduler = Scheduler::builder()
        .poll_capacity(config.connections)
        .build();

    for index in 0..config.connections {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };

        scheduler.spawn_with(
            StartPolicy::Eager,
            client_loop(config.clone(), stats.clone(), rng),
        );
    }

    let summary = scheduler.run()?;
    let report = stats.report();
    info!(?summary, ?report, "client tasks finished");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_rejected_until_a_port_is_set() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new(7000, 4).validate().is_ok());
    }

    #[test]
    fn zero_connections_are_rejected() {
        assert!(matches!(
            ClientConfig::new(7000, 0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn payload_range_must_start_at_one_and_be_ordered() {
        let mut config = ClientConfig::new(7000, 1);
        config.min_payload = 0;
        assert!(config.validate().is_err());

        config.min_payload = 50;
        config.max_payload = 10;
        assert!(config.validate().is_err());

        config.max_payload = 255;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_payload_range_ends_the_task_not_the_scheduler() {
        let mut config = ClientConfig::new(7000, 1);
        config.min_payload = 50;
        config.max_payload = 10;
        let stats = Rc::new(ClientStats::default());

        let mut scheduler = Scheduler::new();
        scheduler.spawn(client_loop(
            Rc::new(config),
            stats.clone(),
            StdRng::seed_from_u64(1),
        ));

        let summary = scheduler.run().unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(
            stats.report(),
            ClientReport {
                connected: 0,
                round_trips: 0,
                failures: 1,
            }
        );
    }

    #[test]
    fn connect_failure_is_counted_not_fatal() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut config = ClientConfig::new(port, 2);
        config.host = "127.0.0.1".into();

        let report = run_clients(config).unwrap();
        assert_eq!(report.connected, 0);
        assert_eq!(report.failures, 2);
    }
}
