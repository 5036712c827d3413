//! Echo load generator: opens N concurrent connections and verifies every round trip.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use sockrun::drivers::client::{ClientConfig, run_clients};

#[derive(Parser, Debug)]
#[clap(
    name = "sockrun-client",
    about = "Concurrent echo client driven by the sockrun scheduler.",
    version
)]
struct ClientArgs {
    /// Port the echo server listens on
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Number of concurrent connections
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    connections: u64,

    /// Host to connect to
    #[clap(long, default_value = "localhost")]
    host: String,

    /// Round trips per connection (runs until an error when omitted)
    #[clap(long)]
    exchanges: Option<u64>,

    /// Seed for reproducible payloads
    #[clap(long)]
    seed: Option<u64>,

    /// Smallest payload length
    #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..))]
    min_payload: u8,

    /// Largest payload length
    #[clap(long, default_value_t = 100)]
    max_payload: u8,
}

impl ClientArgs {
    /// Builds the client settings, reporting inconsistent values as a usage error.
    fn into_config(self) -> Result<ClientConfig, clap::Error> {
        let config = ClientConfig {
            host: self.host,
            port: self.port,
            connections: self.connections as usize,
            min_payload: self.min_payload,
            max_payload: self.max_payload,
            exchanges: self.exchanges,
            seed: self.seed,
        };

        config
            .validate()
            .map_err(|err| Self::command().error(ErrorKind::ValueValidation, err))?;

        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    sockrun::logging::init();

    let config = ClientArgs::parse()
        .into_config()
        .unwrap_or_else(|err| err.exit());
    let report = run_clients(config).context("client run failed")?;

    tracing::info!(
        connected = report.connected,
        round_trips = report.round_trips,
        failures = report.failures,
        "done"
    );

    Ok(())
}
