//! Echo server: accepts connections and echoes length-prefixed frames back.

use anyhow::Context;
use clap::Parser;
use sockrun::drivers::server::{ServerConfig, serve};
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[clap(
    name = "sockrun-server",
    about = "Echo server driven by the sockrun scheduler.",
    version
)]
struct ServerArgs {
    /// Port to listen on
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Listen backlog
    #[clap(long, default_value_t = 50)]
    backlog: u32,

    /// Stop accepting after this many connections
    #[clap(long)]
    max_connections: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    sockrun::logging::init();

    let args = ServerArgs::parse();
    let config = ServerConfig {
        bind: args.bind,
        port: args.port,
        backlog: args.backlog,
        max_connections: args.max_connections,
    };

    let stats = serve(&config).with_context(|| format!("serving on {}", config.address()))?;
    tracing::info!(accepted = stats.accepted, failures = stats.failures, "server stopped");

    Ok(())
}
