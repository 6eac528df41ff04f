//! SimpleTally: a very simple tally for OBS Studio
//!
//! Run with: simple-tally --password <PW> --source <NAME> [--debug]
//!
//! Tally clients connect to port 8099 and receive `OFF`, `PREVIEW` or
//! `PROGRAM` (one per line) whenever the source changes state. With
//! `--encoding vmix` the listener speaks the vMix TCP tally API instead.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use simple_tally::obs::{ObsClient, ObsConfig, DEFAULT_OBS_PORT};
use simple_tally::protocol::FrameEncoding;
use simple_tally::server::DEFAULT_TALLY_PORT;
use simple_tally::{AppConfig, ServerConfig, TallyService};

#[derive(Debug, Parser)]
#[command(name = "SimpleTally", version, about = "A very simple tally for OBS Studio")]
struct Args {
    /// obs-websocket address
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    address: String,

    /// obs-websocket port
    #[arg(short = 'p', long, default_value_t = DEFAULT_OBS_PORT)]
    port: u16,

    /// obs-websocket password
    #[arg(long, visible_alias = "pw", env = "OBS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// The name of the source to monitor
    #[arg(short = 's', long)]
    source: String,

    /// Tally listener bind address
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    listen_address: IpAddr,

    /// Tally listener port
    #[arg(long, default_value_t = DEFAULT_TALLY_PORT)]
    listen_port: u16,

    /// Tally frame encoding (word, numeric or vmix)
    #[arg(long, default_value_t = FrameEncoding::Word)]
    encoding: FrameEncoding,

    /// Per-client write timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    write_timeout_ms: u64,

    /// Maximum concurrent tally clients (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("simple_tally={}", level))),
        )
        .init();

    tracing::info!("Init finished, starting listeners...");

    let server = ServerConfig::default()
        .bind(SocketAddr::new(args.listen_address, args.listen_port))
        .encoding(args.encoding)
        .write_timeout(Duration::from_millis(args.write_timeout_ms))
        .max_connections(args.max_connections);

    let service = TallyService::bind(AppConfig::new(args.source.clone(), server))
        .await
        .context("Unable to start tally TCP listener")?;

    let mut obs_config = ObsConfig::new(args.address.clone(), args.port);
    obs_config.password = args.password.clone();

    let obs = match ObsClient::connect(&obs_config).await {
        Ok(obs) => obs,
        Err(e) => {
            tracing::error!(
                component = "obs",
                error = %e,
                "Unable to connect to OBS at '{}:{}'",
                args.address,
                args.port
            );
            return Err(e.into());
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down...");
    };

    service.run(obs, shutdown).await?;

    Ok(())
}
