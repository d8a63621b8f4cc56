//! Entry point for `rftp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, address resolution, argument parsing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rftp::config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_PORT};
use rftp::progress::{Direction, LogProgress};
use rftp::{Client, ClientConfig, DuplicatePolicy, Server, ServerConfig, Socket};

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive one file from a client into a directory.
    Server {
        /// Directory to write the received file into (created if missing).
        output_dir: PathBuf,
        /// Log every message sent and received.
        #[arg(short, long)]
        verbose: bool,
        /// Quiet period after the final acknowledgment, in milliseconds.
        #[arg(short = 't', long = "time-wait", default_value_t = 30)]
        time_wait: u64,
        /// UDP port to listen on.
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Re-acknowledge duplicate data instead of ignoring it.
        #[arg(long)]
        reack_duplicates: bool,
    },
    /// Send one file to a server.
    Client {
        /// Server host name or address.
        server: String,
        /// File to send.
        filename: PathBuf,
        /// Log every message sent and received.
        #[arg(short, long)]
        verbose: bool,
        /// Retransmission timeout, in milliseconds.
        #[arg(short, long, default_value_t = 50)]
        timeout: u64,
        /// Server UDP port.
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Give up after this many transmissions of one message (default: never).
        #[arg(long)]
        max_retries: Option<u32>,
        /// Largest file size to offer, in bytes.
        #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
        max_size: u64,
    },
}

impl Mode {
    fn verbose(&self) -> bool {
        match self {
            Mode::Server { verbose, .. } | Mode::Client { verbose, .. } => *verbose,
        }
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG, when set, wins over the flag.
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.mode.verbose());

    let outcome = match cli.mode {
        Mode::Server {
            output_dir,
            time_wait,
            port,
            reack_duplicates,
            ..
        } => {
            let mut config =
                ServerConfig::new(output_dir).with_time_wait(Duration::from_millis(time_wait));
            if reack_duplicates {
                config = config.with_duplicates(DuplicatePolicy::Reacknowledge);
            }
            run_server(config, port).await
        }
        Mode::Client {
            server,
            filename,
            timeout,
            port,
            max_retries,
            max_size,
            ..
        } => {
            let mut config = ClientConfig::default()
                .with_timeout(Duration::from_millis(timeout))
                .with_max_file_size(max_size);
            if let Some(max) = max_retries {
                config = config.with_max_transmissions(max);
            }
            run_client(&server, port, filename, config).await
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` means the session ran and failed; `Err` means it never started.
async fn run_server(config: ServerConfig, port: u16) -> Result<bool> {
    let bind: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::bind(bind)
        .await
        .with_context(|| format!("binding UDP port {port}"))?;
    log::info!("listening on {} for a file transfer request ...", socket.local_addr);

    let mut server = Server::new(socket, config);
    let mut progress = LogProgress::new(Direction::Receiving);
    match server.receive_file(&mut progress).await {
        Ok(report) if report.is_complete() => {
            log::info!(
                "{} was successfully received from {}.",
                report.file_name,
                report.peer.ip()
            );
            Ok(true)
        }
        Ok(report) => {
            log::info!(
                "Could not successfully receive {} from {}.",
                report.file_name,
                report.peer.ip()
            );
            Ok(false)
        }
        Err(_) => {
            log::info!("Could not successfully receive a file.");
            Ok(false)
        }
    }
}

/// The server only listens on IPv4, so only an IPv4 address is usable.
fn first_ipv4(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    addrs.into_iter().find(SocketAddr::is_ipv4)
}

async fn run_client(
    host: &str,
    port: u16,
    filename: PathBuf,
    config: ClientConfig,
) -> Result<bool> {
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}"))?;
    let peer = first_ipv4(addrs).with_context(|| format!("{host} has no IPv4 addresses"))?;
    let socket = Socket::bind_for(peer)
        .await
        .context("binding client socket")?;

    let mut client = Client::new(socket, peer, config);
    let mut progress = LogProgress::new(Direction::Sending);
    match client.send_file(&filename, &mut progress).await {
        Ok(_) => {
            log::info!("{} was successfully sent to {host}.", filename.display());
            Ok(true)
        }
        Err(_) => {
            log::info!("Could not successfully send {} to {host}.", filename.display());
            Ok(false)
        }
    }
}
