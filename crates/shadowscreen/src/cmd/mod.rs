use std::path::PathBuf;

use clap::{Args, Subcommand};
use shadowscreen::transport::Endpoint;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::exit::{transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod inspect;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one producer and print the frame records it sends.
    Listen(ListenArgs),
    /// Connect and stream synthetic frame records.
    Send(SendArgs),
    /// Decode a recorded dump file.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => runtime()?.block_on(listen::run(args, format)),
        Command::Send(args) => runtime()?.block_on(send::run(args, format)),
        Command::Inspect(args) => runtime()?.block_on(inspect::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
}

pub(crate) fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

/// Cancel `cancel` on the first Ctrl-C.
pub(crate) fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    cancel.cancel();
                }
                Err(err) => debug!(%err, "signal handler unavailable"),
            },
        }
    });
}

fn parse_nal_length(input: &str) -> Result<u8, String> {
    match input.trim().parse::<u8>() {
        Ok(width @ (1 | 2 | 4)) => Ok(width),
        _ => Err(format!("expected 1, 2 or 4, got {input:?}")),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind: tcp://HOST:PORT, unix:///PATH or a socket path.
    pub endpoint: String,
    /// Exit after receiving N frame records.
    #[arg(long)]
    pub count: Option<u64>,
    /// Append every received record, in wire format, to FILE.
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,
    /// Maximum accepted message size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_message_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to: tcp://HOST:PORT, unix:///PATH or a socket path.
    pub endpoint: String,
    /// Number of frame records to send.
    #[arg(long, default_value = "30")]
    pub frames: u32,
    /// Frames per second; sets presentation times and pacing.
    #[arg(long, default_value = "30")]
    pub fps: f64,
    /// Size of each synthetic payload.
    #[arg(long, value_name = "BYTES", default_value = "4096", conflicts_with = "payload_file")]
    pub payload_size: usize,
    /// Use the contents of FILE as every frame's payload.
    #[arg(long, value_name = "FILE")]
    pub payload_file: Option<PathBuf>,
    /// Width of NAL unit length prefixes.
    #[arg(long, default_value = "4", value_parser = parse_nal_length)]
    pub nal_length: u8,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Dump file written by `listen --dump`.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
