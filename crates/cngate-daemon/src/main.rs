//! cngate binary entry point.
//!
//! Wires the serial link, the stdin command reader, the frame dispatcher,
//! the telemetry sink, and the sniffer rebroadcast server together, then
//! runs the serial read loop until stdin closes or a signal arrives.
//! stdout carries the answer protocol toward the supervisor, so all
//! logging goes to stderr.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cngate_daemon::{command_reader, dispatch, serial, sniffer_server, ShutdownReason};
use cngate_protocol::SharedTimeRef;
use cngate_telemetry::counters;
use cngate_telemetry::{DebugSink, FileSink, NullSink, SinkConfig, SinkError, TelemetrySink};

#[derive(Parser)]
#[command(name = "cngate")]
#[command(about = "Control node gateway daemon", version)]
struct Args {
    /// Serial device of the control node
    #[arg(long, default_value = serial::DEFAULT_TTY)]
    tty: String,

    /// Baud rate of the serial link
    #[arg(long, default_value_t = serial::DEFAULT_BAUD)]
    baud: u32,

    /// Echo every decoded measurement on stdout
    #[arg(short, long)]
    debug: bool,

    /// Telemetry sink configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port for the sniffer rebroadcast server
    #[arg(long, default_value_t = sniffer_server::DEFAULT_PORT)]
    sniffer_port: u16,
}

fn build_sink(args: &Args) -> Result<Arc<dyn TelemetrySink>, SinkError> {
    let inner: Arc<dyn TelemetrySink> = match &args.config {
        Some(path) => {
            let config = SinkConfig::from_yaml_file(path)?;
            Arc::new(FileSink::open(&config)?)
        }
        None => Arc::new(NullSink),
    };
    if args.debug {
        Ok(Arc::new(DebugSink::wrap(inner)))
    } else {
        Ok(inner)
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    counters::describe_metrics();

    let sink = match build_sink(&args) {
        Ok(sink) => sink,
        Err(err) => {
            error!("telemetry sink setup failed: {}", err);
            process::exit(1);
        }
    };

    let mut port = match serial::open(&args.tty, args.baud) {
        Ok(port) => port,
        Err(err) => {
            error!("cannot open {}: {}", args.tty, err);
            process::exit(1);
        }
    };
    let writer = match port.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            error!("cannot clone serial handle: {}", err);
            process::exit(1);
        }
    };
    info!("serial link open on {} at {} baud", args.tty, args.baud);

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(2);
    let signal_tx = shutdown_tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(ShutdownReason::Interrupted);
    }) {
        warn!("signal handler not installed: {}", err);
    }

    // Sniffer rebroadcast is optional: a busy port only costs live
    // Wireshark access, never measurements.
    let sniffer = match sniffer_server::SnifferServer::start(args.sniffer_port, sink.clone()) {
        Ok(server) => Some(server),
        Err(err) => {
            warn!("sniffer server disabled: {}", err);
            None
        }
    };

    let time_ref = SharedTimeRef::new();
    let mut dispatcher = dispatch::Dispatcher::new(time_ref.clone(), sink.clone(), sniffer);

    if let Err(err) = command_reader::spawn(writer, time_ref, shutdown_tx) {
        error!("cannot start command reader: {}", err);
        process::exit(1);
    }

    // The supervisor waits for this line before sending commands.
    println!("cn_serial_ready");

    match serial::read_loop(port.as_mut(), &mut dispatcher, &shutdown_rx) {
        Ok(reason) => {
            info!("shutting down: {:?}", reason);
            sink.stop();
        }
        Err(err) => {
            error!("serial link lost: {}", err);
            sink.stop();
            process::exit(1);
        }
    }
}
