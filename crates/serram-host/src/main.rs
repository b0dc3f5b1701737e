//! serram - serve memory and console input to a microcontroller over serial.

use std::io::{self, BufReader, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use serram_host::{
    forward_lines, spawn_poller, Args, BridgeConfig, ConnectionManager, HostError, HostResult,
    SerialConnector, ShutdownSignal,
};
use serram_protocol::InputMailbox;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Read timeout on the passthrough port, so its reader notices shutdown.
const PASSTHROUGH_READ_TIMEOUT: Duration = Duration::from_millis(50);

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries passthrough data
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> HostResult<()> {
    let base = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    let config = args.apply(base);
    config.validate()?;

    if config.init_value_is_text() {
        warn!(
            "init value 0x{:02X} is a text byte; device output containing it will be misread as a control frame",
            config.init_value
        );
    }

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.trigger())?;
    }

    let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
    let mailbox = Arc::new(InputMailbox::new());

    // The passthrough port is both the input source and the output sink
    let (sink, passthrough_reader): (Box<dyn Write + Send>, _) = match &config.passthrough {
        Some(pass) => {
            info!("passing through to {} @ {} baud", pass.port, pass.baud);
            let port = serialport::new(&pass.port, pass.baud)
                .timeout(PASSTHROUGH_READ_TIMEOUT)
                .open()?;
            (Box::new(port.try_clone()?), Some(port))
        }
        None => (Box::new(io::stdout()), None),
    };

    let manager = ConnectionManager::new(
        SerialConnector::from_config(&config),
        config.timing(),
        config.session_config(),
        mailbox,
        sink,
        shutdown.clone(),
    );
    let poller = spawn_poller(manager, rx)?;

    // Stdin reads cannot be interrupted, so the producer is not joined.
    let producer_shutdown = shutdown.clone();
    thread::Builder::new()
        .name("serram-input".to_string())
        .spawn(move || {
            let result = match passthrough_reader {
                Some(port) => forward_lines(BufReader::new(port), &tx, &producer_shutdown),
                None => forward_lines(io::stdin().lock(), &tx, &producer_shutdown),
            };
            match result {
                Ok(lines) => info!("input closed after {} lines", lines),
                Err(e) => warn!("input failed: {}", e),
            }
            producer_shutdown.trigger();
        })?;

    let stats = poller.join().map_err(|_| HostError::PollerPanicked)??;
    info!(
        "done: {} commands, {} unknown, {} rejected, {} handshake requests",
        stats.session.commands,
        stats.session.unknown_commands,
        stats.session.rejected_commands,
        stats.handshakes_sent
    );
    Ok(())
}
