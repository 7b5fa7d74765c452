use iaware_client::{Session, StreamingClient};
use iaware_messages::{Hertz, Request, Seconds, StreamConfig};
use iaware_ui::ViewerSettings;

use clap::Parser;
use log::LevelFilter;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Live viewer for an iAware bio-signal acquisition device.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device address
    #[arg(long, default_value = "192.168.4.1")]
    host: String,

    /// Port the device streams samples on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Port the device accepts commands on (equal to --port to share the data socket)
    #[arg(long, default_value_t = 5001)]
    command_port: u16,

    /// Number of channels in each sample row
    #[arg(long, default_value_t = 1)]
    channels: usize,

    /// Length of the displayed window in seconds
    #[arg(long, default_value_t = 1.0)]
    duration: f64,

    /// Device sampling frequency in Hz
    #[arg(long, default_value_t = 15_000)]
    fs: u32,

    /// Rate the device sends data at, in Hz (at most 25.5)
    #[arg(long, default_value_t = 20.0)]
    fs_send: f32,

    /// Display refresh rate in Hz
    #[arg(long, default_value_t = 20.0)]
    refresh_hz: f64,

    /// Do not configure and start the device after connecting
    #[arg(long)]
    no_configure: bool,

    /// Log client internals at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            samples_duration: Seconds(self.duration),
            sampling_frequency: Hertz(self.fs),
            send_frequency: self.fs_send,
            command_port: (self.command_port != self.port).then_some(self.command_port),
            configure_on_connect: !self.no_configure,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let client_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - mod path |{}| - target | {} | args: |{}|",
                record.level(),
                record.module_path().unwrap_or(""),
                record.target(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Warn)
        .filter_module("iaware", LevelFilter::Info)
        .filter_module("iaware_client", client_level)
        .filter_module("iaware_ui", LevelFilter::Info)
        .init();

    if !(args.refresh_hz > 0.0) {
        anyhow::bail!("--refresh-hz must be positive, got {}", args.refresh_hz);
    }
    let settings = ViewerSettings {
        host: args.host.clone(),
        port: args.port,
        refresh: Duration::from_secs_f64(1.0 / args.refresh_hz),
    };

    // Create flume channels for bidirectional communication
    let (request_tx, request_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::bounded(64);

    let client = Arc::new(StreamingClient::new(
        args.stream_config(),
        Some(event_tx.clone()),
    )?);

    // Spawn session thread
    let session = Session::new(Arc::clone(&client), request_rx, Some(event_tx));
    let session_handle = std::thread::spawn(move || session.run());

    request_tx.send(Request::Connect {
        host: args.host,
        port: args.port,
    })?;

    // Run UI on main thread (blocking)
    let ui_result = iaware_ui::run(Arc::clone(&client), event_rx, request_tx.clone(), settings);

    // UI has exited - stop the session, which terminates the connection
    let _ = request_tx.send(Request::Exit);

    // Wait for session thread to finish
    session_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Session thread panicked"))?;

    ui_result
}
