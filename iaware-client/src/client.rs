use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::Sender;
use iaware_messages::{Command, ConnectionState, Event, Hertz, StreamConfig, StreamEnd};
use log::{debug, error, info, warn};

use crate::decoder::{Group1Decoder, SampleDecoder};
use crate::error::{Error, Result};
use crate::protocol;
use crate::rate::RateMeter;
use crate::receiver::{Ingest, ReceiveLoop};
use crate::ring_buffer::RingBuffer;
use crate::snapshot::{Snapshot, SnapshotReader};
use crate::status::Status;

/// How long a blocked socket read waits before the loop checks for
/// reconfiguration and stop requests.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Bounds how long a command write may block on a peer that stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

const WINDOW_TOO_LARGE: &str = "sample window exceeds max_window_samples";

type DecoderFactory = dyn Fn() -> Box<dyn SampleDecoder> + Send + Sync;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One connection instance: sockets, state and its receive loop.
struct Link {
    status: Arc<Status>,
    data: TcpStream,
    writer: Mutex<TcpStream>,
    /// Shutdown handle for a separate command socket.
    command_socket: Option<TcpStream>,
    reconfigure: Sender<usize>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Link {
    fn send(&self, command: Command) -> Result<()> {
        let state = self.status.get();
        if !state.accepts_commands() {
            return Err(Error::Send(format!("cannot send {command:?} while {state}")));
        }

        let frame = protocol::encode(command);
        let mut writer = lock(&self.writer);
        // write_all retries short writes until the frame is out or the socket fails.
        if let Err(e) = writer.write_all(&frame).and_then(|()| writer.flush()) {
            drop(writer);
            error!("Writing {command:?} failed, closing connection: {e}");
            self.status.set(ConnectionState::Stopping);
            self.shutdown();
            return Err(Error::Send(e.to_string()));
        }

        debug!("Sent {command:?} ({} bytes)", frame.len());
        Ok(())
    }

    fn shutdown(&self) {
        let _ = self.data.shutdown(Shutdown::Both);
        if let Some(socket) = &self.command_socket {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }

    fn join(&self) {
        let Some(handle) = lock(&self.receiver).take() else {
            return;
        };
        if handle.join().is_err() {
            error!("Receive loop panicked");
            self.status.set(ConnectionState::Closed);
            self.status.end(StreamEnd::Failed("receive loop panicked".into()));
        }
    }

    fn stop(&self) {
        // Bounded by the writer's write timeout.
        if self.status.get().accepts_commands() {
            if let Err(e) = self.send(Command::StopStream) {
                warn!("Could not ask device to stop streaming: {e}");
            }
        }
        self.status.request_stop();
        self.shutdown();
        self.join();
        self.status.set(ConnectionState::Closed);
    }
}

/// Control and telemetry client for one acquisition device.
///
/// Commands can be sent from any thread while a background loop receives
/// sample frames into the sample window. Display code reads that window
/// through [`StreamingClient::reader`] at its own pace.
pub struct StreamingClient {
    config: StreamConfig,
    reader: SnapshotReader,
    sampling_frequency: AtomicU32,
    device_rate: Arc<AtomicU32>,
    rate: Arc<RateMeter>,
    events: Option<Sender<Event>>,
    decoder: Box<DecoderFactory>,
    /// Serialises connect and terminate.
    lifecycle: Mutex<()>,
    status: Mutex<Arc<Status>>,
    link: Mutex<Option<Arc<Link>>>,
}

impl StreamingClient {
    /// Create a disconnected client. Lifecycle events go to `events` if given.
    pub fn new(config: StreamConfig, events: Option<Sender<Event>>) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;
        debug!("Constructing streaming client: {config:?}");

        let capacity = config.capacity().ok_or(Error::InvalidConfig(WINDOW_TOO_LARGE))?;
        let ring = RingBuffer::new(config.channels, capacity);
        ring.set_live(false);

        Ok(Self {
            reader: ring.reader(),
            sampling_frequency: AtomicU32::new(config.sampling_frequency.as_hz()),
            device_rate: Arc::new(AtomicU32::new(0)),
            rate: Arc::new(RateMeter::new(config.rate_window)),
            status: Mutex::new(Arc::new(Status::new(events.clone()))),
            events,
            decoder: Box::new(|| -> Box<dyn SampleDecoder> { Box::new(Group1Decoder) }),
            lifecycle: Mutex::new(()),
            link: Mutex::new(None),
            config,
        })
    }

    /// Replace the sample frame decoder used by future connections.
    pub fn with_decoder<D, F>(mut self, factory: F) -> Self
    where
        D: SampleDecoder + 'static,
        F: Fn() -> D + Send + Sync + 'static,
    {
        self.decoder = Box::new(move || -> Box<dyn SampleDecoder> { Box::new(factory()) });
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.status).get()
    }

    /// Sampling frequency the window is currently sized for.
    pub fn sampling_frequency(&self) -> Hertz {
        Hertz(self.sampling_frequency.load(Ordering::Relaxed))
    }

    /// Handle for reading the sample window from other threads.
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn get_raw_data(&self) -> Snapshot {
        self.reader.get_raw_data()
    }

    /// Samples per second actually received over the trailing rate window.
    pub fn effective_sampling_frequency(&self) -> f64 {
        self.rate.rate()
    }

    /// Effective sampling frequency last reported by the device itself.
    pub fn device_sampling_frequency(&self) -> Option<u32> {
        match self.device_rate.load(Ordering::Relaxed) {
            0 => None,
            rate => Some(rate),
        }
    }

    /// Open a new connection and start its receive loop.
    ///
    /// Fails with [`Error::AlreadyConnected`] while a previous connection is
    /// still active, and with [`Error::Connection`] if the device cannot be
    /// reached within the configured timeout.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let _lifecycle = lock(&self.lifecycle);

        if lock(&self.link)
            .as_ref()
            .is_some_and(|link| link.status.get().is_active())
        {
            return Err(Error::AlreadyConnected);
        }
        let previous = lock(&self.link).take();
        if let Some(link) = previous {
            link.join();
        }

        let status = Arc::new(Status::new(self.events.clone()));
        *lock(&self.status) = Arc::clone(&status);
        status.set(ConnectionState::Connecting);

        match self.establish(host, port, &status) {
            Ok(link) => {
                *lock(&self.link) = Some(link);
                if status.advance(ConnectionState::Connecting, ConnectionState::Streaming) {
                    info!("Streaming from {host}:{port}");
                }
                Ok(())
            }
            Err(e) => {
                status.set(ConnectionState::Closed);
                status.end(StreamEnd::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn establish(&self, host: &str, port: u16, status: &Arc<Status>) -> Result<Arc<Link>> {
        let data = open(host, port, self.config.connect_timeout)?;
        if let Err(e) = data.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {e}");
        }
        data.set_read_timeout(Some(POLL_INTERVAL))
            .map_err(Error::Connection)?;

        let (writer, command_socket) = match self.config.command_port {
            Some(command_port) => {
                let socket = open(host, command_port, self.config.connect_timeout)?;
                let handle = socket.try_clone().map_err(Error::Connection)?;
                (socket, Some(handle))
            }
            None => (data.try_clone().map_err(Error::Connection)?, None),
        };
        writer
            .set_write_timeout(Some(WRITE_TIMEOUT))
            .map_err(Error::Connection)?;

        let (reconfigure_tx, reconfigure_rx) = flume::unbounded();
        let link = Arc::new(Link {
            status: Arc::clone(status),
            data: data.try_clone().map_err(Error::Connection)?,
            writer: Mutex::new(writer),
            command_socket,
            reconfigure: reconfigure_tx,
            receiver: Mutex::new(None),
        });

        // No loop is running, so this is the only writer.
        let mut ring = RingBuffer::attach(&self.reader);
        let capacity = self
            .config
            .capacity_for(self.sampling_frequency())
            .ok_or(Error::InvalidConfig(WINDOW_TOO_LARGE))?;
        ring.reset(capacity);
        self.device_rate.store(0, Ordering::Relaxed);
        self.rate.restart();

        if self.config.configure_on_connect {
            self.configure(&link).map_err(|e| {
                Error::Connection(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    e.to_string(),
                ))
            })?;
        }

        let ingest = Ingest::new(
            ring,
            (self.decoder)(),
            self.config.max_frame_len,
            Arc::clone(&self.rate),
            Arc::clone(&self.device_rate),
        );
        let receive_loop = ReceiveLoop::new(data, ingest, Arc::clone(status), reconfigure_rx);
        let handle = thread::Builder::new()
            .name("iaware-rx".into())
            .spawn(move || receive_loop.run())
            .map_err(Error::Connection)?;
        *lock(&link.receiver) = Some(handle);

        Ok(link)
    }

    fn configure(&self, link: &Link) -> Result<()> {
        link.send(Command::SetSamplingFrequency(self.sampling_frequency()))?;
        link.send(Command::SetSendDataFrequency(
            self.config.send_frequency_tenths(),
        ))?;
        link.send(Command::StartStream)
    }

    fn current_link(&self) -> Option<Arc<Link>> {
        lock(&self.link).clone()
    }

    /// Encode `command` and write all of it to the device.
    ///
    /// Fails with [`Error::Send`] unless the connection is `Connecting` or
    /// `Streaming`, or when the write fails. A `SetSamplingFrequency` whose
    /// window would exceed `max_window_samples` fails with
    /// [`Error::InvalidConfig`] and is not sent.
    ///
    /// A successful `SetSamplingFrequency` also resizes the sample window,
    /// which clears it.
    pub fn send_command(&self, command: Command) -> Result<()> {
        let link = self
            .current_link()
            .ok_or_else(|| Error::Send("not connected".into()))?;

        let resize = match command {
            Command::SetSamplingFrequency(hz) => Some((
                hz,
                self.config
                    .capacity_for(hz)
                    .ok_or(Error::InvalidConfig(WINDOW_TOO_LARGE))?,
            )),
            _ => None,
        };
        link.send(command)?;

        if let Some((hz, capacity)) = resize {
            self.sampling_frequency.store(hz.as_hz(), Ordering::Relaxed);
            if link.reconfigure.send(capacity).is_err() {
                debug!("Receive loop already gone, window resize skipped");
            }
        }
        Ok(())
    }

    /// Stop the receive loop, close the sockets and wait for the loop to exit.
    ///
    /// Idempotent. Calling it without a connection does nothing.
    pub fn terminate(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let Some(link) = lock(&self.link).take() else {
            debug!("Terminate requested with no connection");
            return;
        };
        link.stop();
        debug!("Connection terminated");
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn open(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(Error::Connection)?
        .collect();

    let mut last_error = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("{host}:{port} did not resolve"),
    );
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                info!("Connected to {addr}");
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connecting to {addr} failed: {e}");
                last_error = e;
            }
        }
    }
    Err(Error::Connection(last_error))
}
