//! Background receive loop: one per connection, sole writer of the ring.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use flume::Receiver;
use iaware_messages::{ConnectionState, HeaderKind, StreamEnd};
use log::{debug, error, info, trace, warn};

use crate::decoder::{SampleBlock, SampleDecoder};
use crate::framing::{Frame, FrameAssembler};
use crate::rate::RateMeter;
use crate::ring_buffer::RingBuffer;
use crate::status::Status;

const READ_CHUNK: usize = 4096;

/// Socket-free half of the receive loop: bytes in, samples into the ring.
pub(crate) struct Ingest {
    assembler: FrameAssembler,
    decoder: Box<dyn SampleDecoder>,
    ring: RingBuffer,
    rate: Arc<RateMeter>,
    device_rate: Arc<AtomicU32>,
}

impl Ingest {
    pub(crate) fn new(
        ring: RingBuffer,
        decoder: Box<dyn SampleDecoder>,
        max_frame_len: usize,
        rate: Arc<RateMeter>,
        device_rate: Arc<AtomicU32>,
    ) -> Self {
        Self {
            assembler: FrameAssembler::new(max_frame_len),
            decoder,
            ring,
            rate,
            device_rate,
        }
    }

    /// Buffer `bytes` and store every frame they complete.
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        self.assembler.extend(bytes);
        while let Some(frame) = self.assembler.next_frame() {
            self.handle_frame(frame);
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame.kind {
            HeaderKind::Group1 => {
                match self.decoder.decode(&frame.payload, self.ring.channels()) {
                    Ok(block) => self.store(block),
                    Err(e) => warn!("Dropping sample frame: {e}"),
                }
            }
            HeaderKind::Group2 => {
                trace!("Skipping group2 frame ({} bytes)", frame.payload.len());
            }
            HeaderKind::Command => {
                debug!(
                    "Ignoring command frame sent by device ({} bytes)",
                    frame.payload.len()
                );
            }
        }
    }

    fn store(&mut self, block: SampleBlock) {
        if let Some(rate) = block.device_rate {
            self.device_rate.store(rate, Ordering::Relaxed);
        }
        if block.is_empty() {
            return;
        }

        let count = block.len();
        match self.ring.write(&block.samples) {
            Ok(()) => self.rate.record(count),
            Err(e) => warn!("Dropping {count} samples: {e}"),
        }
    }

    fn reconfigure(&mut self, capacity: usize) {
        info!("Sampling frequency changed, window now {capacity} samples");
        self.ring.reset(capacity);
        self.rate.restart();
    }

    pub(crate) fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}

pub(crate) struct ReceiveLoop {
    stream: TcpStream,
    ingest: Ingest,
    status: Arc<Status>,
    reconfigure: Receiver<usize>,
}

impl ReceiveLoop {
    pub(crate) fn new(
        stream: TcpStream,
        ingest: Ingest,
        status: Arc<Status>,
        reconfigure: Receiver<usize>,
    ) -> Self {
        Self {
            stream,
            ingest,
            status,
            reconfigure,
        }
    }

    /// Read until EOF, a socket error or a stop request, then close.
    pub(crate) fn run(mut self) {
        debug!("Receive loop started");
        self.ingest.ring().set_live(true);

        let mut buf = vec![0u8; READ_CHUNK];
        let end = loop {
            self.apply_reconfigure();
            if self.status.stop_requested() {
                break StreamEnd::Terminated;
            }

            match self.stream.read(&mut buf) {
                Ok(0) => break StreamEnd::Eof,
                Ok(n) => self.ingest.feed(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => break StreamEnd::Failed(e.to_string()),
            }
        };

        let end = if self.status.stop_requested() {
            StreamEnd::Terminated
        } else {
            end
        };
        match &end {
            StreamEnd::Failed(reason) => error!("Receive loop failed: {reason}"),
            _ => debug!("Receive loop finished: {end}"),
        }

        self.status.set(ConnectionState::Stopping);
        self.ingest.ring().set_live(false);
        let _ = self.stream.shutdown(Shutdown::Both);
        self.status.set(ConnectionState::Closed);
        self.status.end(end);
    }

    fn apply_reconfigure(&mut self) {
        // Only the most recent request matters.
        if let Some(capacity) = self.reconfigure.try_iter().last() {
            self.ingest.reconfigure(capacity);
        }
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        self.ingest.ring().set_live(false);
    }
}
