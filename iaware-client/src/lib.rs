mod client;
mod decoder;
mod error;
mod framing;
pub mod protocol;
mod rate;
mod receiver;
mod ring_buffer;
mod session;
mod snapshot;
mod status;

pub use client::StreamingClient;
pub use decoder::{Group1Decoder, SampleBlock, SampleDecoder};
pub use error::{Error, Result};
pub use framing::{Frame, FrameAssembler};
pub use rate::RateMeter;
pub use ring_buffer::RingBuffer;
pub use session::Session;
pub use snapshot::{Snapshot, SnapshotReader};
