use bytes::Buf;

use crate::error::{Error, Result};

/// Samples decoded from one inbound frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBlock {
    /// One ordered sequence per channel, all of equal length.
    pub samples: Vec<Vec<f32>>,
    /// Effective sampling frequency measured by the device, if the frame carries one.
    pub device_rate: Option<u32>,
}

impl SampleBlock {
    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns the body of a sample frame into per-channel rows.
///
/// `payload` is everything after the header kind byte. Implementations are
/// owned by the receive loop, so they may keep state between frames.
pub trait SampleDecoder: Send {
    fn decode(&mut self, payload: &[u8], channels: usize) -> Result<SampleBlock>;
}

/// Decoder for the device's `Group1` frames:
/// a big-endian `u32` effective sampling frequency followed by big-endian
/// `u16` samples interleaved across channels (`s0c0 s0c1 .. s1c0 ..`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Group1Decoder;

const RATE_LEN: usize = 4;
const SAMPLE_WIDTH: usize = 2;

impl SampleDecoder for Group1Decoder {
    fn decode(&mut self, payload: &[u8], channels: usize) -> Result<SampleBlock> {
        if channels == 0 {
            return Err(Error::ChannelMismatch("decoder configured for zero channels".into()));
        }
        if payload.len() < RATE_LEN {
            return Err(Error::MalformedFrame(format!(
                "group1 payload of {} bytes has no rate field",
                payload.len()
            )));
        }

        let mut cursor = payload;
        let device_rate = cursor.get_u32();

        let row_width = SAMPLE_WIDTH * channels;
        if cursor.remaining() % row_width != 0 {
            return Err(Error::MalformedFrame(format!(
                "{} sample bytes is not a multiple of {row_width} ({channels} channels)",
                cursor.remaining()
            )));
        }

        let rows = cursor.remaining() / row_width;
        let mut samples = vec![Vec::with_capacity(rows); channels];
        for _ in 0..rows {
            for channel in samples.iter_mut() {
                channel.push(f32::from(cursor.get_u16()));
            }
        }

        Ok(SampleBlock {
            samples,
            device_rate: Some(device_rate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group1_single_channel() {
        let payload = [0x00, 0x00, 0x3A, 0x98, 0x00, 0x01, 0xFF, 0xFF, 0x12, 0x34];
        let block = Group1Decoder.decode(&payload, 1).unwrap();

        assert_eq!(block.device_rate, Some(15_000));
        assert_eq!(block.samples, vec![vec![1.0, 65535.0, 4660.0]]);
        assert_eq!(block.len(), 3);
    }

    #[test]
    fn test_group1_interleaved_channels() {
        let payload = [0, 0, 0, 10, 0, 1, 0, 2, 0, 3, 0, 4];
        let block = Group1Decoder.decode(&payload, 2).unwrap();

        assert_eq!(block.samples, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn test_group1_rejects_partial_row() {
        let payload = [0, 0, 0, 10, 0, 1, 0, 2, 0];
        assert!(matches!(
            Group1Decoder.decode(&payload, 2),
            Err(Error::MalformedFrame(_))
        ));
        assert!(matches!(
            Group1Decoder.decode(&[0, 1], 1),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_group1_rate_only_is_empty_block() {
        let block = Group1Decoder.decode(&[0, 0, 0, 1], 3).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.samples.len(), 3);
    }
}
