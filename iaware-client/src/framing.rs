use bytes::{Buf, Bytes, BytesMut};
use iaware_messages::HeaderKind;
use log::{debug, warn};

use crate::protocol::{self, FRAME_HEADER_LEN, LENGTH_PREFIX_LEN};

/// One complete inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: HeaderKind,
    /// Bytes after the header kind byte.
    pub payload: Bytes,
}

/// Reassembles length-prefixed frames from arbitrarily split socket reads.
///
/// Input is buffered across calls to [`FrameAssembler::extend`]; a frame is
/// only released once all the bytes its length prefix declares have arrived.
/// A prefix that is zero, larger than `max_frame_len`, or followed by an
/// unknown header kind is treated as corruption: bytes are dropped one at a
/// time until a plausible prefix lines up again.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    max_frame_len: usize,
    discarded: usize,
}

impl FrameAssembler {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_frame_len,
            discarded: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet released as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame, or `None` if more input is needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.buf.len() < FRAME_HEADER_LEN {
                return None;
            }

            let plausible = match protocol::decode_frame_header(&self.buf) {
                Ok((declared, kind, _)) if declared as usize <= self.max_frame_len => {
                    Some((declared as usize, kind))
                }
                Ok((declared, _, _)) => {
                    self.note_discard(&format!(
                        "length prefix {declared} exceeds {}",
                        self.max_frame_len
                    ));
                    None
                }
                Err(e) => {
                    self.note_discard(&e.to_string());
                    None
                }
            };

            let Some((declared, kind)) = plausible else {
                self.buf.advance(1);
                continue;
            };

            if self.buf.len() < LENGTH_PREFIX_LEN + declared {
                return None;
            }

            if self.discarded > 0 {
                debug!("Resynchronised after discarding {} bytes", self.discarded);
                self.discarded = 0;
            }

            let mut frame = self.buf.split_to(LENGTH_PREFIX_LEN + declared);
            frame.advance(FRAME_HEADER_LEN);
            return Some(Frame {
                kind,
                payload: frame.freeze(),
            });
        }
    }

    fn note_discard(&mut self, reason: &str) {
        if self.discarded == 0 {
            warn!("Malformed frame ({reason}), resynchronising");
        }
        self.discarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group1_frame(rate: u32, samples: &[u16]) -> Vec<u8> {
        let len = 1 + 4 + 2 * samples.len();
        let mut out = Vec::new();
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out.push(HeaderKind::Group1.as_byte());
        out.extend_from_slice(&rate.to_be_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_be_bytes());
        }
        out
    }

    fn drain(assembler: &mut FrameAssembler) -> Vec<Frame> {
        std::iter::from_fn(|| assembler.next_frame()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut assembler = FrameAssembler::new(1024);
        assembler.extend(&group1_frame(500, &[1, 2, 3]));

        let frame = assembler.next_frame().unwrap();
        assert_eq!(frame.kind, HeaderKind::Group1);
        assert_eq!(&frame.payload[..], &[0, 0, 1, 244, 0, 1, 0, 2, 0, 3]);
        assert!(assembler.next_frame().is_none());
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn test_byte_at_a_time_matches_single_chunk() {
        let mut stream = group1_frame(1000, &[10, 20, 30, 40]);
        stream.extend(group1_frame(1001, &[50]));
        stream.extend([0, 0, 0, 2, 0, 0]);
        stream.extend(group1_frame(1002, &[60, 70]));

        let mut whole = FrameAssembler::new(1024);
        whole.extend(&stream);
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 4);

        let mut trickle = FrameAssembler::new(1024);
        let mut frames = Vec::new();
        for byte in &stream {
            trickle.extend(std::slice::from_ref(byte));
            frames.extend(drain(&mut trickle));
        }
        assert_eq!(frames, expected);

        let mut uneven = FrameAssembler::new(1024);
        let mut frames = Vec::new();
        for chunk in stream.chunks(7) {
            uneven.extend(chunk);
            frames.extend(drain(&mut uneven));
        }
        assert_eq!(frames, expected);
    }

    #[test]
    fn test_waits_for_declared_length() {
        let frame = group1_frame(1, &[1, 2]);
        let mut assembler = FrameAssembler::new(1024);

        assembler.extend(&frame[..frame.len() - 1]);
        assert!(assembler.next_frame().is_none());

        assembler.extend(&frame[frame.len() - 1..]);
        assert!(assembler.next_frame().is_some());
    }

    #[test]
    fn test_resyncs_past_garbage() {
        let mut stream = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x09];
        stream.extend(group1_frame(7, &[42]));

        let mut assembler = FrameAssembler::new(1024);
        assembler.extend(&stream);

        let frame = assembler.next_frame().unwrap();
        assert_eq!(frame.kind, HeaderKind::Group1);
        assert_eq!(&frame.payload[..], &[0, 0, 0, 7, 0, 42]);
    }

    #[test]
    fn test_rejects_unknown_kind_and_oversize() {
        let mut stream = vec![0, 0, 0, 2, 9, 0xEE];
        stream.extend([0, 0, 0x10, 0, 1, 0xEE]);
        stream.extend(group1_frame(3, &[5]));

        let mut assembler = FrameAssembler::new(64);
        assembler.extend(&stream);

        let frames = drain(&mut assembler);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], &[0, 0, 0, 3, 0, 5]);
    }
}
