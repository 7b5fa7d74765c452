//! Command wire format.
//!
//! ```text
//! byte 0-3  u32 big-endian, number of bytes that follow
//! byte 4    header kind (0 = Command, 1 = Group1, 2 = Group2)
//! byte 5    command code
//! byte 6..  command payload (0, 1 or 4 bytes)
//! ```
//!
//! Pure functions, no I/O.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use iaware_messages::{Command, DeciHertz, HeaderKind, Hertz};

use crate::error::{Error, Result};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;
/// Length prefix plus header kind.
pub const FRAME_HEADER_LEN: usize = LENGTH_PREFIX_LEN + 1;

fn payload_len(code: u8) -> Option<usize> {
    match code {
        0 | 1 => Some(0),
        2 => Some(4),
        3 => Some(1),
        _ => None,
    }
}

/// Encode a command into a complete length-prefixed frame. Never fails.
pub fn encode(command: Command) -> Bytes {
    let body_len = 2 + payload_len(command.code()).unwrap_or(0);
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body_len);

    buf.put_u32(body_len as u32);
    buf.put_u8(HeaderKind::Command.as_byte());
    buf.put_u8(command.code());
    match command {
        Command::StartStream | Command::StopStream => {}
        Command::SetSamplingFrequency(hz) => buf.put_u32(hz.as_hz()),
        Command::SetSendDataFrequency(tenths) => buf.put_u8(tenths.0),
    }

    buf.freeze()
}

/// Read the length prefix and header kind from the front of `bytes`.
///
/// Returns the declared length, the header kind and whatever follows the
/// header byte. Fewer than five bytes is a framing boundary: the caller
/// should buffer more input and retry.
pub fn decode_frame_header(bytes: &[u8]) -> Result<(u32, HeaderKind, &[u8])> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(Error::MalformedFrame(format!(
            "need {FRAME_HEADER_LEN} header bytes, have {}",
            bytes.len()
        )));
    }

    let mut cursor = bytes;
    let declared = cursor.get_u32();
    let kind_byte = cursor.get_u8();
    let kind = HeaderKind::from_byte(kind_byte)
        .ok_or_else(|| Error::MalformedFrame(format!("unknown header kind {kind_byte}")))?;
    if declared == 0 {
        return Err(Error::MalformedFrame("zero length prefix".into()));
    }

    Ok((declared, kind, cursor))
}

/// Decode a frame body (everything after the length prefix) as a command.
///
/// The body must hold exactly the header byte, the command code and the
/// payload that code requires.
pub fn decode_command_body(body: &[u8]) -> Result<Command> {
    let mut cursor = body;
    if cursor.remaining() < 2 {
        return Err(Error::MalformedFrame(format!(
            "command body of {} bytes is too short",
            body.len()
        )));
    }

    let kind = cursor.get_u8();
    if kind != HeaderKind::Command.as_byte() {
        return Err(Error::MalformedFrame(format!(
            "header kind {kind} is not a command"
        )));
    }

    let code = cursor.get_u8();
    let expected = payload_len(code)
        .ok_or_else(|| Error::MalformedFrame(format!("unknown command code {code}")))?;
    if cursor.remaining() != expected {
        return Err(Error::MalformedFrame(format!(
            "command {code} expects {expected} payload bytes, got {}",
            cursor.remaining()
        )));
    }

    let command = match code {
        0 => Command::StartStream,
        1 => Command::StopStream,
        2 => Command::SetSamplingFrequency(Hertz(cursor.get_u32())),
        _ => Command::SetSendDataFrequency(DeciHertz(cursor.get_u8())),
    };
    Ok(command)
}

/// Decode a complete command frame, rejecting a length prefix that does not
/// match the bytes the command actually consumes.
pub fn decode_command(frame: &[u8]) -> Result<Command> {
    let (declared, _kind, _rest) = decode_frame_header(frame)?;
    let body = &frame[LENGTH_PREFIX_LEN..];
    if declared as usize != body.len() {
        return Err(Error::MalformedFrame(format!(
            "length prefix {declared} does not match {} body bytes",
            body.len()
        )));
    }
    decode_command_body(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_and_stop() {
        assert_eq!(
            &encode(Command::StartStream)[..],
            &[0x00, 0x00, 0x00, 0x02, 0x00, 0x00]
        );
        assert_eq!(
            &encode(Command::StopStream)[..],
            &[0x00, 0x00, 0x00, 0x02, 0x00, 0x01]
        );
    }

    #[test]
    fn test_encode_sampling_frequency() {
        assert_eq!(
            &encode(Command::SetSamplingFrequency(Hertz(1000)))[..],
            &[0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x00, 0x00, 0x03, 0xE8]
        );
    }

    #[test]
    fn test_encode_send_data_frequency() {
        assert_eq!(
            &encode(Command::send_data_frequency(20.0))[..],
            &[0x00, 0x00, 0x00, 0x03, 0x00, 0x03, 0xC8]
        );
        // Saturates instead of wrapping
        assert_eq!(
            &encode(Command::send_data_frequency(40.0))[..],
            &[0x00, 0x00, 0x00, 0x03, 0x00, 0x03, 0xFF]
        );
    }

    #[test]
    fn test_decode_inverts_conformance_bytes() {
        let cases: [(&[u8], Command); 4] = [
            (&[0, 0, 0, 2, 0, 0], Command::StartStream),
            (&[0, 0, 0, 2, 0, 1], Command::StopStream),
            (
                &[0, 0, 0, 6, 0, 2, 0, 0, 0x03, 0xE8],
                Command::SetSamplingFrequency(Hertz(1000)),
            ),
            (
                &[0, 0, 0, 3, 0, 3, 0xC8],
                Command::SetSendDataFrequency(DeciHertz(200)),
            ),
        ];

        for (bytes, command) in cases {
            assert_eq!(decode_command(bytes).unwrap(), command);
            assert_eq!(decode_command(&encode(command)).unwrap(), command);
        }
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        // StartStream with a trailing byte the code does not consume
        let result = decode_command(&[0, 0, 0, 3, 0, 0, 0xAA]);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));

        // Prefix claims more than was supplied
        let result = decode_command(&[0, 0, 0, 6, 0, 2, 0, 0]);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));

        // Unknown command code
        let result = decode_command(&[0, 0, 0, 2, 0, 9]);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_frame_header() {
        let (len, kind, rest) = decode_frame_header(&[0, 0, 0, 7, 1, 0xAB, 0xCD]).unwrap();
        assert_eq!(len, 7);
        assert_eq!(kind, HeaderKind::Group1);
        assert_eq!(rest, &[0xAB, 0xCD]);
    }

    #[test]
    fn test_decode_frame_header_needs_five_bytes() {
        assert!(matches!(
            decode_frame_header(&[0, 0, 0, 2]),
            Err(Error::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame_header(&[0, 0, 0, 2, 7]),
            Err(Error::MalformedFrame(_))
        ));
    }
}
