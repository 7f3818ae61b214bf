//! SHDLC frame encoder/decoder.
//!
//! # Frame format
//!
//! ```text
//! request:  0x7E <adr> <cmd> <len> [<data>...] <chk> 0x7E
//! response: 0x7E <adr> <cmd> <state> <len> [<data>...] <chk> 0x7E
//! ```
//!
//! - `chk` is the one's complement of the low byte of the sum of every byte
//!   from `adr` through the last data byte.
//! - Every byte between the delimiters that collides with a reserved value
//!   (`0x7E`, `0x7D`, `0x11`, `0x13`) is sent as `0x7D` followed by a
//!   substitute. The checksum is computed over the unstuffed bytes.
//!
//! Decoding is tolerant of any input: leading noise is skipped, partial
//! frames yield [`Decoded::NeedMoreData`] and malformed frames yield
//! [`Decoded::Invalid`].

use heapless::Vec;
use log::trace;

use crate::command::Opcode;
use crate::constants::*;
use crate::error::{EncodeError, InvalidReason};

/// A fully stuffed frame ready for transmission.
pub type WireFrame = Vec<u8, MAX_WIRE_LEN>;

/// A validated SHDLC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub command: u8,
    /// State byte of a response. `None` for requests.
    pub state: Option<u8>,
    pub data: Vec<u8, MAX_DATA_LEN>,
}

impl Frame {
    /// Error code carried in the state byte, if any.
    pub fn error_code(&self) -> Option<u8> {
        self.state
            .map(|state| state & STATE_ERROR_MASK)
            .filter(|&code| code != 0)
    }

    /// Returns `true` if the device reports flags in its status register.
    pub fn status_flag(&self) -> bool {
        self.state
            .is_some_and(|state| state & STATE_STATUS_FLAG != 0)
    }
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, checksum-valid frame. `consumed` counts the bytes up to
    /// and including the closing delimiter.
    Frame { frame: Frame, consumed: usize },
    /// The buffer holds no frame or only the beginning of one.
    NeedMoreData,
    /// A frame was delimited but violates the format. `consumed` counts the
    /// bytes that belong to the rejected frame.
    Invalid {
        reason: InvalidReason,
        consumed: usize,
    },
}

/// One's complement of the low byte of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Encodes a request after checking `opcode` and `params` against the
/// command table.
pub fn encode(address: u8, opcode: u8, params: &[u8]) -> Result<WireFrame, EncodeError> {
    let op = Opcode::from_repr(opcode).ok_or(EncodeError::InvalidCommand(opcode))?;
    if !op.accepts(params) {
        return Err(EncodeError::InvalidParameter);
    }
    encode_frame(address, opcode, None, params)
}

/// Encodes a frame without consulting the command table.
///
/// Pass a `state` to build a response frame, `None` for a request.
pub fn encode_frame(
    address: u8,
    command: u8,
    state: Option<u8>,
    data: &[u8],
) -> Result<WireFrame, EncodeError> {
    let len = u8::try_from(data.len()).map_err(|_| EncodeError::InvalidParameter)?;

    let (header, header_len) = match state {
        Some(state) => ([address, command, state, len], 4),
        None => ([address, command, len, 0], 3),
    };
    let header = &header[..header_len];

    let chk = !header
        .iter()
        .chain(data)
        .fold(0u8, |sum, &b| sum.wrapping_add(b));

    let mut wire = WireFrame::new();
    push(&mut wire, FRAME_DELIMITER)?;
    for &byte in header.iter().chain(data).chain(core::iter::once(&chk)) {
        stuff(&mut wire, byte)?;
    }
    push(&mut wire, FRAME_DELIMITER)?;

    trace!("Encoded frame: {:02X?}", wire.as_slice());
    Ok(wire)
}

fn push(wire: &mut WireFrame, byte: u8) -> Result<(), EncodeError> {
    wire.push(byte).map_err(|_| EncodeError::InvalidParameter)
}

fn stuff(wire: &mut WireFrame, byte: u8) -> Result<(), EncodeError> {
    match ESCAPE_TABLE.iter().find(|(reserved, _)| *reserved == byte) {
        Some(&(_, substitute)) => {
            push(wire, ESCAPE)?;
            push(wire, substitute)
        }
        None => push(wire, byte),
    }
}

fn unescape(substitute: u8) -> Option<u8> {
    ESCAPE_TABLE
        .iter()
        .find(|(_, s)| *s == substitute)
        .map(|&(reserved, _)| reserved)
}

/// Decodes a request frame (`adr cmd len data chk`).
pub fn decode_request(buf: &[u8]) -> Decoded {
    decode_with_header(buf, 3)
}

/// Decodes a response frame (`adr cmd state len data chk`).
pub fn decode_response(buf: &[u8]) -> Decoded {
    decode_with_header(buf, 4)
}

/// Offset of the delimiter that may open the next frame.
///
/// Bytes before it are noise and can be dropped. Within a run of
/// delimiters only the last one can open a frame. Returns `buf.len()` when
/// the buffer holds no delimiter at all.
pub fn sync(buf: &[u8]) -> usize {
    let Some(mut start) = buf.iter().position(|&b| b == FRAME_DELIMITER) else {
        return buf.len();
    };
    while buf.get(start + 1) == Some(&FRAME_DELIMITER) {
        start += 1;
    }
    start
}

fn decode_with_header(buf: &[u8], header_len: usize) -> Decoded {
    let start = sync(buf);
    if start == buf.len() {
        return Decoded::NeedMoreData;
    }

    let mut body: Vec<u8, MAX_BODY_LEN> = Vec::new();
    let mut expected: Option<usize> = None;
    let mut i = start + 1;

    loop {
        if expected == Some(body.len()) {
            return match buf.get(i) {
                None => Decoded::NeedMoreData,
                Some(&FRAME_DELIMITER) => finish(&body, header_len, i + 1),
                Some(_) => Decoded::Invalid {
                    reason: InvalidReason::MissingTerminator,
                    consumed: i + 1,
                },
            };
        }

        let byte = match buf.get(i) {
            None => return Decoded::NeedMoreData,
            // The closing delimiter came before the declared length was reached.
            Some(&FRAME_DELIMITER) => {
                return Decoded::Invalid {
                    reason: InvalidReason::MalformedLength,
                    consumed: i,
                }
            }
            Some(&ESCAPE) => {
                let Some(&substitute) = buf.get(i + 1) else {
                    return Decoded::NeedMoreData;
                };
                match unescape(substitute) {
                    Some(byte) => {
                        i += 2;
                        byte
                    }
                    None => {
                        return Decoded::Invalid {
                            reason: InvalidReason::InvalidEscape,
                            consumed: i + 2,
                        }
                    }
                }
            }
            Some(&byte) => {
                i += 1;
                byte
            }
        };

        if body.push(byte).is_err() {
            return Decoded::Invalid {
                reason: InvalidReason::MalformedLength,
                consumed: i,
            };
        }

        if expected.is_none() && body.len() == header_len {
            // The length byte is the last one of the header.
            expected = Some(header_len + usize::from(body[header_len - 1]) + 1);
        }
    }
}

fn finish(body: &[u8], header_len: usize, consumed: usize) -> Decoded {
    let (content, chk) = body.split_at(body.len() - 1);
    let computed = checksum(content);
    if computed != chk[0] {
        trace!(
            "Checksum mismatch: computed {:02X}, received {:02X}",
            computed,
            chk[0]
        );
        return Decoded::Invalid {
            reason: InvalidReason::ChecksumMismatch,
            consumed,
        };
    }

    let mut data = Vec::new();
    if data.extend_from_slice(&content[header_len..]).is_err() {
        return Decoded::Invalid {
            reason: InvalidReason::MalformedLength,
            consumed,
        };
    }

    let frame = Frame {
        address: content[0],
        command: content[1],
        state: (header_len == 4).then(|| content[2]),
        data,
    };
    trace!("Decoded frame: {:02X?}", frame);
    Decoded::Frame { frame, consumed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, DeviceInfoKind, OutputFormat};

    fn expect_frame(decoded: Decoded) -> (Frame, usize) {
        match decoded {
            Decoded::Frame { frame, consumed } => (frame, consumed),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    fn expect_invalid(decoded: Decoded) -> InvalidReason {
        match decoded {
            Decoded::Invalid { reason, .. } => reason,
            other => panic!("expected an invalid frame, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_start_measurement_matches_datasheet() {
        let wire = encode(0x00, 0x00, &[0x01, 0x03]).unwrap();
        assert_eq!(wire.as_slice(), &[0x7E, 0x00, 0x00, 0x02, 0x01, 0x03, 0xF9, 0x7E]);
    }

    #[test]
    fn encode_read_measurement_matches_datasheet() {
        let wire = encode(0x00, 0x03, &[]).unwrap();
        assert_eq!(wire.as_slice(), &[0x7E, 0x00, 0x03, 0x00, 0xFC, 0x7E]);
    }

    #[test]
    fn encode_stop_measurement_matches_datasheet() {
        let wire = encode(0x00, 0x01, &[]).unwrap();
        assert_eq!(wire.as_slice(), &[0x7E, 0x00, 0x01, 0x00, 0xFE, 0x7E]);
    }

    #[test]
    fn encode_rejects_unknown_opcode() {
        assert_eq!(encode(0x00, 0x42, &[]), Err(EncodeError::InvalidCommand(0x42)));
    }

    #[test]
    fn encode_rejects_out_of_range_params() {
        assert_eq!(
            encode(0x00, 0x00, &[0x01, 0x07]),
            Err(EncodeError::InvalidParameter)
        );
        assert_eq!(encode(0x00, 0x03, &[0x00]), Err(EncodeError::InvalidParameter));
    }

    #[test]
    fn encode_frame_rejects_oversized_payload() {
        let data = [0u8; 256];
        assert_eq!(
            encode_frame(0x00, 0x03, Some(0), &data),
            Err(EncodeError::InvalidParameter)
        );
    }

    #[test]
    fn stuffing_escapes_reserved_bytes() {
        // Interval 0x7E7D1113 puts every reserved value into the payload.
        let wire = encode(0x00, 0x80, &[0x00, 0x7E, 0x7D, 0x11, 0x13]).unwrap();
        let chk = checksum(&[0x00, 0x80, 0x05, 0x00, 0x7E, 0x7D, 0x11, 0x13]);
        assert_eq!(chk, 0x5B);
        assert_eq!(
            wire.as_slice(),
            &[
                0x7E, 0x00, 0x80, 0x05, 0x00, 0x7D, 0x5E, 0x7D, 0x5D, 0x7D, 0x31, 0x7D, 0x33,
                0x5B, 0x7E
            ]
        );
        // No reserved byte may appear between the delimiters.
        assert!(!wire[1..wire.len() - 1].contains(&FRAME_DELIMITER));
    }

    #[test]
    fn stuffing_applies_to_checksum() {
        // 0x00 + 0x01 + 0x01 + 0x7F = 0x81, !0x81 = 0x7E.
        let wire = encode_frame(0x00, 0x01, None, &[0x7F]).unwrap();
        assert_eq!(wire.as_slice(), &[0x7E, 0x00, 0x01, 0x01, 0x7F, 0x7D, 0x5E, 0x7E]);
        let (frame, _) = expect_frame(decode_request(&wire));
        assert_eq!(frame.data.as_slice(), &[0x7F]);
    }

    // ---------------------------------------------------------------
    // Decoding
    // ---------------------------------------------------------------

    #[test]
    fn request_round_trip_for_every_command() {
        let commands = [
            Command::StartMeasurement(OutputFormat::Float),
            Command::StartMeasurement(OutputFormat::Uint16),
            Command::StopMeasurement,
            Command::ReadMeasurement,
            Command::ReadAutoCleaningInterval,
            Command::WriteAutoCleaningInterval(0x7E7D_1113),
            Command::StartFanCleaning,
            Command::ReadDeviceInfo(DeviceInfoKind::SerialNumber),
            Command::Reset,
        ];
        for command in commands {
            let params = command.params().unwrap();
            let wire = encode(0x00, command.opcode() as u8, &params).unwrap();
            let (frame, consumed) = expect_frame(decode_request(&wire));
            assert_eq!(frame.command, command.opcode() as u8);
            assert_eq!(frame.data.as_slice(), params.as_slice());
            assert_eq!(frame.state, None);
            assert_eq!(consumed, wire.len());
        }
    }

    #[test]
    fn decode_response_with_state() {
        let wire = encode_frame(0x00, 0xD0, Some(0x00), b"00080000\0").unwrap();
        let (frame, _) = expect_frame(decode_response(&wire));
        assert_eq!(frame.address, 0x00);
        assert_eq!(frame.command, 0xD0);
        assert_eq!(frame.state, Some(0x00));
        assert_eq!(frame.error_code(), None);
        assert_eq!(frame.data.as_slice(), b"00080000\0");
    }

    #[test]
    fn decode_reports_error_code_and_status_flag() {
        let wire = encode_frame(0x00, 0x03, Some(0x80 | 0x43), &[]).unwrap();
        let (frame, _) = expect_frame(decode_response(&wire));
        assert_eq!(frame.error_code(), Some(0x43));
        assert!(frame.status_flag());
    }

    #[test]
    fn checksum_flip_in_any_payload_byte_is_detected() {
        let data: [u8; 8] = [0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47];
        let wire = encode_frame(0x00, 0x03, Some(0x00), &data).unwrap();
        // 0x7E, adr, cmd, state, len, then the unstuffed payload bytes.
        for offset in 5..5 + data.len() {
            let mut corrupted = wire.clone();
            corrupted[offset] ^= 0x01;
            assert_eq!(
                expect_invalid(decode_response(&corrupted)),
                InvalidReason::ChecksumMismatch,
                "flip at offset {offset} went unnoticed"
            );
        }
    }

    #[test]
    fn every_strict_prefix_needs_more_data() {
        let wire = encode_frame(0x00, 0x80, Some(0x00), &[0x00, 0x7E, 0x7D, 0x11, 0x13]).unwrap();
        for end in 1..wire.len() {
            assert_eq!(
                decode_response(&wire[..end]),
                Decoded::NeedMoreData,
                "prefix of {end} bytes"
            );
        }
        assert!(matches!(decode_response(&wire), Decoded::Frame { .. }));
    }

    #[test]
    fn leading_noise_is_skipped() {
        let wire = encode_frame(0x00, 0x03, Some(0x00), &[0x01, 0x02]).unwrap();
        let mut buf = std::vec![0x55, 0xAA, 0x00, 0x13];
        buf.extend_from_slice(&wire);
        let (frame, consumed) = expect_frame(decode_response(&buf));
        assert_eq!(frame.data.as_slice(), &[0x01, 0x02]);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn back_to_back_delimiters_collapse() {
        let wire = encode_frame(0x00, 0x03, Some(0x00), &[]).unwrap();
        let mut buf = std::vec![0x7E, 0x7E];
        buf.extend_from_slice(&wire);
        assert!(matches!(decode_response(&buf), Decoded::Frame { .. }));
    }

    #[test]
    fn noise_only_needs_more_data() {
        assert_eq!(decode_response(&[]), Decoded::NeedMoreData);
        assert_eq!(decode_response(&[0x00, 0x55, 0xAA, 0xFF]), Decoded::NeedMoreData);
    }

    #[test]
    fn early_delimiter_is_malformed_length() {
        // Declares 4 data bytes but closes after 1.
        let buf = [0x7E, 0x00, 0x03, 0x00, 0x04, 0x01, 0xF7, 0x7E];
        assert_eq!(expect_invalid(decode_response(&buf)), InvalidReason::MalformedLength);
    }

    #[test]
    fn extra_byte_before_delimiter_is_missing_terminator() {
        let wire = encode_frame(0x00, 0x03, Some(0x00), &[0x01]).unwrap();
        let mut buf = std::vec::Vec::from(&wire[..wire.len() - 1]);
        buf.push(0x42);
        buf.push(FRAME_DELIMITER);
        assert_eq!(
            expect_invalid(decode_response(&buf)),
            InvalidReason::MissingTerminator
        );
    }

    #[test]
    fn unknown_escape_is_invalid() {
        let buf = [0x7E, 0x00, 0x03, 0x00, 0x01, 0x7D, 0x22, 0x00, 0x7E];
        assert_eq!(expect_invalid(decode_response(&buf)), InvalidReason::InvalidEscape);
    }

    #[test]
    fn garbage_never_panics() {
        // A spread of hostile inputs: lone delimiters, dangling escapes,
        // maximal declared lengths, and pseudo-random noise.
        let mut seed: u32 = 0x1234_5678;
        for len in 0..600usize {
            let mut buf = std::vec::Vec::with_capacity(len);
            for _ in 0..len {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                buf.push((seed >> 24) as u8);
            }
            let _ = decode_response(&buf);
            let _ = decode_request(&buf);
        }
        let _ = decode_response(&[0x7E, 0x7D]);
        let _ = decode_response(&[0x7E, 0x00, 0x03, 0x00, 0xFF]);
        let _ = decode_response(&[0x7E; 32]);
    }

    #[test]
    fn sync_finds_frame_start() {
        assert_eq!(sync(&[0x01, 0x02, 0x7E, 0x00]), 2);
        assert_eq!(sync(&[0x7E, 0x7E, 0x7E, 0x00]), 2);
        assert_eq!(sync(&[0x01, 0x02]), 2);
        assert_eq!(sync(&[]), 0);
    }
}
