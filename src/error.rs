use core::fmt::{Debug, Display, Formatter};

use strum::FromRepr;

/// Error returned by [`Sps030`](crate::Sps030) operations.
///
/// The generic parameter `E` carries the transport-specific error.
#[derive(PartialEq, Debug)]
pub enum Error<E> {
    /// The transport failed to write, flush or read. Never retried.
    Io(E),
    /// The request could not be encoded.
    Encode(EncodeError),
    /// Every attempt failed; `last` is the reason of the final one.
    Exhausted { attempts: u16, last: Failure },
    /// The response payload does not have the shape expected for the command.
    Decode(DecodeError),
    /// The sensor answered with a non-zero error code in its state byte.
    Device { code: u8 },
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "transport error: {err:?}"),
            Self::Encode(err) => write!(f, "cannot encode request: {err}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "request failed after {attempts} attempts: {last}")
            }
            Self::Decode(err) => write!(f, "cannot decode response: {err}"),
            Self::Device { code } => match DeviceErrorCode::from_repr(*code) {
                Some(known) => write!(f, "device error 0x{code:02X}: {known}"),
                None => write!(f, "device error 0x{code:02X}: unknown error"),
            },
        }
    }
}

impl<E: Debug> core::error::Error for Error<E> {}

impl<E> From<EncodeError> for Error<E> {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl<E> From<DecodeError> for Error<E> {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

/// Reason a request could not be turned into a frame.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum EncodeError {
    /// The opcode is not part of the command table.
    InvalidCommand(u8),
    /// The request data does not match what the opcode accepts.
    InvalidParameter,
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::InvalidCommand(opcode) => write!(f, "unsupported command 0x{opcode:02X}"),
            Self::InvalidParameter => write!(f, "parameter out of range"),
        }
    }
}

impl core::error::Error for EncodeError {}

/// Why a received frame was rejected.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum InvalidReason {
    ChecksumMismatch,
    /// The frame ended before its declared length, or declared more than fits.
    MalformedLength,
    /// Extra bytes where the closing delimiter was expected.
    MissingTerminator,
    /// An escape byte followed by a byte outside the escape table.
    InvalidEscape,
    /// A well-formed frame answering a different address or command.
    UnexpectedResponse,
}

impl Display for InvalidReason {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::MalformedLength => write!(f, "malformed length"),
            Self::MissingTerminator => write!(f, "missing terminator"),
            Self::InvalidEscape => write!(f, "invalid escape sequence"),
            Self::UnexpectedResponse => write!(f, "response does not match request"),
        }
    }
}

/// Outcome of a single failed attempt. Both kinds are retried.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Failure {
    /// No complete frame arrived within the read timeout.
    Timeout,
    Invalid(InvalidReason),
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for response"),
            Self::Invalid(reason) => write!(f, "invalid response ({reason})"),
        }
    }
}

/// The payload of a valid frame could not be interpreted.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum DecodeError {
    UnexpectedLength { expected: usize, actual: usize },
    /// The sensor has no new measurement since the last read.
    NoNewData,
    /// A device information string is not NUL-terminated ASCII.
    InvalidString,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::UnexpectedLength { expected, actual } => {
                write!(f, "unexpected payload length {actual}, expected {expected}")
            }
            Self::NoNewData => write!(f, "no new measurement available"),
            Self::InvalidString => write!(f, "invalid device information string"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Error codes reported in the state byte of a response.
#[derive(FromRepr, PartialEq, Eq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum DeviceErrorCode {
    WrongDataLength = 0x01,
    UnknownCommand = 0x02,
    NoAccessRight = 0x03,
    IllegalCommandParameter = 0x04,
    InternalArgumentOutOfRange = 0x28,
    CommandNotAllowed = 0x43,
}

impl Display for DeviceErrorCode {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::WrongDataLength => write!(f, "wrong data length for command"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::NoAccessRight => write!(f, "no access right for command"),
            Self::IllegalCommandParameter => {
                write!(f, "illegal command parameter or parameter out of allowed range")
            }
            Self::InternalArgumentOutOfRange => write!(f, "internal function argument out of range"),
            Self::CommandNotAllowed => write!(f, "command not allowed in current state"),
        }
    }
}
