use heapless::Vec;
use strum::FromRepr;

use crate::constants::*;
use crate::error::EncodeError;

/// Opcodes of the commands the sensor accepts.
#[derive(FromRepr, PartialEq, Eq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Opcode {
    StartMeasurement = CMD_START_MEASUREMENT,
    StopMeasurement = CMD_STOP_MEASUREMENT,
    ReadMeasurement = CMD_READ_MEASUREMENT,
    AutoCleaningInterval = CMD_AUTO_CLEANING_INTERVAL,
    StartFanCleaning = CMD_START_FAN_CLEANING,
    DeviceInformation = CMD_DEVICE_INFORMATION,
    Reset = CMD_RESET,
}

impl Opcode {
    /// Returns `true` if `data` is an accepted parameter block for this opcode.
    pub fn accepts(self, data: &[u8]) -> bool {
        match self {
            Self::StartMeasurement => {
                matches!(data, [SUBCMD_START_MEASUREMENT, format] if OutputFormat::from_repr(*format).is_some())
            }
            Self::StopMeasurement | Self::ReadMeasurement | Self::StartFanCleaning | Self::Reset => {
                data.is_empty()
            }
            Self::AutoCleaningInterval => {
                matches!(data.len(), 1 | 5) && data[0] == SUBCMD_AUTO_CLEANING_INTERVAL
            }
            Self::DeviceInformation => {
                matches!(data, [kind] if DeviceInfoKind::from_repr(*kind).is_some())
            }
        }
    }
}

/// Format of the values returned by [`Command::ReadMeasurement`], chosen
/// when the measurement is started.
#[derive(FromRepr, PartialEq, Eq, Copy, Clone, Debug, Default)]
#[repr(u8)]
pub enum OutputFormat {
    /// Big-endian IEEE754 floats.
    #[default]
    Float = FORMAT_FLOAT,
    /// Big-endian unsigned 16-bit integers. Requires firmware 2.0 or later.
    Uint16 = FORMAT_UINT16,
}

/// Selects which device information string to read.
#[derive(FromRepr, PartialEq, Eq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum DeviceInfoKind {
    ProductType = INFO_PRODUCT_TYPE,
    SerialNumber = INFO_SERIAL_NUMBER,
}

/// A request understood by the sensor, with its parameters.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Command {
    StartMeasurement(OutputFormat),
    StopMeasurement,
    ReadMeasurement,
    ReadAutoCleaningInterval,
    /// Interval in seconds; `0` disables automatic fan cleaning.
    WriteAutoCleaningInterval(u32),
    StartFanCleaning,
    ReadDeviceInfo(DeviceInfoKind),
    Reset,
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::StartMeasurement(_) => Opcode::StartMeasurement,
            Self::StopMeasurement => Opcode::StopMeasurement,
            Self::ReadMeasurement => Opcode::ReadMeasurement,
            Self::ReadAutoCleaningInterval | Self::WriteAutoCleaningInterval(_) => {
                Opcode::AutoCleaningInterval
            }
            Self::StartFanCleaning => Opcode::StartFanCleaning,
            Self::ReadDeviceInfo(_) => Opcode::DeviceInformation,
            Self::Reset => Opcode::Reset,
        }
    }

    /// Request data sent after the length byte.
    pub fn params(&self) -> Result<Vec<u8, MAX_PARAMS_LEN>, EncodeError> {
        let params = match *self {
            Self::StartMeasurement(format) => {
                Vec::from_slice(&[SUBCMD_START_MEASUREMENT, format as u8])
            }
            Self::ReadAutoCleaningInterval => Vec::from_slice(&[SUBCMD_AUTO_CLEANING_INTERVAL]),
            Self::WriteAutoCleaningInterval(seconds) => {
                let [b0, b1, b2, b3] = seconds.to_be_bytes();
                Vec::from_slice(&[SUBCMD_AUTO_CLEANING_INTERVAL, b0, b1, b2, b3])
            }
            Self::ReadDeviceInfo(kind) => Vec::from_slice(&[kind as u8]),
            Self::StopMeasurement | Self::ReadMeasurement | Self::StartFanCleaning | Self::Reset => {
                Ok(Vec::new())
            }
        };
        params.map_err(|()| EncodeError::InvalidParameter)
    }
}
