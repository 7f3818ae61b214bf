use core::time::Duration;

use heapless::String;

use crate::command::OutputFormat;
use crate::constants::DEVICE_INFO_LEN;
use crate::error::DecodeError;

/// Mass concentrations in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassConcentration {
    pub pm1_0: f32,
    pub pm2_5: f32,
    pub pm4_0: f32,
    pub pm10: f32,
}

/// Number concentrations in #/cm³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberConcentration {
    pub pm0_5: f32,
    pub pm1_0: f32,
    pub pm2_5: f32,
    pub pm4_0: f32,
    pub pm10: f32,
}

/// A single sample read from the SPS030.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub mass: MassConcentration,
    pub number: NumberConcentration,
    /// Typical particle size in µm.
    pub typical_particle_size: f32,
    /// Clock reading taken when the sample was decoded.
    pub timestamp: Duration,
}

const FIELDS: usize = 10;

impl OutputFormat {
    /// Payload size of a measurement in this format.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Float => FIELDS * 4,
            Self::Uint16 => FIELDS * 2,
        }
    }
}

/// Decodes a read measurement payload.
///
/// The field order is PM1.0, PM2.5, PM4.0, PM10 mass concentrations,
/// PM0.5, PM1.0, PM2.5, PM4.0, PM10 number concentrations, then the
/// typical particle size. All fields are big-endian. In the integer format
/// the typical particle size is sent in nm.
pub fn decode(
    payload: &[u8],
    format: OutputFormat,
    timestamp: Duration,
) -> Result<Measurement, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::NoNewData);
    }
    let expected = format.payload_len();
    if payload.len() != expected {
        return Err(DecodeError::UnexpectedLength {
            expected,
            actual: payload.len(),
        });
    }

    let mut values = [0f32; FIELDS];
    match format {
        OutputFormat::Float => {
            for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(4)) {
                *value = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        OutputFormat::Uint16 => {
            for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(2)) {
                *value = f32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
            }
            values[9] /= 1000.0;
        }
    }

    Ok(Measurement {
        mass: MassConcentration {
            pm1_0: values[0],
            pm2_5: values[1],
            pm4_0: values[2],
            pm10: values[3],
        },
        number: NumberConcentration {
            pm0_5: values[4],
            pm1_0: values[5],
            pm2_5: values[6],
            pm4_0: values[7],
            pm10: values[8],
        },
        typical_particle_size: values[9],
        timestamp,
    })
}

/// Decodes a NUL-terminated ASCII device information string.
pub fn decode_device_info(payload: &[u8]) -> Result<String<DEVICE_INFO_LEN>, DecodeError> {
    let text = match payload.iter().position(|&b| b == 0) {
        Some(end) => &payload[..end],
        None => payload,
    };
    if !text.is_ascii() {
        return Err(DecodeError::InvalidString);
    }
    let text = core::str::from_utf8(text).map_err(|_| DecodeError::InvalidString)?;
    let mut info = String::new();
    info.push_str(text).map_err(|_| DecodeError::UnexpectedLength {
        expected: DEVICE_INFO_LEN,
        actual: text.len(),
    })?;
    Ok(info)
}

/// Decodes the auto-cleaning interval, in seconds.
pub fn decode_auto_cleaning_interval(payload: &[u8]) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| DecodeError::UnexpectedLength {
            expected: 4,
            actual: payload.len(),
        })?;
    Ok(u32::from_be_bytes(bytes))
}
