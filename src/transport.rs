use core::fmt::Debug;
use core::time::Duration;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};

use crate::rate_limit::micros_ceil;

/// A duplex byte channel to the sensor.
///
/// Implementations know nothing about frames: they move bytes and bound
/// every read by the given timeout.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: Debug;

    /// Writes all of `bytes`.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads whatever arrives into `buf` before `timeout` elapses.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;

    /// Waits until every written byte has left the transmit buffer.
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Error of a [`SerialTransport`].
#[derive(PartialEq, Eq, Debug)]
pub enum SerialError<E> {
    /// The underlying port failed.
    Io(E),
    /// The port did not accept the bytes within the serial timeout.
    WriteTimeout,
}

/// [`Transport`] over an `embedded-io-async` serial port.
///
/// Reads race the port against `delay`, so a silent sensor never blocks
/// the caller past the timeout. Writes are bounded by `write_timeout`.
///
/// # Type Parameters
///
/// * `S`: The serial port, implementing `embedded_io_async::Read` and `Write`.
/// * `D`: The timer used to bound reads and writes.
pub struct SerialTransport<S, D> {
    serial: S,
    delay: D,
    write_timeout: Duration,
}

impl<S, D> SerialTransport<S, D>
where
    S: Read + Write,
    D: DelayNs,
{
    /// Creates a new `SerialTransport`.
    ///
    /// `write_timeout` is usually [`Config::serial_timeout`](crate::Config::serial_timeout).
    pub fn new(serial: S, delay: D, write_timeout: Duration) -> Self {
        Self {
            serial,
            delay,
            write_timeout,
        }
    }

    /// Returns the serial port, consuming the transport.
    pub fn release(self) -> S {
        self.serial
    }
}

impl<S, D> Transport for SerialTransport<S, D>
where
    S: Read + Write,
    D: DelayNs,
{
    type Error = SerialError<S::Error>;

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let timeout = micros_ceil(self.write_timeout);
        match select(self.serial.write_all(bytes), self.delay.delay_us(timeout)).await {
            Either::First(result) => result.map_err(SerialError::Io),
            Either::Second(()) => Err(SerialError::WriteTimeout),
        }
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        let timeout = micros_ceil(timeout);
        match select(self.serial.read(buf), self.delay.delay_us(timeout)).await {
            Either::First(result) => result.map_err(SerialError::Io),
            Either::Second(()) => Ok(0),
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.serial.flush().await.map_err(SerialError::Io)
    }
}
