#![cfg_attr(not(any(test, feature = "std")), no_std)]

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{debug, error, info};

mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod command;
pub use command::*;

pub mod clock;
pub use clock::Clock;

pub mod engine;
pub use engine::EngineState;

pub mod frame;
pub use frame::{Decoded, Frame};

pub mod measurement;
pub use measurement::{MassConcentration, Measurement, NumberConcentration};

pub mod rate_limit;

pub mod transport;
pub use transport::{SerialError, SerialTransport, Transport};

#[cfg(test)]
mod mock;

use engine::Engine;

/// Represents a Sensirion SPS030 particulate matter sensor.
///
/// This struct provides methods to start and stop measurements, read
/// samples and query device information over the SHDLC UART protocol.
///
/// Only one request is in flight at a time: every method takes `&mut self`.
/// To share a sensor between tasks, wrap the whole instance in a mutex.
///
/// # Type Parameters
///
/// * `T`: The transport to the sensor, see [`SerialTransport`].
/// * `C`: A monotonic [`Clock`], used for timeouts, rate limiting and timestamps.
/// * `D`: A delay provider implementing `embedded_hal_async::delay::DelayNs`.
pub struct Sps030<T, C, D> {
    transport: T,
    clock: C,
    delay: D,
    config: Config,
    engine: Engine,
    format: OutputFormat,
}

impl<T, C, D> Sps030<T, C, D>
where
    T: Transport,
    C: Clock,
    D: DelayNs,
{
    /// Creates a new `Sps030` sensor instance.
    ///
    /// No bytes are exchanged; the connection parameters are logged.
    ///
    /// # Arguments
    ///
    /// * `transport`: The byte channel to the sensor.
    /// * `clock`: The monotonic clock used for deadlines and timestamps.
    /// * `delay`: The delay provider used for rate limiting.
    /// * `config`: The address, timings and retry bound.
    ///
    /// # Returns
    ///
    /// A new `Sps030` instance.
    pub fn new(transport: T, clock: C, delay: D, config: Config) -> Self {
        info!("Address: 0x{:02X}", config.address);
        info!("Baud rate: {}", config.baud_rate);
        info!("Serial timeout: {} ms", config.serial_timeout.as_millis());
        info!("Read timeout: {} ms", config.read_timeout.as_millis());
        info!("Retries: {}", config.retries);
        info!("Minimum interval: {} ms", config.min_interval.as_millis());

        Self {
            transport,
            clock,
            delay,
            engine: Engine::new(&config),
            config,
            format: OutputFormat::default(),
        }
    }

    /// Starts continuous measurement.
    ///
    /// Later calls to [`Sps030::read_measurement`] decode in this format.
    ///
    /// # Arguments
    ///
    /// * `format`: The `OutputFormat` the sensor reports values in.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sensor acknowledged the command.
    /// * `Err(Error)` if the request failed; the previous format is kept.
    pub async fn start_measurement(&mut self, format: OutputFormat) -> Result<(), Error<T::Error>> {
        debug!("Starting measurement ({:?})", format);
        self.execute(Command::StartMeasurement(format)).await?;
        self.format = format;
        Ok(())
    }

    /// Stops measurement; the sensor returns to idle mode.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sensor acknowledged the command.
    /// * `Err(Error)` on a transport, device or retry failure.
    pub async fn stop_measurement(&mut self) -> Result<(), Error<T::Error>> {
        debug!("Stopping measurement");
        self.execute(Command::StopMeasurement).await.map(|_| ())
    }

    /// Reads the latest sample.
    ///
    /// # Returns
    ///
    /// * `Ok(Measurement)` stamped with the driver clock.
    /// * `Err(Error::Decode(DecodeError::NoNewData))` when the sensor has not
    ///   produced a new sample since the previous read.
    /// * `Err(Error)` on a transport, device or retry failure.
    pub async fn read_measurement(&mut self) -> Result<Measurement, Error<T::Error>> {
        let frame = self.execute(Command::ReadMeasurement).await?;
        let measurement = measurement::decode(&frame.data, self.format, self.clock.now())
            .inspect_err(|e| error!("Failed to decode measurement: {}", e))?;
        info!("Measurement: {:?}", measurement);
        Ok(measurement)
    }

    /// Reads a device information string.
    ///
    /// # Arguments
    ///
    /// * `kind`: Which string to read.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` with the ASCII text up to the first NUL.
    /// * `Err(Error::Decode(DecodeError::InvalidString))` for non-ASCII content.
    pub async fn read_device_info(
        &mut self,
        kind: DeviceInfoKind,
    ) -> Result<String<DEVICE_INFO_LEN>, Error<T::Error>> {
        let frame = self.execute(Command::ReadDeviceInfo(kind)).await?;
        let info = measurement::decode_device_info(&frame.data)?;
        debug!("Device info {:?}: {}", kind, info);
        Ok(info)
    }

    /// Reads the product type string, see [`Sps030::read_device_info`].
    pub async fn product_type(&mut self) -> Result<String<DEVICE_INFO_LEN>, Error<T::Error>> {
        self.read_device_info(DeviceInfoKind::ProductType).await
    }

    /// Reads the serial number string, see [`Sps030::read_device_info`].
    pub async fn serial_number(&mut self) -> Result<String<DEVICE_INFO_LEN>, Error<T::Error>> {
        self.read_device_info(DeviceInfoKind::SerialNumber).await
    }

    /// Reads the automatic fan cleaning interval.
    ///
    /// # Returns
    ///
    /// * `Ok(u32)` with the interval in seconds.
    /// * `Err(Error)` if the request failed or the payload is not four bytes.
    pub async fn read_auto_cleaning_interval(&mut self) -> Result<u32, Error<T::Error>> {
        let frame = self.execute(Command::ReadAutoCleaningInterval).await?;
        Ok(measurement::decode_auto_cleaning_interval(&frame.data)?)
    }

    /// Sets the automatic fan cleaning interval.
    ///
    /// # Arguments
    ///
    /// * `seconds`: The interval in seconds. `0` disables automatic cleaning.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sensor acknowledged the change.
    /// * `Err(Error)` on a transport, device or retry failure.
    pub async fn write_auto_cleaning_interval(&mut self, seconds: u32) -> Result<(), Error<T::Error>> {
        debug!("Setting auto-cleaning interval to {} s", seconds);
        self.execute(Command::WriteAutoCleaningInterval(seconds))
            .await
            .map(|_| ())
    }

    /// Starts a fan cleaning cycle.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the cycle started.
    /// * `Err(Error::Device { .. })` if the sensor is not measuring.
    pub async fn start_fan_cleaning(&mut self) -> Result<(), Error<T::Error>> {
        debug!("Starting fan cleaning");
        self.execute(Command::StartFanCleaning).await.map(|_| ())
    }

    /// Soft-resets the sensor.
    pub async fn reset(&mut self) -> Result<(), Error<T::Error>> {
        debug!("Resetting sensor");
        self.execute(Command::Reset).await?;
        self.format = OutputFormat::default();
        Ok(())
    }

    /// Phase of the request engine.
    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transport, consuming the driver.
    pub fn release(self) -> T {
        self.transport
    }

    async fn execute(&mut self, command: Command) -> Result<Frame, Error<T::Error>> {
        let opcode = command.opcode() as u8;
        let request = frame::encode(self.config.address, opcode, &command.params()?)?;
        self.engine
            .transact(
                &mut self.transport,
                &self.clock,
                &mut self.delay,
                &self.config,
                opcode,
                &request,
            )
            .await
    }
}
