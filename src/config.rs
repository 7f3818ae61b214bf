use core::time::Duration;

use crate::constants::*;

/// Configuration settings for the SPS030 driver.
///
/// Every timing and retry knob the driver uses lives here; the protocol
/// logic holds no defaults of its own.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// SHDLC address of the sensor.
    pub address: u8,
    /// Baud rate the host serial port is opened with. The sensor only supports 115200.
    pub baud_rate: u32,
    /// Upper bound on a single write to the serial port.
    pub serial_timeout: Duration,
    /// How long to wait for a complete response frame after a send.
    pub read_timeout: Duration,
    /// Number of re-sends after the first attempt of a request.
    pub retries: u8,
    /// Minimum time between two consecutive sends.
    pub min_interval: Duration,
    /// Pause between a send and the first read of the response.
    pub response_delay: Duration,
}

impl Config {
    /// Creates a new `Config` instance.
    ///
    /// # Arguments
    ///
    /// * `address` - The SHDLC address of the sensor.
    ///
    /// # Returns
    ///
    /// A new `Config` instance with the given address and the default timings.
    pub fn new(address: u8) -> Config {
        Config {
            address,
            ..Config::default()
        }
    }

    /// Sets the sensor address.
    ///
    /// # Arguments
    ///
    /// * `address` - The SHDLC address to set.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Sets the baud rate reported for the serial port.
    ///
    /// # Arguments
    ///
    /// * `baud_rate` - The baud rate the host port was opened with.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the serial write timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound on a single write.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn serial_timeout(mut self, timeout: Duration) -> Self {
        self.serial_timeout = timeout;
        self
    }

    /// Sets the response read timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Window for a complete response frame. `Duration::MAX` waits forever.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets how many times a failed request is re-sent.
    ///
    /// A request is attempted at most `retries + 1` times.
    ///
    /// # Arguments
    ///
    /// * `retries` - Number of re-sends after the first attempt.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the minimum interval between two sends.
    ///
    /// # Arguments
    ///
    /// * `interval` - Minimum time between two consecutive sends.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sets the pause between a send and the first read.
    ///
    /// # Arguments
    ///
    /// * `delay` - Pause before the first read of a response.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }
}

/// Provides default configuration values for the SPS030 sensor.
impl Default for Config {
    /// Address `0x00`, 115200 baud, 2 s serial timeout, 1 s read timeout,
    /// 3 retries, 1 s between sends and a 20 ms response delay.
    fn default() -> Config {
        Config {
            address: DEFAULT_ADDRESS,
            baud_rate: DEFAULT_BAUD_RATE,
            serial_timeout: DEFAULT_SERIAL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retries: DEFAULT_RETRIES,
            min_interval: DEFAULT_MIN_INTERVAL,
            response_delay: DEFAULT_RESPONSE_DELAY,
        }
    }
}
