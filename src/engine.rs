//! Request/response exchange with bounded retries.
//!
//! One logical request runs through
//! `Idle → Sending → AwaitingResponse → Validating → Idle`, looping back to
//! `Sending` after a timeout or an invalid response until the retry bound is
//! reached, at which point it stops in `Failed`. Transport failures and
//! device-reported errors stop the request at once.

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use log::{debug, error, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::constants::RX_BUFFER_LEN;
use crate::error::{Error, Failure, InvalidReason};
use crate::frame::{self, Decoded, Frame, WireFrame};
use crate::rate_limit::{micros_ceil, RateLimiter};
use crate::transport::Transport;

/// Phase of the request currently handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No request in flight.
    Idle,
    /// Waiting on the rate limiter or writing the request.
    Sending,
    /// Reading and decoding response bytes.
    AwaitingResponse,
    /// Checking a decoded frame against the request.
    Validating,
    /// The last request failed.
    Failed,
}

/// Attempts made for the current logical request.
#[derive(Debug, Clone, Copy)]
struct RetryState {
    attempts: u16,
    retries: u8,
}

impl RetryState {
    fn new(retries: u8) -> Self {
        Self {
            attempts: 0,
            retries,
        }
    }

    /// Counts a failed attempt; returns `true` if another one is allowed.
    fn record_failure(&mut self) -> bool {
        self.attempts += 1;
        self.attempts <= u16::from(self.retries)
    }
}

/// Bytes accumulated while waiting for one response.
type RawBuffer = Vec<u8, RX_BUFFER_LEN>;

enum AwaitError<E> {
    Io(E),
    Failed(Failure),
}

/// Sends requests and collects their responses.
///
/// Not reentrant: every method takes `&mut self`, so a single request is
/// in flight per engine.
#[derive(Debug)]
pub struct Engine {
    state: EngineState,
    rate_limiter: RateLimiter,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self {
            state: EngineState::Idle,
            rate_limiter: RateLimiter::new(config.min_interval),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Sends `request` and returns the matching response frame.
    ///
    /// `request` must be a complete encoded frame for `command` addressed to
    /// `config.address`.
    pub async fn transact<T, C, D>(
        &mut self,
        transport: &mut T,
        clock: &C,
        delay: &mut D,
        config: &Config,
        command: u8,
        request: &WireFrame,
    ) -> Result<Frame, Error<T::Error>>
    where
        T: Transport,
        C: Clock,
        D: DelayNs,
    {
        let mut retry = RetryState::new(config.retries);

        loop {
            self.state = EngineState::Sending;
            self.rate_limiter.gate(clock, delay).await;
            debug!("Sending request {:02X?}", request.as_slice());
            if let Err(err) = Self::send(transport, request).await {
                error!("Failed to send request 0x{:02X}: {:?}", command, err);
                self.state = EngineState::Failed;
                return Err(Error::Io(err));
            }
            self.rate_limiter.record_send(clock.now());

            if !config.response_delay.is_zero() {
                delay.delay_us(micros_ceil(config.response_delay)).await;
            }

            self.state = EngineState::AwaitingResponse;
            let failure = match Self::await_response(transport, clock, config).await {
                Ok(frame) => {
                    self.state = EngineState::Validating;
                    match Self::validate(&frame, config.address, command) {
                        Ok(()) => {
                            if frame.status_flag() {
                                warn!("Device status register reports raised flags");
                            }
                            if let Some(code) = frame.error_code() {
                                error!("Device returned error 0x{:02X} for 0x{:02X}", code, command);
                                self.state = EngineState::Failed;
                                return Err(Error::Device { code });
                            }
                            self.state = EngineState::Idle;
                            return Ok(frame);
                        }
                        Err(reason) => Failure::Invalid(reason),
                    }
                }
                Err(AwaitError::Io(err)) => {
                    error!("Failed to read response to 0x{:02X}: {:?}", command, err);
                    self.state = EngineState::Failed;
                    return Err(Error::Io(err));
                }
                Err(AwaitError::Failed(failure)) => failure,
            };

            if !retry.record_failure() {
                error!(
                    "Request 0x{:02X} failed after {} attempts: {}",
                    command, retry.attempts, failure
                );
                self.state = EngineState::Failed;
                return Err(Error::Exhausted {
                    attempts: retry.attempts,
                    last: failure,
                });
            }
            warn!(
                "Attempt {} for request 0x{:02X} failed: {}, retrying",
                retry.attempts, command, failure
            );
        }
    }

    async fn send<T: Transport>(transport: &mut T, request: &[u8]) -> Result<(), T::Error> {
        transport.write(request).await?;
        transport.flush().await
    }

    /// Reads until a complete frame arrives or `read_timeout` passes.
    ///
    /// Invalid candidates are dropped and scanning resumes right after them,
    /// so line noise containing delimiters only costs time.
    async fn await_response<T: Transport, C: Clock>(
        transport: &mut T,
        clock: &C,
        config: &Config,
    ) -> Result<Frame, AwaitError<T::Error>> {
        let deadline = clock.now().saturating_add(config.read_timeout);
        let mut raw = RawBuffer::new();
        let mut chunk = [0u8; 64];
        let mut discarded: Option<InvalidReason> = None;

        loop {
            loop {
                match frame::decode_response(&raw) {
                    Decoded::Frame { frame, .. } => return Ok(frame),
                    Decoded::NeedMoreData => break,
                    Decoded::Invalid { reason, consumed } => {
                        warn!(
                            "Discarding invalid frame ({}): {:02X?}",
                            reason,
                            &raw[..consumed.min(raw.len())]
                        );
                        discarded = Some(reason);
                        discard(&mut raw, consumed);
                    }
                }
            }

            let now = clock.now();
            if now >= deadline {
                match discarded {
                    Some(reason) => debug!(
                        "No complete frame before timeout, last discarded: {}, buffer: {:02X?}",
                        reason,
                        raw.as_slice()
                    ),
                    None => debug!("No complete frame before timeout, buffer: {:02X?}", raw.as_slice()),
                }
                return Err(AwaitError::Failed(Failure::Timeout));
            }

            let n = transport
                .read(&mut chunk, deadline - now)
                .await
                .map_err(AwaitError::Io)?;
            append(&mut raw, &chunk[..n]);
        }
    }

    fn validate(frame: &Frame, address: u8, command: u8) -> Result<(), InvalidReason> {
        if frame.address != address || frame.command != command {
            warn!(
                "Discarding stale frame for 0x{:02X}/0x{:02X}, expected 0x{:02X}/0x{:02X}",
                frame.address, frame.command, address, command
            );
            return Err(InvalidReason::UnexpectedResponse);
        }
        Ok(())
    }
}

/// Appends `bytes` to `raw`, dropping noise that cannot start a frame.
fn append(raw: &mut RawBuffer, bytes: &[u8]) {
    for &byte in bytes {
        let mut pending = byte;
        while let Err(rejected) = raw.push(pending) {
            let start = frame::sync(raw.as_slice());
            // A full buffer starting at a delimiter cannot be a frame.
            discard(raw, if start == 0 { raw.len() } else { start });
            pending = rejected;
        }
    }
}

/// Removes the first `count` bytes of `raw`.
fn discard(raw: &mut RawBuffer, count: usize) {
    let len = raw.len();
    let count = count.min(len);
    raw.copy_within(count.., 0);
    raw.truncate(len - count);
}
