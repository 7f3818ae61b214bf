use core::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::warn;

use crate::clock::Clock;

/// Enforces a minimum interval between two sends to the sensor.
///
/// The sensor produces a new sample once per second; polling faster only
/// returns empty frames or stale values.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_send: Option<Duration>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: None,
        }
    }

    /// Time left before the next send is allowed at `now`.
    pub fn remaining(&self, now: Duration) -> Duration {
        match self.last_send {
            Some(last) => last.saturating_add(self.min_interval).saturating_sub(now),
            None => Duration::ZERO,
        }
    }

    /// Waits until a send is allowed.
    ///
    /// Does not record a send: call [`RateLimiter::record_send`] once the
    /// request actually went out, so that gating without sending never
    /// shifts the window.
    pub async fn gate<C: Clock, D: DelayNs>(&self, clock: &C, delay: &mut D) {
        let mut remaining = self.remaining(clock.now());
        if remaining.is_zero() {
            return;
        }
        warn!(
            "Reading too frequently, forcing delay of {} ms",
            remaining.as_millis()
        );
        // A single delay is capped at `u32::MAX` µs.
        while !remaining.is_zero() {
            delay.delay_us(micros_ceil(remaining)).await;
            remaining = self.remaining(clock.now());
        }
    }

    /// Records that a request was dispatched at `now`.
    pub fn record_send(&mut self, now: Duration) {
        self.last_send = Some(now);
    }

    pub fn last_send(&self) -> Option<Duration> {
        self.last_send
    }
}

/// `duration` in microseconds, rounded up and saturated to `u32`.
pub(crate) fn micros_ceil(duration: Duration) -> u32 {
    let micros = duration.as_nanos().div_ceil(1_000);
    u32::try_from(micros).unwrap_or(u32::MAX)
}
