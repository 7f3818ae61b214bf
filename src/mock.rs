//! Test doubles: a manually advanced clock, a delay that advances it, and a
//! scripted sensor speaking SHDLC.

use core::cell::Cell;
use core::time::Duration;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::clock::Clock;
use crate::frame::encode_frame;
use crate::transport::Transport;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Delay that returns at once after advancing a [`MockClock`].
///
/// Clones share the running total of requested sleep time.
#[derive(Debug, Clone)]
pub struct MockDelay {
    clock: MockClock,
    total: Rc<Cell<Duration>>,
}

impl MockDelay {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            total: Rc::default(),
        }
    }

    /// Sum of every delay requested so far.
    pub fn total(&self) -> Duration {
        self.total.get()
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let by = Duration::from_nanos(u64::from(ns));
        self.clock.advance(by);
        self.total.set(self.total.get() + by);
    }
}

/// What the mock sensor does after receiving a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Deliver these bytes, one read per chunk.
    Chunks(Vec<Vec<u8>>),
    /// Never answer.
    Silent,
    /// Stream pseudo-random bytes, with frequent frame delimiters and escapes.
    Garbage,
    /// Fail the next read.
    ReadError,
}

impl Reply {
    /// A single response frame delivered in one read.
    pub fn frame(address: u8, command: u8, state: u8, data: &[u8]) -> Self {
        Self::Chunks(std::vec![response(address, command, state, data)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    WriteFailed,
    ReadFailed,
}

/// Time a garbage read takes on the mock clock.
const GARBAGE_READ_TIME: Duration = Duration::from_millis(50);

/// A scripted sensor.
///
/// Every write consumes the next [`Reply`]; once the script is exhausted the
/// sensor stays silent. Silent reads advance the clock by the full timeout.
#[derive(Debug)]
pub struct MockSensor {
    clock: MockClock,
    script: VecDeque<Reply>,
    pending: VecDeque<Vec<u8>>,
    garbage: bool,
    noise: Lcg,
    read_error: bool,
    fail_writes: bool,
    sent: Vec<Vec<u8>>,
    flushes: usize,
}

impl MockSensor {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            script: VecDeque::new(),
            pending: VecDeque::new(),
            garbage: false,
            noise: Lcg(0x2545_F491),
            read_error: false,
            fail_writes: false,
            sent: Vec::new(),
            flushes: 0,
        }
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.script.push_back(reply);
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every request written so far, one entry per write.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Transport for MockSensor {
    type Error = MockError;

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MockError::WriteFailed);
        }
        self.sent.push(bytes.to_vec());
        self.pending.clear();
        self.garbage = false;
        self.read_error = false;
        match self.script.pop_front().unwrap_or(Reply::Silent) {
            Reply::Chunks(chunks) => self.pending = chunks.into(),
            Reply::Silent => {}
            Reply::Garbage => self.garbage = true,
            Reply::ReadError => self.read_error = true,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        if self.read_error {
            return Err(MockError::ReadFailed);
        }
        if let Some(mut chunk) = self.pending.pop_front() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.pending.push_front(chunk.split_off(n));
            }
            return Ok(n);
        }
        if self.garbage {
            let n = buf.len().min(16);
            for byte in &mut buf[..n] {
                *byte = self.noise.next_byte();
            }
            self.clock.advance(GARBAGE_READ_TIME.min(timeout));
            return Ok(n);
        }
        self.clock.advance(timeout);
        Ok(0)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

/// Deterministic line noise. About one byte in eight is a delimiter and
/// one in sixteen an escape.
#[derive(Debug, Clone, Copy)]
struct Lcg(u32);

impl Lcg {
    fn next_byte(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        match self.0 >> 28 {
            0 | 1 => 0x7E,
            2 => 0x7D,
            _ => (self.0 >> 16) as u8,
        }
    }
}

/// Encodes a response frame.
pub fn response(address: u8, command: u8, state: u8, data: &[u8]) -> Vec<u8> {
    match encode_frame(address, command, Some(state), data) {
        Ok(wire) => wire.to_vec(),
        Err(err) => panic!("cannot encode mock response: {err}"),
    }
}

/// Payload of a float-format measurement.
pub fn float_payload(values: [f32; 10]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}
