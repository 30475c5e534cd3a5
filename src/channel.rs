//! The AUX channel handle and the native DPCD transaction engine.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::crc::CrcWorker;
use crate::dpcd;
use crate::error::{AuxError, Result};
use crate::i2c::I2cConfig;
use crate::msg::{
    AuxData, AuxMessage, AUX_NATIVE_READ, AUX_NATIVE_REPLY_ACK, AUX_NATIVE_REPLY_MASK,
    AUX_NATIVE_WRITE,
};

/// Inter-retry delay, in microseconds. Each sleeping retry waits a
/// randomized `[AUX_RETRY_INTERVAL_US, AUX_RETRY_INTERVAL_US + 100]`.
pub(crate) const AUX_RETRY_INTERVAL_US: u64 = 500;

/// Native transactions are retried up to this many times. Seven (the I2C
/// minimum) is not enough for some 4k monitors.
const NATIVE_RETRIES: u32 = 32;

pub(crate) fn sleep_range_us(min_us: u64, max_us: u64) {
    let us = rand::thread_rng().gen_range(min_us..=max_us);
    thread::sleep(Duration::from_micros(us));
}

pub(crate) fn retry_sleep() {
    sleep_range_us(AUX_RETRY_INTERVAL_US, AUX_RETRY_INTERVAL_US + 100);
}

/// Single hardware AUX exchange, supplied by the embedding driver.
///
/// One call performs one request/reply cycle on the wire and returns the
/// number of payload bytes moved. The implementation must not mutate any
/// message field except `reply` (and the contents of a `Read` payload), and
/// must report channel conditions through the [`AuxError`] taxonomy:
/// [`AuxError::Busy`] when the channel is momentarily occupied,
/// [`AuxError::Timeout`] when the sink does not answer.
pub trait AuxTransfer: Send {
    fn transfer(&mut self, msg: &mut AuxMessage<'_>) -> Result<usize>;
}

/// DPCD routing for a channel that sits behind a multi-stream (MST) hub.
///
/// Remote channels cannot issue raw AUX transactions; reads and writes are
/// forwarded through the hub's sideband protocol instead, which lives
/// outside this crate.
pub trait MstTransport: Send {
    fn dpcd_read(&mut self, offset: u32, buffer: &mut [u8]) -> Result<usize>;
    fn dpcd_write(&mut self, offset: u32, buffer: &[u8]) -> Result<usize>;
}

pub(crate) enum Transport {
    Native(Box<dyn AuxTransfer>),
    Remote(Box<dyn MstTransport>),
}

/// Exclusive hold on the AUX bus.
///
/// The same mutex serializes native DPCD access and the emulated I2C bus,
/// so holding the guard keeps the channel quiet. Channel operations taken
/// from the holding thread would deadlock; the guard is an exclusion token,
/// not a transaction context.
pub struct BusGuard<'a>(pub(crate) MutexGuard<'a, Transport>);

/// One DisplayPort AUX channel.
///
/// Owns the bus lock, the retry engines and the I2C tunables. One value
/// exists per physical channel; wrap it in an [`Arc`](std::sync::Arc) to
/// share it with the CRC monitor or other threads.
pub struct AuxChannel {
    name: String,
    remote: bool,
    transport: Mutex<Transport>,
    i2c: I2cConfig,
    i2c_defer_count: AtomicU32,
    i2c_nack_count: AtomicU32,
    pub(crate) crc: Mutex<Option<CrcWorker>>,
}

impl AuxChannel {
    /// A directly attached channel driven by `transfer`.
    pub fn new(name: impl Into<String>, transfer: Box<dyn AuxTransfer>) -> Self {
        Self::with_config(name, transfer, I2cConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        transfer: Box<dyn AuxTransfer>,
        config: I2cConfig,
    ) -> Self {
        Self {
            name: name.into(),
            remote: false,
            transport: Mutex::new(Transport::Native(transfer)),
            i2c: config,
            i2c_defer_count: AtomicU32::new(0),
            i2c_nack_count: AtomicU32::new(0),
            crc: Mutex::new(None),
        }
    }

    /// A channel behind an MST hub; DPCD access is routed through `mst`.
    pub fn new_remote(name: impl Into<String>, mst: Box<dyn MstTransport>) -> Self {
        Self {
            name: name.into(),
            remote: true,
            transport: Mutex::new(Transport::Remote(mst)),
            i2c: I2cConfig::default(),
            i2c_defer_count: AtomicU32::new(0),
            i2c_nack_count: AtomicU32::new(0),
            crc: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// I2C emulation tunables; safe to adjust while the channel is in use.
    pub fn i2c_config(&self) -> &I2cConfig {
        &self.i2c
    }

    /// Number of I2C-level DEFER replies seen since attach.
    pub fn i2c_defer_count(&self) -> u32 {
        self.i2c_defer_count.load(Ordering::Relaxed)
    }

    /// Number of I2C-level NACK replies seen since attach.
    pub fn i2c_nack_count(&self) -> u32 {
        self.i2c_nack_count.load(Ordering::Relaxed)
    }

    pub(crate) fn note_i2c_defer(&self) {
        self.i2c_defer_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_i2c_nack(&self) {
        self.i2c_nack_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Block until the bus is exclusively held.
    pub fn lock_bus(&self) -> BusGuard<'_> {
        BusGuard(self.transport.lock().unwrap())
    }

    /// Take the bus if it is free, without blocking.
    pub fn try_lock_bus(&self) -> Option<BusGuard<'_>> {
        self.transport.try_lock().ok().map(BusGuard)
    }

    /// Read `buffer.len()` bytes of DPCD starting at `offset`.
    ///
    /// Returns the number of bytes transferred. A nacked request or an
    /// exhausted retry budget reports [`AuxError::Io`]; an acknowledged but
    /// short reply reports [`AuxError::Protocol`]. Transfer errors other
    /// than [`AuxError::Busy`] (retried in place) propagate as-is.
    pub fn dpcd_read(&self, offset: u32, buffer: &mut [u8]) -> Result<usize> {
        let ret = if self.remote {
            self.mst_read(offset, buffer)
        } else {
            // Some sinks corrupt the first DPCD access after entering power
            // save mode, e.g. by filling the reply with one repeated byte.
            // A throw-away read keeps the corruption out of data we care
            // about until the sink re-enters power save.
            let mut probe = [0u8; 1];
            self.native_access(AUX_NATIVE_READ, dpcd::DPCD_REV, AuxData::Read(&mut probe))
                .and_then(|_| {
                    self.native_access(AUX_NATIVE_READ, offset, AuxData::Read(&mut buffer[..]))
                })
        };
        self.dump_access(AUX_NATIVE_READ, offset, &buffer[..], &ret);
        ret
    }

    /// Write `buffer` to the DPCD starting at `offset`.
    ///
    /// Same return and error contract as [`AuxChannel::dpcd_read`].
    pub fn dpcd_write(&self, offset: u32, buffer: &[u8]) -> Result<usize> {
        let ret = if self.remote {
            self.mst_write(offset, buffer)
        } else {
            self.native_access(AUX_NATIVE_WRITE, offset, AuxData::Write(buffer))
        };
        self.dump_access(AUX_NATIVE_WRITE, offset, buffer, &ret);
        ret
    }

    pub fn dpcd_read_byte(&self, offset: u32) -> Result<u8> {
        let mut value = [0u8; 1];
        self.dpcd_read(offset, &mut value)?;
        Ok(value[0])
    }

    pub fn dpcd_write_byte(&self, offset: u32, value: u8) -> Result<()> {
        self.dpcd_write(offset, &[value])?;
        Ok(())
    }

    /// Read the 6-byte link status region (DPCD 0x202-0x207).
    pub fn read_link_status(&self) -> Result<[u8; dpcd::LINK_STATUS_SIZE]> {
        let mut status = [0u8; dpcd::LINK_STATUS_SIZE];
        self.dpcd_read(dpcd::LANE0_1_STATUS, &mut status)?;
        Ok(status)
    }

    /// Answer a TEST_EDID_READ compliance request with the checksum of the
    /// last real EDID block.
    ///
    /// Returns `Ok(false)` when the sink has no automated-test request
    /// pending; that is an expected state, not a failure.
    pub fn send_real_edid_checksum(&self, real_edid_checksum: u8) -> Result<bool> {
        let auto_test_req =
            self.dpcd_read_byte(dpcd::DEVICE_SERVICE_IRQ_VECTOR)? & dpcd::AUTOMATED_TEST_REQUEST;
        let link_edid_read = self.dpcd_read_byte(dpcd::TEST_REQUEST)? & dpcd::TEST_LINK_EDID_READ;
        if auto_test_req == 0 || link_edid_read == 0 {
            tracing::debug!("{}: source DUT does not support TEST_EDID_READ", self.name);
            return Ok(false);
        }

        self.dpcd_write_byte(dpcd::DEVICE_SERVICE_IRQ_VECTOR, auto_test_req)?;
        self.dpcd_write_byte(dpcd::TEST_EDID_CHECKSUM, real_edid_checksum)?;
        self.dpcd_write_byte(dpcd::TEST_RESPONSE, dpcd::TEST_EDID_CHECKSUM_WRITE)?;
        Ok(true)
    }

    /// Run one native transaction through the retry engine.
    ///
    /// Up to [`NATIVE_RETRIES`] attempts; [`AuxError::Busy`] retries with no
    /// delay, every other failure sleeps the randomized retry interval
    /// first. The error returned after exhaustion is the *first* one
    /// observed, since later retries may fail differently and obscure the
    /// root cause.
    fn native_access(&self, request: u8, offset: u32, data: AuxData<'_>) -> Result<usize> {
        let size = data.len();
        let mut msg = AuxMessage {
            address: offset,
            request,
            reply: 0,
            data,
        };

        let mut transport = self.transport.lock().unwrap();
        let hw = match &mut *transport {
            Transport::Native(hw) => hw.as_mut(),
            Transport::Remote(_) => {
                return Err(AuxError::InvalidArgument(
                    "native access on a remote aux channel",
                ))
            }
        };

        let mut first_err = None;
        let mut last_err = None;
        for _ in 0..NATIVE_RETRIES {
            match last_err {
                None | Some(AuxError::Busy) => {}
                Some(_) => retry_sleep(),
            }

            let err = match hw.transfer(&mut msg) {
                Ok(n) => {
                    if msg.reply & AUX_NATIVE_REPLY_MASK == AUX_NATIVE_REPLY_ACK {
                        if n == size {
                            return Ok(n);
                        }
                        AuxError::Protocol {
                            expected: size,
                            got: n,
                        }
                    } else {
                        AuxError::Io
                    }
                }
                Err(err) => err,
            };
            first_err.get_or_insert(err);
            last_err = Some(err);
        }

        let err = first_err.unwrap_or(AuxError::Io);
        tracing::debug!(
            "{}: too many retries, giving up; first error: {}",
            self.name,
            err
        );
        Err(err)
    }

    fn mst_read(&self, offset: u32, buffer: &mut [u8]) -> Result<usize> {
        match &mut *self.transport.lock().unwrap() {
            Transport::Remote(mst) => mst.dpcd_read(offset, buffer),
            Transport::Native(_) => Err(AuxError::InvalidArgument(
                "remote access on a native aux channel",
            )),
        }
    }

    fn mst_write(&self, offset: u32, buffer: &[u8]) -> Result<usize> {
        match &mut *self.transport.lock().unwrap() {
            Transport::Remote(mst) => mst.dpcd_write(offset, buffer),
            Transport::Native(_) => Err(AuxError::InvalidArgument(
                "remote access on a native aux channel",
            )),
        }
    }

    /// Trace every transaction: direction, offset, count and the first 20
    /// payload bytes. Observability only, not part of any contract.
    fn dump_access(&self, request: u8, offset: u32, payload: &[u8], ret: &Result<usize>) {
        let arrow = if request == AUX_NATIVE_READ { "->" } else { "<-" };
        match ret {
            Ok(n) => tracing::trace!(
                "{}: {:#07x} AUX {} (ret={:3}) {}",
                self.name,
                offset,
                arrow,
                n,
                hex_prefix(payload, (*n).min(20)),
            ),
            Err(err) => {
                tracing::trace!("{}: {:#07x} AUX {} ({})", self.name, offset, arrow, err)
            }
        }
    }
}

fn hex_prefix(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..limit.min(bytes.len())];
    let mut out = String::with_capacity(shown.len() * 3);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}
