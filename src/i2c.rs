//! I2C bus emulation over AUX transactions.
//!
//! EDID and other DDC traffic reaches a DisplayPort sink as I2C tunnelled
//! through AUX. Each logical I2C message becomes a bare-address packet that
//! opens the transaction, a series of bounded data chunks, and a closing
//! bare-address packet with the MOT bit cleared. Sinks may answer any chunk
//! with an I2C-level DEFER or a short reply, so chunk sizes adapt downward
//! and write remainders are drained with WRITE_STATUS_UPDATE requests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::channel::{retry_sleep, AuxChannel, AuxTransfer, Transport, AUX_RETRY_INTERVAL_US};
use crate::error::{AuxError, Result};
use crate::msg::{
    AuxData, AuxMessage, AUX_I2C_MOT, AUX_I2C_READ, AUX_I2C_REPLY_ACK, AUX_I2C_REPLY_DEFER,
    AUX_I2C_REPLY_MASK, AUX_I2C_REPLY_NACK, AUX_I2C_WRITE, AUX_I2C_WRITE_STATUS_UPDATE,
    AUX_MAX_PAYLOAD_BYTES, AUX_NATIVE_REPLY_ACK, AUX_NATIVE_REPLY_DEFER, AUX_NATIVE_REPLY_MASK,
    AUX_NATIVE_REPLY_NACK,
};

/// Some real-world devices need a very low assumed bus speed; 10 kHz keeps
/// the retry budget generous enough for them.
pub const I2C_DEFAULT_SPEED_KHZ: u32 = 10;

const I2C_MIN_SPEED_KHZ: u32 = 1;
const I2C_MAX_SPEED_KHZ: u32 = 400;

/// Process-wide I2C emulation tunables.
///
/// Both values may be adjusted while transfers are in flight; readers
/// tolerate the race (last writer wins, nothing is safety-critical).
pub struct I2cConfig {
    speed_khz: AtomicU32,
    transfer_size: AtomicUsize,
}

impl I2cConfig {
    pub fn new(speed_khz: u32, transfer_size: usize) -> Self {
        let config = Self {
            speed_khz: AtomicU32::new(0),
            transfer_size: AtomicUsize::new(0),
        };
        config.set_speed_khz(speed_khz);
        config.set_transfer_size(transfer_size);
        config
    }

    /// Assumed speed of the emulated I2C bus, in kHz (1-400).
    pub fn speed_khz(&self) -> u32 {
        self.speed_khz
            .load(Ordering::Relaxed)
            .clamp(I2C_MIN_SPEED_KHZ, I2C_MAX_SPEED_KHZ)
    }

    pub fn set_speed_khz(&self, speed_khz: u32) {
        self.speed_khz.store(
            speed_khz.clamp(I2C_MIN_SPEED_KHZ, I2C_MAX_SPEED_KHZ),
            Ordering::Relaxed,
        );
    }

    /// Bytes per I2C-over-AUX chunk (1-16).
    ///
    /// Some DP->DVI dual link adapters require the chunks to be as large as
    /// possible or the transfer never succeeds, hence the maximum default.
    pub fn transfer_size(&self) -> usize {
        self.transfer_size
            .load(Ordering::Relaxed)
            .clamp(1, AUX_MAX_PAYLOAD_BYTES)
    }

    pub fn set_transfer_size(&self, transfer_size: usize) {
        self.transfer_size
            .store(transfer_size.clamp(1, AUX_MAX_PAYLOAD_BYTES), Ordering::Relaxed);
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::new(I2C_DEFAULT_SPEED_KHZ, AUX_MAX_PAYLOAD_BYTES)
    }
}

#[derive(Debug)]
pub enum I2cOp<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// One logical message of an emulated I2C transfer.
#[derive(Debug)]
pub struct I2cMsg<'a> {
    /// 7- or 10-bit I2C device address.
    pub addr: u16,
    /// Issue a STOP after this message instead of a repeated START.
    pub stop: bool,
    pub op: I2cOp<'a>,
}

impl<'a> I2cMsg<'a> {
    pub fn read(addr: u16, buffer: &'a mut [u8]) -> Self {
        Self {
            addr,
            stop: false,
            op: I2cOp::Read(buffer),
        }
    }

    pub fn write(addr: u16, buffer: &'a [u8]) -> Self {
        Self {
            addr,
            stop: false,
            op: I2cOp::Write(buffer),
        }
    }

    pub fn len(&self) -> usize {
        match &self.op {
            I2cOp::Read(buf) => buf.len(),
            I2cOp::Write(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn request(&self) -> u8 {
        let mut request = match self.op {
            I2cOp::Read(_) => AUX_I2C_READ,
            I2cOp::Write(_) => AUX_I2C_WRITE,
        };
        if !self.stop {
            request |= AUX_I2C_MOT;
        }
        request
    }
}

const AUX_PRECHARGE_LEN: u32 = 10; // 10 to 16
const AUX_SYNC_LEN: u32 = 16 + 4; // preamble + AUX_SYNC_END
const AUX_STOP_LEN: u32 = 4;
const AUX_CMD_LEN: u32 = 4;
const AUX_ADDRESS_LEN: u32 = 20;
const AUX_REPLY_PAD_LEN: u32 = 4;
const AUX_LENGTH_LEN: u32 = 8;

const I2C_START_LEN: u32 = 1;
const I2C_STOP_LEN: u32 = 1;
const I2C_ADDR_LEN: u32 = 9; // ADDRESS + R/W + ACK/NACK
const I2C_DATA_LEN: u32 = 9; // DATA + ACK/NACK

fn div_round_up(n: u32, d: u32) -> u32 {
    (n + d - 1) / d
}

/// Best-case duration of the AUX request in usec (AUX bitrate is 1 MHz, so
/// bit counts are microseconds).
fn aux_req_duration_us(msg: &AuxMessage<'_>) -> u32 {
    let mut len = AUX_PRECHARGE_LEN
        + AUX_SYNC_LEN
        + AUX_STOP_LEN
        + AUX_CMD_LEN
        + AUX_ADDRESS_LEN
        + AUX_LENGTH_LEN;
    if msg.request & AUX_I2C_READ == 0 {
        len += msg.data.len() as u32 * 8;
    }
    len
}

fn aux_reply_duration_us(msg: &AuxMessage<'_>) -> u32 {
    let mut len = AUX_PRECHARGE_LEN + AUX_SYNC_LEN + AUX_STOP_LEN + AUX_CMD_LEN + AUX_REPLY_PAD_LEN;
    // A read reply carries what was asked for; a write reply carries 0 or 1
    // data bytes, assume 0 for the best case.
    if msg.request & AUX_I2C_READ != 0 {
        len += msg.data.len() as u32 * 8;
    }
    len
}

/// Worst-case duration of the equivalent transfer on a real I2C bus at the
/// assumed speed. Does not model the MOT bit; every message is costed with
/// a START, ADDRESS and STOP.
fn i2c_msg_duration_us(msg: &AuxMessage<'_>, speed_khz: u32) -> u32 {
    div_round_up(
        (I2C_START_LEN + I2C_ADDR_LEN + msg.data.len() as u32 * I2C_DATA_LEN + I2C_STOP_LEN)
            * 1000,
        speed_khz,
    )
}

/// How many retries a chunk deserves, from the ratio of the emulated bus
/// time to the AUX round-trip time.
fn i2c_retry_count(msg: &AuxMessage<'_>, speed_khz: u32) -> u32 {
    let aux_time_us = aux_req_duration_us(msg) + aux_reply_duration_us(msg);
    let i2c_time_us = i2c_msg_duration_us(msg, speed_khz);
    div_round_up(i2c_time_us, aux_time_us + AUX_RETRY_INTERVAL_US as u32)
}

/// On an I2C DEFER or a short I2C ACK to a write, the remainder of the
/// message is drained with WRITE_STATUS_UPDATE requests.
fn write_status_update(msg: &mut AuxMessage<'_>) {
    if msg.request & !AUX_I2C_MOT == AUX_I2C_WRITE {
        msg.request &= AUX_I2C_MOT;
        msg.request |= AUX_I2C_WRITE_STATUS_UPDATE;
    }
}

impl AuxChannel {
    /// Emulate a multi-message I2C transfer over this channel.
    ///
    /// Holds the bus for the whole transfer. Returns the number of messages
    /// completed (all of them, or the first error). The closing
    /// bare-address packet is sent best-effort regardless of how the
    /// transfer went, so a sink is never left mid-transaction.
    pub fn i2c_xfer(&self, msgs: &mut [I2cMsg<'_>]) -> Result<usize> {
        let num = msgs.len();
        let mut bus = self.lock_bus();
        let hw = match &mut *bus.0 {
            Transport::Native(hw) => hw.as_mut(),
            Transport::Remote(_) => {
                return Err(AuxError::InvalidArgument(
                    "i2c-over-aux requires a native (non-MST) channel",
                ))
            }
        };

        let mut close_address = 0u32;
        let mut close_request = AUX_I2C_WRITE;
        let mut err = None;

        'msgs: for m in msgs.iter_mut() {
            let address = u32::from(m.addr);
            let request = m.request();
            close_address = address;
            close_request = request;

            // A zero sized message specifies an address-only (bare address)
            // transaction, which opens the transfer.
            let mut bare = AuxMessage {
                address,
                request,
                reply: 0,
                data: AuxData::None,
            };
            if let Err(e) = self.i2c_do_msg(hw, &mut bare) {
                err = Some(e);
                break 'msgs;
            }

            // Each chunk as large as configured, shrinking to whatever the
            // hardware actually delivered when it gives a short reply.
            let mut transfer_size = self.i2c_config().transfer_size();
            let len = m.len();
            let mut done = 0;
            while done < len {
                let size = transfer_size.min(len - done);
                let data = match &mut m.op {
                    I2cOp::Read(buf) => AuxData::Read(&mut buf[done..done + size]),
                    I2cOp::Write(buf) => AuxData::Write(&buf[done..done + size]),
                };
                let mut chunk = AuxMessage {
                    address,
                    request,
                    reply: 0,
                    data,
                };
                match self.i2c_drain_msg(hw, &mut chunk) {
                    Ok(n) => transfer_size = n,
                    Err(e) => {
                        err = Some(e);
                        break 'msgs;
                    }
                }
                done += size;
            }
        }

        // Close out with a bare address packet with MOT cleared.
        let mut close = AuxMessage {
            address: close_address,
            request: close_request & !AUX_I2C_MOT,
            reply: 0,
            data: AuxData::None,
        };
        let _ = self.i2c_do_msg(hw, &mut close);

        match err {
            None => Ok(num),
            Some(e) => Err(e),
        }
    }

    /// Keep re-issuing a chunk until all of it has been transferred.
    ///
    /// Returns the recommended size for the next chunk: the requested size,
    /// or the smallest partial reply seen along the way.
    fn i2c_drain_msg(&self, hw: &mut dyn AuxTransfer, msg: &mut AuxMessage<'_>) -> Result<usize> {
        let mut ret = msg.data.len();
        while !msg.data.is_empty() {
            let requested = msg.data.len();
            let n = self.i2c_do_msg(hw, msg)?;
            if n == 0 {
                return Err(AuxError::Protocol {
                    expected: requested,
                    got: 0,
                });
            }
            if n < requested && n < ret {
                tracing::debug!(
                    "{}: partial i2c reply: requested {} bytes got {}",
                    self.name(),
                    requested,
                    n
                );
                ret = n;
            }
            msg.data.advance(n);
        }
        Ok(ret)
    }

    /// Transfer a single I2C-over-AUX message, retrying as the replies
    /// dictate.
    ///
    /// A source is required to retry at least seven times on DEFER before
    /// giving up; the budget also accounts for the assumed I2C bus speed,
    /// and each I2C-level DEFER earns one bonus retry (up to seven).
    fn i2c_do_msg(&self, hw: &mut dyn AuxTransfer, msg: &mut AuxMessage<'_>) -> Result<usize> {
        let max_retries = 7u32.max(i2c_retry_count(msg, self.i2c_config().speed_khz()));

        let mut defer_i2c = 0u32;
        let mut retry = 0u32;
        while retry < max_retries + defer_i2c {
            retry += 1;

            let n = match hw.transfer(msg) {
                Ok(n) => n,
                Err(AuxError::Busy) => continue,
                Err(AuxError::Timeout) => {
                    // Timeouts are usually normal behavior, e.g. probing a
                    // connector with no device attached; keep them quiet.
                    tracing::trace!("{}: transaction timed out", self.name());
                    return Err(AuxError::Timeout);
                }
                Err(err) => {
                    tracing::debug!("{}: transaction failed: {}", self.name(), err);
                    return Err(err);
                }
            };

            match msg.reply & AUX_NATIVE_REPLY_MASK {
                AUX_NATIVE_REPLY_ACK => {
                    // Not enough on its own, the I2C-level reply still has
                    // to be checked.
                }
                AUX_NATIVE_REPLY_NACK => {
                    tracing::debug!(
                        "{}: native nack (result={}, size={})",
                        self.name(),
                        n,
                        msg.data.len()
                    );
                    return Err(AuxError::RemoteIo);
                }
                AUX_NATIVE_REPLY_DEFER => {
                    tracing::debug!("{}: native defer", self.name());
                    retry_sleep();
                    continue;
                }
                _ => {
                    tracing::error!("{}: invalid native reply {:#04x}", self.name(), msg.reply);
                    return Err(AuxError::RemoteIo);
                }
            }

            match msg.reply & AUX_I2C_REPLY_MASK {
                AUX_I2C_REPLY_ACK => {
                    if n != msg.data.len() {
                        write_status_update(msg);
                    }
                    return Ok(n);
                }
                AUX_I2C_REPLY_NACK => {
                    tracing::debug!(
                        "{}: i2c nack (result={}, size={})",
                        self.name(),
                        n,
                        msg.data.len()
                    );
                    self.note_i2c_nack();
                    return Err(AuxError::RemoteIo);
                }
                AUX_I2C_REPLY_DEFER => {
                    tracing::debug!("{}: i2c defer", self.name());
                    self.note_i2c_defer();
                    if defer_i2c < 7 {
                        defer_i2c += 1;
                    }
                    retry_sleep();
                    write_status_update(msg);
                    continue;
                }
                _ => {
                    tracing::error!("{}: invalid i2c reply {:#04x}", self.name(), msg.reply);
                    return Err(AuxError::RemoteIo);
                }
            }
        }

        tracing::debug!("{}: too many retries, giving up", self.name());
        Err(AuxError::RemoteIo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retries_for(request: u8, size: usize, speed_khz: u32) -> u32 {
        let mut buf = vec![0u8; size];
        let data = if request & AUX_I2C_READ != 0 {
            AuxData::Read(&mut buf)
        } else {
            AuxData::Write(&buf)
        };
        let m = AuxMessage {
            address: 0x50,
            request,
            reply: 0,
            data,
        };
        i2c_retry_count(&m, speed_khz)
    }

    #[test]
    fn bare_address_estimate_stays_under_the_defer_minimum() {
        // 11 i2c bit times at 10 kHz vs a 108 us AUX round trip.
        assert_eq!(retries_for(AUX_I2C_WRITE | AUX_I2C_MOT, 0, 10), 2);
    }

    #[test]
    fn slow_bus_full_chunk_read_needs_more_than_the_minimum() {
        // 155 i2c bit times at 10 kHz, AUX round trip 236 us + 500 us
        // retry interval.
        assert_eq!(retries_for(AUX_I2C_READ | AUX_I2C_MOT, 16, 10), 22);
    }

    #[test]
    fn fast_bus_collapses_to_the_minimum() {
        assert_eq!(retries_for(AUX_I2C_READ | AUX_I2C_MOT, 16, 400), 1);
    }

    #[test]
    fn status_update_rewrite_only_touches_writes() {
        let mut m = AuxMessage {
            address: 0x50,
            request: AUX_I2C_WRITE | AUX_I2C_MOT,
            reply: 0,
            data: AuxData::None,
        };
        write_status_update(&mut m);
        assert_eq!(m.request, AUX_I2C_WRITE_STATUS_UPDATE | AUX_I2C_MOT);

        // Idempotent: a second defer must not rewrite again.
        write_status_update(&mut m);
        assert_eq!(m.request, AUX_I2C_WRITE_STATUS_UPDATE | AUX_I2C_MOT);

        let mut m = AuxMessage {
            address: 0x50,
            request: AUX_I2C_READ | AUX_I2C_MOT,
            reply: 0,
            data: AuxData::None,
        };
        write_status_update(&mut m);
        assert_eq!(m.request, AUX_I2C_READ | AUX_I2C_MOT);
    }

    #[test]
    fn config_clamps_both_tunables() {
        let config = I2cConfig::new(0, 0);
        assert_eq!(config.speed_khz(), 1);
        assert_eq!(config.transfer_size(), 1);

        config.set_speed_khz(100_000);
        config.set_transfer_size(4096);
        assert_eq!(config.speed_khz(), 400);
        assert_eq!(config.transfer_size(), AUX_MAX_PAYLOAD_BYTES);
    }
}
