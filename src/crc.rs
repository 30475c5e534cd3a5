//! Background capture of frame CRCs from the sink.
//!
//! With TEST_SINK_START set, the sink computes a CRC over each transmitted
//! frame and exposes it in the TEST_CRC registers together with a 4-bit
//! counter of completed CRCs. The monitor polls once per vertical blank of
//! the owning display pipe, emitting a [`CrcSample`] whenever the counter
//! has advanced, until capture is stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crate::channel::{sleep_range_us, AuxChannel};
use crate::dpcd;
use crate::error::{AuxError, Result};

/// CRC of one frame, one 16-bit value per color component (RGB, or CrYCb
/// for YCbCr transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcSample {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl CrcSample {
    /// Two little-endian bytes per component.
    pub(crate) fn from_bytes(raw: [u8; 6]) -> Self {
        Self {
            r: u16::from_le_bytes([raw[0], raw[1]]),
            g: u16::from_le_bytes([raw[2], raw[3]]),
            b: u16::from_le_bytes([raw[4], raw[5]]),
        }
    }
}

/// The display pipe whose frames are being CRC'd.
///
/// Supplied by the embedding driver. `wait_for_vblank` must return within
/// roughly one frame period (and promptly once `crc_open` turns false), or
/// [`stop_crc`] cannot complete its flush. `add_crc_sample` hands the
/// sample to the consumer, typically a ring buffer.
pub trait DisplayPipe: Send + Sync {
    /// Block until the next vertical blank of this pipe.
    fn wait_for_vblank(&self);
    /// Whether the consumer still wants samples.
    fn crc_open(&self) -> bool;
    /// Deliver one captured sample.
    fn add_crc_sample(&self, sample: CrcSample);
}

pub(crate) struct CrcWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl AuxChannel {
    /// Read one CRC if the sink has a new one.
    ///
    /// `Ok(None)` means the CRC-available counter has not advanced since
    /// the last sample, i.e. the sink is not ready yet.
    fn get_crc(&self, last_count: &mut u8) -> Result<Option<[u8; 6]>> {
        let sink = self.dpcd_read_byte(dpcd::TEST_SINK)?;
        if sink & dpcd::TEST_SINK_START == 0 {
            tracing::warn!("{}: TEST_SINK capture bit is not set", self.name());
        }

        let misc = self.dpcd_read_byte(dpcd::TEST_SINK_MISC)?;
        let count = misc & dpcd::TEST_COUNT_MASK;
        if count == *last_count {
            return Ok(None);
        }
        *last_count = count;

        // 6 bytes of CRC data, 2 bytes per component (RGB or CrYCb).
        let mut raw = [0u8; 6];
        self.dpcd_read(dpcd::TEST_CRC_R_CR, &mut raw)?;
        Ok(Some(raw))
    }
}

/// Start capturing frame CRCs of `pipe` through `aux`.
///
/// Sets the sink's capture bit and spawns the polling worker. Fails with
/// [`AuxError::InvalidArgument`] when a capture is already running on this
/// channel.
pub fn start_crc(aux: &Arc<AuxChannel>, pipe: Arc<dyn DisplayPipe>) -> Result<()> {
    let mut slot = aux.crc.lock().unwrap();
    if slot.is_some() {
        return Err(AuxError::InvalidArgument("crc capture already running"));
    }

    let sink = aux.dpcd_read_byte(dpcd::TEST_SINK)?;
    aux.dpcd_write_byte(dpcd::TEST_SINK, sink | dpcd::TEST_SINK_START)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let aux = Arc::clone(aux);
        let stop = Arc::clone(&stop);
        thread::spawn(move || crc_poll_loop(&aux, &*pipe, &stop))
    };
    *slot = Some(CrcWorker { stop, handle });
    Ok(())
}

/// Stop capturing frame CRCs on `aux`.
///
/// Clears the sink's capture bit and joins the polling worker; once this
/// returns, no further sample will reach the pipe for this capture session.
pub fn stop_crc(aux: &AuxChannel) -> Result<()> {
    let sink = aux.dpcd_read_byte(dpcd::TEST_SINK)?;
    aux.dpcd_write_byte(dpcd::TEST_SINK, sink & !dpcd::TEST_SINK_START)?;

    let worker = aux.crc.lock().unwrap().take();
    if let Some(worker) = worker {
        worker.stop.store(true, Ordering::Relaxed);
        if worker.handle.join().is_err() {
            tracing::error!("{}: crc poll worker panicked", aux.name());
        }
    }
    Ok(())
}

fn crc_poll_loop(aux: &AuxChannel, pipe: &dyn DisplayPipe, stop: &AtomicBool) {
    let mut crc_count = 0u8;

    while pipe.crc_open() && !stop.load(Ordering::Relaxed) {
        pipe.wait_for_vblank();
        // Capture may have been torn down while we slept.
        if !pipe.crc_open() || stop.load(Ordering::Relaxed) {
            break;
        }

        let mut res = aux.get_crc(&mut crc_count);
        if matches!(res, Ok(None)) {
            // The counter often lags the vblank; give the sink a moment and
            // poll once more before writing this interval off.
            sleep_range_us(1000, 2000);
            res = aux.get_crc(&mut crc_count);
        }

        match res {
            Ok(Some(raw)) => pipe.add_crc_sample(CrcSample::from_bytes(raw)),
            Ok(None) => tracing::debug!("{}: no new crc after retrying", aux.name()),
            Err(err) => tracing::debug!("{}: failed to get a crc: {}", aux.name(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_decodes_little_endian_pairs() {
        let sample = CrcSample::from_bytes([0x34, 0x12, 0x78, 0x56, 0xbc, 0x9a]);
        assert_eq!(
            sample,
            CrcSample {
                r: 0x1234,
                g: 0x5678,
                b: 0x9abc,
            }
        );
    }
}
