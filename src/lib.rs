//! DisplayPort AUX-channel protocol engine.
//!
//! A DisplayPort source talks to its sink over a low-bandwidth auxiliary
//! channel: link training, capability discovery, quirk detection and I2C
//! tunnelling (EDID and friends) all ride on it. The single request/reply
//! exchange on the wire is hardware specific and stays with the embedding
//! driver; everything above it is protocol, and that is what this crate
//! implements:
//!
//! - [`AuxChannel`]: the per-channel handle with the serialized, retrying
//!   native DPCD engine ([`AuxChannel::dpcd_read`] / [`AuxChannel::dpcd_write`])
//! - [`AuxChannel::i2c_xfer`]: I2C bus emulation on top of AUX transactions
//! - [`channel_eq_ok`], [`clock_recovery_ok`] and friends: link-status
//!   decoding for a training sequencer
//! - [`AuxChannel::read_desc`] / [`DpQuirk`]: device identification and the
//!   static quirk tables
//! - [`start_crc`] / [`DisplayPipe`]: background per-frame CRC capture
//!
//! The driver supplies the hardware seam as an [`AuxTransfer`] (or an
//! [`MstTransport`] for channels behind a multi-stream hub) plus a
//! [`DisplayPipe`] when CRC capture is used.

mod caps;
mod channel;
mod crc;
pub mod dpcd;
mod error;
mod i2c;
mod link;
pub mod msg;
mod quirks;

pub use caps::{
    downstream_max_bpc, downstream_max_clock, dsc_line_buf_depth, dsc_max_slice_count,
    dsc_supported_input_bpcs, psr_setup_time,
};
pub use channel::{AuxChannel, AuxTransfer, BusGuard, MstTransport};
pub use crc::{start_crc, stop_crc, CrcSample, DisplayPipe};
pub use error::{AuxError, Result};
pub use i2c::{I2cConfig, I2cMsg, I2cOp, I2C_DEFAULT_SPEED_KHZ};
pub use link::{
    adjust_request_post_cursor, adjust_request_pre_emphasis, adjust_request_voltage,
    bw_code_to_link_rate, channel_eq_ok, clock_recovery_ok, link_rate_to_bw_code,
    link_train_channel_eq_delay, link_train_clock_recovery_delay, PhyTestParams,
};
pub use msg::{AuxData, AuxMessage};
pub use quirks::{dpcd_quirks, edid_quirks, DpDesc, DpQuirk, DpcdIdent};

#[cfg(test)]
mod proptests;
