//! Stateless capability decoders.
//!
//! Pure functions over capability blocks fetched via the AUX engine:
//! downstream-port limits, DSC decoder capabilities and the PSR setup time.
//! A device that simply does not advertise detailed capability info yields
//! the sentinel `0`, which is an expected state rather than an error.

use std::fmt;

use crate::channel::AuxChannel;
use crate::dpcd;
use crate::error::{AuxError, Result};

fn detailed_cap_info(dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE]) -> bool {
    dpcd_caps[dpcd::DOWNSTREAMPORT_PRESENT as usize] & dpcd::DETAILED_CAP_INFO_AVAILABLE != 0
}

/// Max pixel rate of a legacy VGA converter, or max TMDS clock of a
/// DVI/HDMI/DP++ converter, in kHz. 0 when the port does not define one.
pub fn downstream_max_clock(
    dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE],
    port_cap: &[u8; 4],
) -> u32 {
    if !detailed_cap_info(dpcd_caps) {
        return 0;
    }
    match port_cap[0] & dpcd::DS_PORT_TYPE_MASK {
        dpcd::DS_PORT_TYPE_VGA => u32::from(port_cap[1]) * 8 * 1000,
        dpcd::DS_PORT_TYPE_DVI | dpcd::DS_PORT_TYPE_HDMI | dpcd::DS_PORT_TYPE_DP_DUALMODE => {
            u32::from(port_cap[1]) * 2500
        }
        _ => 0,
    }
}

/// Max bits per component of a converter downstream port. 0 when not
/// defined.
pub fn downstream_max_bpc(dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE], port_cap: &[u8; 4]) -> u8 {
    if !detailed_cap_info(dpcd_caps) {
        return 0;
    }
    match port_cap[0] & dpcd::DS_PORT_TYPE_MASK {
        dpcd::DS_PORT_TYPE_VGA
        | dpcd::DS_PORT_TYPE_DVI
        | dpcd::DS_PORT_TYPE_HDMI
        | dpcd::DS_PORT_TYPE_DP_DUALMODE => match port_cap[2] & dpcd::DS_MAX_BPC_MASK {
            dpcd::DS_8BPC => 8,
            dpcd::DS_10BPC => 10,
            dpcd::DS_12BPC => 12,
            dpcd::DS_16BPC => 16,
            _ => 0,
        },
        _ => 0,
    }
}

const fn dsc_idx(reg: u32) -> usize {
    (reg - dpcd::DSC_SUPPORT) as usize
}

/// Max slice count the DSC sink supports, or 0 when invalid.
///
/// eDP sinks encode the count in SLICE_CAP_1 alone; DP sinks spill the
/// larger counts into SLICE_CAP_2.
pub fn dsc_max_slice_count(
    dsc_dpcd: &[u8; dpcd::DSC_RECEIVER_CAP_SIZE],
    is_edp: bool,
) -> u8 {
    let slice_cap1 = dsc_dpcd[dsc_idx(dpcd::DSC_SLICE_CAP_1)];

    if is_edp {
        if slice_cap1 & dpcd::DSC_4_PER_DP_DSC_SINK != 0 {
            return 4;
        }
        if slice_cap1 & dpcd::DSC_2_PER_DP_DSC_SINK != 0 {
            return 2;
        }
        if slice_cap1 & dpcd::DSC_1_PER_DP_DSC_SINK != 0 {
            return 1;
        }
    } else {
        let slice_cap2 = dsc_dpcd[dsc_idx(dpcd::DSC_SLICE_CAP_2)];

        if slice_cap2 & dpcd::DSC_24_PER_DP_DSC_SINK != 0 {
            return 24;
        }
        if slice_cap2 & dpcd::DSC_20_PER_DP_DSC_SINK != 0 {
            return 20;
        }
        if slice_cap2 & dpcd::DSC_16_PER_DP_DSC_SINK != 0 {
            return 16;
        }
        if slice_cap1 & dpcd::DSC_12_PER_DP_DSC_SINK != 0 {
            return 12;
        }
        if slice_cap1 & dpcd::DSC_10_PER_DP_DSC_SINK != 0 {
            return 10;
        }
        if slice_cap1 & dpcd::DSC_8_PER_DP_DSC_SINK != 0 {
            return 8;
        }
        if slice_cap1 & dpcd::DSC_6_PER_DP_DSC_SINK != 0 {
            return 6;
        }
        if slice_cap1 & dpcd::DSC_4_PER_DP_DSC_SINK != 0 {
            return 4;
        }
        if slice_cap1 & dpcd::DSC_2_PER_DP_DSC_SINK != 0 {
            return 2;
        }
        if slice_cap1 & dpcd::DSC_1_PER_DP_DSC_SINK != 0 {
            return 1;
        }
    }

    0
}

/// Line buffer depth of the DSC decoder in bits, or 0 when invalid.
pub fn dsc_line_buf_depth(dsc_dpcd: &[u8; dpcd::DSC_RECEIVER_CAP_SIZE]) -> u8 {
    let line_buf_depth = dsc_dpcd[dsc_idx(dpcd::DSC_LINE_BUF_BIT_DEPTH)];
    match line_buf_depth & dpcd::DSC_LINE_BUF_BIT_DEPTH_MASK {
        dpcd::DSC_LINE_BUF_BIT_DEPTH_9 => 9,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_10 => 10,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_11 => 11,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_12 => 12,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_13 => 13,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_14 => 14,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_15 => 15,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_16 => 16,
        dpcd::DSC_LINE_BUF_BIT_DEPTH_8 => 8,
        _ => 0,
    }
}

/// Input bits-per-component values the DSC sink accepts, largest first.
/// Fills `dsc_bpc` and returns how many entries were written.
pub fn dsc_supported_input_bpcs(
    dsc_dpcd: &[u8; dpcd::DSC_RECEIVER_CAP_SIZE],
    dsc_bpc: &mut [u8; 3],
) -> usize {
    let color_depth = dsc_dpcd[dsc_idx(dpcd::DSC_DEC_COLOR_DEPTH_CAP)];
    let mut num_bpc = 0;

    if color_depth & dpcd::DSC_12_BPC != 0 {
        dsc_bpc[num_bpc] = 12;
        num_bpc += 1;
    }
    if color_depth & dpcd::DSC_10_BPC != 0 {
        dsc_bpc[num_bpc] = 10;
        num_bpc += 1;
    }
    if color_depth & dpcd::DSC_8_BPC != 0 {
        dsc_bpc[num_bpc] = 8;
        num_bpc += 1;
    }

    num_bpc
}

static PSR_SETUP_TIME_US: [u16; 7] = [330, 275, 220, 165, 110, 55, 0];

/// PSR setup time of the panel in microseconds.
pub fn psr_setup_time(psr_cap: &[u8; dpcd::PSR_RECEIVER_CAP_SIZE]) -> Result<u16> {
    let i = ((psr_cap[1] & dpcd::PSR_SETUP_TIME_MASK) >> dpcd::PSR_SETUP_TIME_SHIFT) as usize;
    PSR_SETUP_TIME_US
        .get(i)
        .copied()
        .ok_or(AuxError::InvalidArgument("psr setup time index out of range"))
}

impl AuxChannel {
    /// 6-byte identification string of the attached branch device.
    pub fn downstream_id(&self) -> Result<[u8; 6]> {
        let mut id = [0u8; 6];
        self.dpcd_read(dpcd::BRANCH_ID, &mut id)?;
        Ok(id)
    }

    /// Write a human-readable report about the attached branch device.
    ///
    /// Individual AUX reads inside the report are best-effort; fields that
    /// cannot be fetched are simply left out.
    pub fn downstream_debug(
        &self,
        m: &mut dyn fmt::Write,
        dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE],
        port_cap: &[u8; 4],
    ) -> fmt::Result {
        let port_type = port_cap[0] & dpcd::DS_PORT_TYPE_MASK;
        let branch_device =
            dpcd_caps[dpcd::DOWNSTREAMPORT_PRESENT as usize] & dpcd::DWN_STRM_PORT_PRESENT != 0;

        writeln!(
            m,
            "\tDP branch device present: {}",
            if branch_device { "yes" } else { "no" }
        )?;
        if !branch_device {
            return Ok(());
        }

        let type_name = match port_type {
            dpcd::DS_PORT_TYPE_DP => "DisplayPort",
            dpcd::DS_PORT_TYPE_VGA => "VGA",
            dpcd::DS_PORT_TYPE_DVI => "DVI",
            dpcd::DS_PORT_TYPE_HDMI => "HDMI",
            dpcd::DS_PORT_TYPE_NON_EDID => "others without EDID support",
            dpcd::DS_PORT_TYPE_DP_DUALMODE => "DP++",
            dpcd::DS_PORT_TYPE_WIRELESS => "Wireless",
            _ => "N/A",
        };
        writeln!(m, "\t\tType: {type_name}")?;

        if let Ok(id) = self.downstream_id() {
            writeln!(m, "\t\tID: {}", String::from_utf8_lossy(&id))?;
        }

        if let Ok(rev) = self.dpcd_read_byte(dpcd::BRANCH_HW_REV) {
            writeln!(m, "\t\tHW: {}.{}", (rev & 0xf0) >> 4, rev & 0xf)?;
        }

        let mut rev = [0u8; 2];
        if self.dpcd_read(dpcd::BRANCH_SW_REV, &mut rev).is_ok() {
            writeln!(m, "\t\tSW: {}.{}", rev[0], rev[1])?;
        }

        if detailed_cap_info(dpcd_caps) {
            let clk = downstream_max_clock(dpcd_caps, port_cap);
            if clk > 0 {
                if port_type == dpcd::DS_PORT_TYPE_VGA {
                    writeln!(m, "\t\tMax dot clock: {clk} kHz")?;
                } else {
                    writeln!(m, "\t\tMax TMDS clock: {clk} kHz")?;
                }
            }

            let bpc = downstream_max_bpc(dpcd_caps, port_cap);
            if bpc > 0 {
                writeln!(m, "\t\tMax bpc: {bpc}")?;
            }
        }

        Ok(())
    }
}
