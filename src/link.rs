//! Link-status decoding and link training helpers.
//!
//! Pure bit extraction over the fixed 6-byte link status region, plus the
//! rate/bandwidth-code conversions and the training wait intervals a
//! training sequencer needs between status polls.

use crate::channel::{sleep_range_us, AuxChannel};
use crate::dpcd;
use crate::error::Result;

fn link_status(status: &[u8; dpcd::LINK_STATUS_SIZE], reg: u32) -> u8 {
    status[(reg - dpcd::LANE0_1_STATUS) as usize]
}

/// Four status bits of one lane; two lanes share each status byte.
fn lane_status(status: &[u8; dpcd::LINK_STATUS_SIZE], lane: usize) -> u8 {
    let i = dpcd::LANE0_1_STATUS + (lane >> 1) as u32;
    let s = (lane & 1) * 4;
    (link_status(status, i) >> s) & 0xf
}

/// Channel equalization has completed on every active lane and inter-lane
/// alignment is done.
pub fn channel_eq_ok(status: &[u8; dpcd::LINK_STATUS_SIZE], lane_count: usize) -> bool {
    let lane_align = link_status(status, dpcd::LANE_ALIGN_STATUS_UPDATED);
    if lane_align & dpcd::INTERLANE_ALIGN_DONE == 0 {
        return false;
    }
    for lane in 0..lane_count {
        if lane_status(status, lane) & dpcd::CHANNEL_EQ_BITS != dpcd::CHANNEL_EQ_BITS {
            return false;
        }
    }
    true
}

/// Clock recovery has completed on every active lane.
pub fn clock_recovery_ok(status: &[u8; dpcd::LINK_STATUS_SIZE], lane_count: usize) -> bool {
    for lane in 0..lane_count {
        if lane_status(status, lane) & dpcd::LANE_CR_DONE == 0 {
            return false;
        }
    }
    true
}

/// Voltage swing the sink requests for `lane`, pre-shifted for the
/// TRAINING_LANEx_SET register.
pub fn adjust_request_voltage(status: &[u8; dpcd::LINK_STATUS_SIZE], lane: usize) -> u8 {
    let i = dpcd::ADJUST_REQUEST_LANE0_1 + (lane >> 1) as u32;
    let s = if lane & 1 != 0 {
        dpcd::ADJUST_VOLTAGE_SWING_LANE1_SHIFT
    } else {
        dpcd::ADJUST_VOLTAGE_SWING_LANE0_SHIFT
    };
    ((link_status(status, i) >> s) & 0x3) << dpcd::TRAIN_VOLTAGE_SWING_SHIFT
}

/// Pre-emphasis the sink requests for `lane`, pre-shifted for the
/// TRAINING_LANEx_SET register.
pub fn adjust_request_pre_emphasis(status: &[u8; dpcd::LINK_STATUS_SIZE], lane: usize) -> u8 {
    let i = dpcd::ADJUST_REQUEST_LANE0_1 + (lane >> 1) as u32;
    let s = if lane & 1 != 0 {
        dpcd::ADJUST_PRE_EMPHASIS_LANE1_SHIFT
    } else {
        dpcd::ADJUST_PRE_EMPHASIS_LANE0_SHIFT
    };
    ((link_status(status, i) >> s) & 0x3) << dpcd::TRAIN_PRE_EMPHASIS_SHIFT
}

pub fn adjust_request_post_cursor(status: &[u8; dpcd::LINK_STATUS_SIZE], lane: usize) -> u8 {
    let value = link_status(status, dpcd::ADJUST_REQUEST_POST_CURSOR2);
    (value >> (lane << 1)) & 0x3
}

/// Link bandwidth code for a link rate in kbit/s per lane; the code is the
/// rate in units of 0.27 Gbit/s.
pub fn link_rate_to_bw_code(link_rate: u32) -> u8 {
    (link_rate / 27000) as u8
}

pub fn bw_code_to_link_rate(link_bw: u8) -> u32 {
    u32::from(link_bw) * 27000
}

fn training_rd_interval(dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE]) -> u8 {
    let rd_interval =
        dpcd_caps[dpcd::TRAINING_AUX_RD_INTERVAL as usize] & dpcd::TRAINING_AUX_RD_MASK;
    if rd_interval > 4 {
        tracing::debug!("AUX interval {}, out of range (max 4)", rd_interval);
    }
    rd_interval
}

/// Wait the interval the sink requires between clock-recovery status polls.
pub fn link_train_clock_recovery_delay(dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE]) {
    let rd_interval = training_rd_interval(dpcd_caps);
    let us = if rd_interval == 0 || dpcd_caps[dpcd::DPCD_REV as usize] >= dpcd::DPCD_REV_14 {
        100
    } else {
        u64::from(rd_interval) * 4000
    };
    sleep_range_us(us, us * 2);
}

/// Wait the interval the sink requires between channel-eq status polls.
pub fn link_train_channel_eq_delay(dpcd_caps: &[u8; dpcd::RECEIVER_CAP_SIZE]) {
    let rd_interval = training_rd_interval(dpcd_caps);
    let us = if rd_interval == 0 {
        400
    } else {
        u64::from(rd_interval) * 4000
    };
    sleep_range_us(us, us * 2);
}

/// PHY compliance test parameters requested by the sink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhyTestParams {
    /// Link rate in kbit/s per lane.
    pub link_rate: u32,
    pub num_lanes: u8,
    pub enhanced_frame_cap: bool,
    /// One of the `dpcd::PHY_TEST_PATTERN_*` ids.
    pub phy_pattern: u8,
    pub custom80: [u8; 10],
    pub hbr2_reset: [u8; 2],
}

impl AuxChannel {
    /// Read the compliance test pattern the sink requests.
    pub fn get_phy_test_pattern(&self) -> Result<PhyTestParams> {
        let mut data = PhyTestParams {
            link_rate: bw_code_to_link_rate(self.dpcd_read_byte(dpcd::TEST_LINK_RATE)?),
            ..Default::default()
        };

        let lanes = self.dpcd_read_byte(dpcd::TEST_LANE_COUNT)?;
        data.num_lanes = lanes & dpcd::MAX_LANE_COUNT_MASK;
        data.enhanced_frame_cap = lanes & dpcd::ENHANCED_FRAME_CAP != 0;

        data.phy_pattern = self.dpcd_read_byte(dpcd::PHY_TEST_PATTERN)?;
        match data.phy_pattern {
            dpcd::PHY_TEST_PATTERN_80BIT_CUSTOM => {
                self.dpcd_read(dpcd::TEST_80BIT_CUSTOM_PATTERN_7_0, &mut data.custom80)?;
            }
            dpcd::PHY_TEST_PATTERN_CP2520 => {
                self.dpcd_read(dpcd::TEST_HBR2_SCRAMBLER_RESET, &mut data.hbr2_reset)?;
            }
            _ => {}
        }
        Ok(data)
    }

    /// Program the requested compliance pattern into the sink.
    ///
    /// Sinks older than DP 1.2 take the pattern through
    /// TRAINING_PATTERN_SET; newer ones through the per-lane LINK_QUAL
    /// registers.
    pub fn set_phy_test_pattern(&self, data: &PhyTestParams, dp_rev: u8) -> Result<()> {
        let mut link_config = [link_rate_to_bw_code(data.link_rate), data.num_lanes];
        if data.enhanced_frame_cap {
            link_config[1] |= dpcd::LANE_COUNT_ENHANCED_FRAME_EN;
        }
        self.dpcd_write(dpcd::LINK_BW_SET, &link_config)?;

        if dp_rev < 0x12 {
            let pattern = (data.phy_pattern << 2) & dpcd::LINK_QUAL_PATTERN_11_MASK;
            self.dpcd_write_byte(dpcd::TRAINING_PATTERN_SET, pattern)?;
        } else {
            for lane in 0..data.num_lanes {
                self.dpcd_write_byte(dpcd::LINK_QUAL_LANE0_SET + u32::from(lane), data.phy_pattern)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Status buffers below are the 0x202..0x207 region: lane0/1 status,
    // lane2/3 status, align status, sink status, adjust lane0/1, adjust
    // lane2/3.

    #[test]
    fn channel_eq_needs_alignment_and_all_lane_bits() {
        let all_ok = [0x77, 0x77, 0x01, 0x00, 0x00, 0x00];
        assert!(channel_eq_ok(&all_ok, 4));

        // Alignment missing.
        let no_align = [0x77, 0x77, 0x00, 0x00, 0x00, 0x00];
        assert!(!channel_eq_ok(&no_align, 4));

        // Lane 2 lost symbol lock; lanes 0 and 1 unaffected.
        let lane2_bad = [0x77, 0x73, 0x01, 0x00, 0x00, 0x00];
        assert!(!channel_eq_ok(&lane2_bad, 4));
        assert!(!channel_eq_ok(&lane2_bad, 3));
        assert!(channel_eq_ok(&lane2_bad, 2));
    }

    #[test]
    fn clock_recovery_checks_only_active_lanes() {
        // CR done on lanes 0 and 1 only.
        let s = [0x11, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(clock_recovery_ok(&s, 1));
        assert!(clock_recovery_ok(&s, 2));
        assert!(!clock_recovery_ok(&s, 3));
    }

    #[test]
    fn adjust_requests_decode_per_lane_nibbles() {
        // Lane 0: swing 3, pre-emphasis 1. Lane 1: swing 1, pre-emphasis 2.
        // Lane 2: swing 2. Lane 3: pre-emphasis 3.
        let s = [0x00, 0x00, 0x00, 0x00, 0x97, 0xc2];
        assert_eq!(adjust_request_voltage(&s, 0), 3 << dpcd::TRAIN_VOLTAGE_SWING_SHIFT);
        assert_eq!(adjust_request_pre_emphasis(&s, 0), 1 << dpcd::TRAIN_PRE_EMPHASIS_SHIFT);
        assert_eq!(adjust_request_voltage(&s, 1), 1 << dpcd::TRAIN_VOLTAGE_SWING_SHIFT);
        assert_eq!(adjust_request_pre_emphasis(&s, 1), 2 << dpcd::TRAIN_PRE_EMPHASIS_SHIFT);
        assert_eq!(adjust_request_voltage(&s, 2), 2 << dpcd::TRAIN_VOLTAGE_SWING_SHIFT);
        assert_eq!(adjust_request_pre_emphasis(&s, 3), 3 << dpcd::TRAIN_PRE_EMPHASIS_SHIFT);
    }

    #[test]
    fn post_cursor_uses_two_bits_per_lane() {
        let mut s = [0u8; 6];
        // 0x20c holds all four lanes: lane0=1, lane1=0, lane2=3, lane3=2.
        s[(dpcd::ADJUST_REQUEST_POST_CURSOR2 - dpcd::LANE0_1_STATUS) as usize] = 0b10_11_00_01;
        assert_eq!(adjust_request_post_cursor(&s, 0), 1);
        assert_eq!(adjust_request_post_cursor(&s, 1), 0);
        assert_eq!(adjust_request_post_cursor(&s, 2), 3);
        assert_eq!(adjust_request_post_cursor(&s, 3), 2);
    }

    #[test]
    fn bw_codes_are_multiples_of_27000() {
        assert_eq!(bw_code_to_link_rate(0x06), 162000);
        assert_eq!(bw_code_to_link_rate(0x0a), 270000);
        assert_eq!(bw_code_to_link_rate(0x14), 540000);
        assert_eq!(bw_code_to_link_rate(0x1e), 810000);
        assert_eq!(link_rate_to_bw_code(162000), 0x06);
        assert_eq!(link_rate_to_bw_code(540000), 0x14);
    }
}
