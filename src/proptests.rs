use proptest::prelude::*;

use crate::dpcd;
use crate::link::{bw_code_to_link_rate, channel_eq_ok, link_rate_to_bw_code};
use crate::quirks::{dpcd_quirks, DpQuirk, DpcdIdent};

proptest! {
    #[test]
    fn bw_code_roundtrips_exact_rate_multiples(code in 0u8..=255) {
        let rate = bw_code_to_link_rate(code);
        prop_assert_eq!(rate % 27000, 0);
        prop_assert_eq!(link_rate_to_bw_code(rate), code);
    }

    #[test]
    fn channel_eq_matches_the_bit_definition(
        status in proptest::array::uniform6(any::<u8>()),
        lane_count in 1usize..=4,
    ) {
        let align_done = status[2] & dpcd::INTERLANE_ALIGN_DONE != 0;
        let lanes_done = (0..lane_count).all(|lane| {
            let nibble = (status[lane >> 1] >> ((lane & 1) * 4)) & 0xf;
            nibble & dpcd::CHANNEL_EQ_BITS == dpcd::CHANNEL_EQ_BITS
        });
        prop_assert_eq!(channel_eq_ok(&status, lane_count), align_done && lanes_done);
    }

    #[test]
    fn quirk_resolution_matches_a_direct_rule_model(
        oui in proptest::array::uniform3(any::<u8>()),
        device_id in proptest::array::uniform6(any::<u8>()),
        is_branch: bool,
    ) {
        let ident = DpcdIdent { oui, device_id, ..Default::default() };

        // The rule model, stated independently of the table encoding.
        let mut expected = 0u32;
        if is_branch && oui == [0x00, 0x22, 0xb9] {
            expected |= DpQuirk::ConstantN.bit();
        }
        if !is_branch && oui == [0x00, 0x22, 0xb9] && &device_id == b"sivarT" {
            expected |= DpQuirk::ConstantN.bit();
        }
        if !is_branch && oui == [0x00, 0x10, 0xfa] {
            expected |= DpQuirk::NoPsr.bit();
        }
        if !is_branch && oui == [0x00, 0x00, 0x00] && &device_id == b"CH7511" {
            expected |= DpQuirk::NoSinkCount.bit();
        }
        if is_branch && oui == [0x90, 0xcc, 0x24] {
            expected |= DpQuirk::DscWithoutVirtualDpcd.bit();
        }

        prop_assert_eq!(dpcd_quirks(&ident, is_branch), expected);
    }
}
