//! Sink/branch identification and the static quirk tables.
//!
//! A device identifies itself through the OUI + device-id region of the
//! DPCD (0x400 for sinks, 0x500 for branches). Known-broken devices are
//! matched against a static rule table; devices with unreliable OUIs get a
//! second chance through their EDID manufacturer/product ids. The tables
//! only say *which* quirks apply, acting on them is up to the caller.

use crate::channel::AuxChannel;
use crate::dpcd;
use crate::error::Result;

/// Device misbehaviors worked around elsewhere in a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpQuirk {
    /// The device requires the main link M/N values to stay constant at
    /// HBR2 rates.
    ConstantN,
    /// PSR is advertised but needs extra handling; treat it as absent.
    NoPsr,
    /// SINK_COUNT is left zeroed even with a sink attached.
    NoSinkCount,
    /// DP 1.4 MST hub that supports DSC without exposing a virtual DPCD.
    DscWithoutVirtualDpcd,
    /// Backlight is only controllable through DPCD, whatever the EDID or
    /// platform claim.
    ForceDpcdBacklight,
}

impl DpQuirk {
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Identification bytes read from DPCD 0x400 (sink) or 0x500 (branch).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DpcdIdent {
    pub oui: [u8; 3],
    pub device_id: [u8; 6],
    pub hw_rev: u8,
    pub sw_major_rev: u8,
    pub sw_minor_rev: u8,
}

impl DpcdIdent {
    pub const SIZE: usize = 13;

    pub fn from_bytes(raw: &[u8; Self::SIZE]) -> Self {
        Self {
            oui: [raw[0], raw[1], raw[2]],
            device_id: [raw[3], raw[4], raw[5], raw[6], raw[7], raw[8]],
            hw_rev: raw[9],
            sw_major_rev: raw[10],
            sw_minor_rev: raw[11],
        }
    }

    /// Printable prefix of the device id, which is fixed-width and
    /// zero-padded on the wire.
    fn device_id_str(&self) -> String {
        let len = self
            .device_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.device_id.len());
        String::from_utf8_lossy(&self.device_id[..len]).into_owned()
    }
}

/// Identification plus the resolved quirk mask.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DpDesc {
    pub ident: DpcdIdent,
    pub quirks: u32,
}

impl DpDesc {
    pub fn has_quirk(&self, quirk: DpQuirk) -> bool {
        self.quirks & quirk.bit() != 0
    }
}

struct DpcdQuirkRule {
    oui: [u8; 3],
    device_id: [u8; 6],
    is_branch: bool,
    quirks: u32,
}

/// A zeroed device-id matches any device with the rule's OUI.
const DEVICE_ID_ANY: [u8; 6] = [0; 6];

static DPCD_QUIRK_LIST: &[DpcdQuirkRule] = &[
    // Analogix 7737 needs reduced M and N at HBR2 link rates.
    DpcdQuirkRule {
        oui: [0x00, 0x22, 0xb9],
        device_id: DEVICE_ID_ANY,
        is_branch: true,
        quirks: DpQuirk::ConstantN.bit(),
    },
    // LG LP140WF6-SPM1 eDP panel.
    DpcdQuirkRule {
        oui: [0x00, 0x22, 0xb9],
        device_id: *b"sivarT",
        is_branch: false,
        quirks: DpQuirk::ConstantN.bit(),
    },
    // Apple panels need some additional handling to support PSR.
    DpcdQuirkRule {
        oui: [0x00, 0x10, 0xfa],
        device_id: DEVICE_ID_ANY,
        is_branch: false,
        quirks: DpQuirk::NoPsr.bit(),
    },
    // CH7511 seems to leave SINK_COUNT zeroed.
    DpcdQuirkRule {
        oui: [0x00, 0x00, 0x00],
        device_id: *b"CH7511",
        is_branch: false,
        quirks: DpQuirk::NoSinkCount.bit(),
    },
    // Synaptics DP1.4 MST hubs can support DSC without virtual DPCD.
    DpcdQuirkRule {
        oui: [0x90, 0xcc, 0x24],
        device_id: DEVICE_ID_ANY,
        is_branch: true,
        quirks: DpQuirk::DscWithoutVirtualDpcd.bit(),
    },
];

/// Quirk mask for the device identified by `ident`.
///
/// Rules are scanned in table order and accumulate with OR; a device may
/// match more than one rule.
pub fn dpcd_quirks(ident: &DpcdIdent, is_branch: bool) -> u32 {
    let mut quirks = 0;
    for rule in DPCD_QUIRK_LIST {
        if rule.is_branch != is_branch {
            continue;
        }
        if rule.oui != ident.oui {
            continue;
        }
        if rule.device_id != DEVICE_ID_ANY && rule.device_id != ident.device_id {
            continue;
        }
        quirks |= rule.quirks;
    }
    quirks
}

struct EdidQuirkRule {
    mfg_id: [u8; 2],
    prod_id: [u8; 2],
    quirks: u32,
}

/// Devices that neglect to fill in their DPCD device-id, keyed by EDID
/// manufacturer/product instead.
static EDID_QUIRK_LIST: &[EdidQuirkRule] = &[
    // Optional 4K AMOLED panel in the ThinkPad X1 Extreme 2nd Generation
    // only supports DPCD backlight controls.
    EdidQuirkRule {
        mfg_id: [0x4c, 0x83],
        prod_id: [0x41, 0x41],
        quirks: DpQuirk::ForceDpcdBacklight.bit(),
    },
    // Some Dell CML 2020 panels only support DPCD backlight controls, and
    // all of them start up in that mode; force it until they can be told
    // apart from the PWM-capable ones.
    EdidQuirkRule {
        mfg_id: [0x06, 0xaf],
        prod_id: [0x9b, 0x32],
        quirks: DpQuirk::ForceDpcdBacklight.bit(),
    },
    EdidQuirkRule {
        mfg_id: [0x06, 0xaf],
        prod_id: [0xeb, 0x41],
        quirks: DpQuirk::ForceDpcdBacklight.bit(),
    },
    EdidQuirkRule {
        mfg_id: [0x4d, 0x10],
        prod_id: [0xc7, 0x14],
        quirks: DpQuirk::ForceDpcdBacklight.bit(),
    },
    EdidQuirkRule {
        mfg_id: [0x4d, 0x10],
        prod_id: [0xe6, 0x14],
        quirks: DpQuirk::ForceDpcdBacklight.bit(),
    },
];

/// Quirk mask for a sink identified by its EDID manufacturer/product ids.
pub fn edid_quirks(mfg_id: [u8; 2], prod_id: [u8; 2]) -> u32 {
    let mut quirks = 0;
    for rule in EDID_QUIRK_LIST {
        if rule.mfg_id == mfg_id && rule.prod_id == prod_id {
            quirks |= rule.quirks;
        }
    }
    tracing::debug!(
        "dp sink: EDID mfg {:02x}{:02x} prod-id {:02x}{:02x} quirks {:#06x}",
        mfg_id[0],
        mfg_id[1],
        prod_id[0],
        prod_id[1],
        quirks
    );
    quirks
}

impl AuxChannel {
    /// Read the sink or branch descriptor and resolve its quirks.
    pub fn read_desc(&self, is_branch: bool) -> Result<DpDesc> {
        let offset = if is_branch {
            dpcd::BRANCH_OUI
        } else {
            dpcd::SINK_OUI
        };
        let mut raw = [0u8; DpcdIdent::SIZE];
        self.dpcd_read(offset, &mut raw)?;

        let ident = DpcdIdent::from_bytes(&raw);
        let quirks = dpcd_quirks(&ident, is_branch);
        tracing::debug!(
            "{}: DP {}: OUI {:02x}:{:02x}:{:02x} dev-ID {} HW-rev {}.{} SW-rev {}.{} quirks {:#06x}",
            self.name(),
            if is_branch { "branch" } else { "sink" },
            ident.oui[0],
            ident.oui[1],
            ident.oui[2],
            ident.device_id_str(),
            ident.hw_rev >> 4,
            ident.hw_rev & 0xf,
            ident.sw_major_rev,
            ident.sw_minor_rev,
            quirks
        );
        Ok(DpDesc { ident, quirks })
    }
}
