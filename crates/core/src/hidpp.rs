//! G733 vendor command frames (HID++ long reports).
//!
//! Every command the headset understands is a 20-byte long report sent to the
//! receiver address:
//!
//! ```text
//! byte 0     0x11  long report ID
//! byte 1     0xFF  receiver address
//! byte 2     feature index
//! byte 3     function / software ID
//! byte 4..   parameters, zero padded to 20 bytes
//! ```
//!
//! The headset does not need the ROOT feature lookup dance; the feature
//! indices below are fixed for this device family.
//!
//! Protocol reference: g933-utils (ashkitten).

use crate::error::{Error, Result};

/// HID++ report ID for long messages (20 bytes total).
pub const LONG_REPORT_ID: u8 = 0x11;
/// Long report length (including report ID).
pub const LONG_REPORT_LEN: usize = 20;
/// Device address of the wireless receiver.
pub const RECEIVER_INDEX: u8 = 0xFF;

/// Number of bytes inspected on every inbound read.
pub const READ_WINDOW_LEN: usize = 7;

/// Fixed feature indices on the G733.
pub mod features {
    /// Firmware version / protocol probe.
    pub const VERSION: u8 = 0x11;
    /// Battery voltage (also answers the generic feature query).
    pub const BATTERY: u8 = 0x08;
    /// RGB zone effects.
    pub const LIGHTING: u8 = 0x04;
    /// Button state notifications.
    pub const BUTTONS: u8 = 0x05;
}

/// Function / software ID bytes used with [`features`].
pub mod functions {
    /// Version probe (sent with software ID 0xF).
    pub const VERSION: u8 = 0xFF;
    /// Read battery voltage.
    pub const BATTERY_VOLTAGE: u8 = 0x0A;
    /// Set zone effect.
    pub const SET_ZONE_EFFECT: u8 = 0x3C;
}

/// A complete outbound long report.
pub type Frame = [u8; LONG_REPORT_LEN];

/// Kinds of queued work for the request scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// Spacing tick: nothing is written, only the passive read happens.
    Noop,
    /// Reserved, no command frame assigned.
    DeviceName,
    /// Reserved, no command frame assigned.
    Features,
    LightsOn,
    LogoOn,
    LightsOff,
    LogoOff,
    Version,
    Voltage,
}

/// Lighting zones on the headset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LightZone {
    /// Front light strips.
    Strip = 0x01,
    /// G logo.
    Logo = 0x00,
}

impl LightZone {
    /// Look up a zone from its wire selector byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Strip),
            0x00 => Some(Self::Logo),
            _ => None,
        }
    }
}

/// Effect byte for the breathing animation.
pub const EFFECT_BREATHING: u8 = 0x02;
/// Effect byte for lights off.
pub const EFFECT_OFF: u8 = 0x00;

/// Breathing effect parameters that follow the effect byte.
const BREATHING_PARAMS: [u8; 7] = [0x00, 0xB6, 0xFF, 0x0F, 0xA0, 0x00, 0x64];

/// Build a zero-padded long report addressed to the receiver.
pub const fn long_report(feature_index: u8, function_sw: u8, params: &[u8]) -> Frame {
    let mut buf = [0u8; LONG_REPORT_LEN];
    buf[0] = LONG_REPORT_ID;
    buf[1] = RECEIVER_INDEX;
    buf[2] = feature_index;
    buf[3] = function_sw;
    let mut i = 0;
    while i < params.len() && 4 + i < LONG_REPORT_LEN {
        buf[4 + i] = params[i];
        i += 1;
    }
    buf
}

/// Firmware version probe, sent once after every (re)connect.
pub const READ_VERSION: Frame = long_report(
    features::VERSION,
    functions::VERSION,
    &[0x00, 0x11, 0x00, 0x00, 0xAF],
);

/// Battery voltage request.
pub const READ_VOLTAGE: Frame = long_report(features::BATTERY, functions::BATTERY_VOLTAGE, &[]);

/// Build the set-zone-effect command for one zone.
pub fn lighting_frame(zone: LightZone, on: bool) -> Frame {
    let mut params = [0u8; 2 + BREATHING_PARAMS.len()];
    params[0] = zone as u8;
    if on {
        params[1] = EFFECT_BREATHING;
        params[2..].copy_from_slice(&BREATHING_PARAMS);
    } else {
        params[1] = EFFECT_OFF;
    }
    long_report(features::LIGHTING, functions::SET_ZONE_EFFECT, &params)
}

/// Map a request tag to the frame it writes.
///
/// `Noop` writes nothing. The reserved tags have no known command and are
/// rejected rather than silently ignored.
pub fn command_frame(tag: RequestTag) -> Result<Option<Frame>> {
    match tag {
        RequestTag::Noop => Ok(None),
        RequestTag::Version => Ok(Some(READ_VERSION)),
        RequestTag::Voltage => Ok(Some(READ_VOLTAGE)),
        RequestTag::LightsOn => Ok(Some(lighting_frame(LightZone::Strip, true))),
        RequestTag::LightsOff => Ok(Some(lighting_frame(LightZone::Strip, false))),
        RequestTag::LogoOn => Ok(Some(lighting_frame(LightZone::Logo, true))),
        RequestTag::LogoOff => Ok(Some(lighting_frame(LightZone::Logo, false))),
        RequestTag::DeviceName | RequestTag::Features => Err(Error::ReservedRequest(tag)),
    }
}
