//! Inbound report classification.
//!
//! Only the first [`READ_WINDOW_LEN`] bytes of each read are inspected. All
//! reports the headset sends on its own carry the long report ID and the
//! receiver address; anything else is reported as [`Report::Unhandled`].

use crate::hidpp::{
    features, functions, LightZone, EFFECT_BREATHING, LONG_REPORT_ID, READ_WINDOW_LEN,
    RECEIVER_INDEX,
};

/// Battery state byte reported while the headset is on the charger.
pub const BATTERY_STATE_CHARGING: u8 = 0x03;
/// Power notification byte 6 when the headset wakes.
pub const POWER_STATE_AWAKE: u8 = 0x01;

/// Receiver reply to a voltage request when the headset is out of reach.
const BENIGN_ECHO: [u8; 5] = [0xFF, 0x08, 0x0A, 0x05, 0x00];

/// A classified inbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Fresh bitmask of pressed buttons, one bit per button.
    Buttons(u8),
    /// Battery voltage reading.
    Battery { voltage: u16, charging: bool },
    /// Headset is going to sleep (or was switched off).
    Sleep,
    /// Headset woke up.
    Wake,
    /// Receiver echo for an unreachable headset.
    Echo,
    /// Zone effect confirmation.
    Lighting { zone: Option<LightZone>, effect: u8 },
    /// Anything else.
    Unhandled,
}

impl Report {
    /// Classify the bytes returned by one read.
    ///
    /// `data` is exactly what was read; it is never padded, so length checks
    /// here reflect how many bytes the headset actually sent.
    pub fn decode(data: &[u8]) -> Self {
        let d = &data[..data.len().min(READ_WINDOW_LEN)];
        if d.len() < 4 || d[0] != LONG_REPORT_ID || d[1] != RECEIVER_INDEX {
            return Self::Unhandled;
        }

        if d.len() >= 5 && d[2] == features::BUTTONS && d[3] == 0x00 {
            return Self::Buttons(d[4]);
        }

        if d.len() < READ_WINDOW_LEN {
            return Self::Unhandled;
        }

        match (d[2], d[3]) {
            (features::BATTERY, functions::BATTERY_VOLTAGE) => Self::Battery {
                voltage: u16::from_be_bytes([d[4], d[5]]),
                charging: d[6] == BATTERY_STATE_CHARGING,
            },
            // 11 ff 08 00 00 00 00
            (features::BATTERY, 0x00) if d[4..7] == [0u8; 3] => Self::Sleep,
            // 11 ff 08 00 xx xx 01
            (features::BATTERY, 0x00) if d[6] == POWER_STATE_AWAKE => Self::Wake,
            _ if d[2..7] == BENIGN_ECHO => Self::Echo,
            (features::LIGHTING, functions::SET_ZONE_EFFECT) if d[6] == 0x00 => Self::Lighting {
                zone: LightZone::from_byte(d[4]),
                effect: d[5],
            },
            _ => Self::Unhandled,
        }
    }

    /// For a lighting confirmation, whether the confirmed zone is lit.
    pub fn lights_on(&self) -> bool {
        matches!(
            self,
            Self::Lighting {
                zone: Some(_),
                effect: EFFECT_BREATHING
            }
        )
    }
}

/// Compare two button masks and list the buttons whose state changed.
///
/// Returns `(index, pressed)` pairs in ascending bit order.
pub fn button_edges(previous: u8, current: u8) -> Vec<(u8, bool)> {
    let changed = previous ^ current;
    (0..8u8)
        .filter(|bit| changed & (1 << bit) != 0)
        .map(|bit| (bit, current & (1 << bit) != 0))
        .collect()
}
