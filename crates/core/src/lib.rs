//! headset-power-core: vendor protocol, request scheduling, and power state
//! tracking for the Logitech G733 wireless headset.
//!
//! The headset speaks a fixed set of HID++ long reports through its USB
//! receiver. This crate builds those reports, paces them onto the wire,
//! classifies whatever the headset sends back, and turns the result into a
//! stream of [`state::StateEvent`]s.

pub mod config;
pub mod curve;
pub mod device;
pub mod engine;
pub mod error;
pub mod hidpp;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod transport;

/// Logitech USB Vendor ID.
pub const LOGITECH_VID: u16 = 0x046D;

/// Known Logitech headset product IDs.
pub mod pids {
    /// G733 Lightspeed (wireless receiver).
    pub const G733: u16 = 0x0AB5;
}
