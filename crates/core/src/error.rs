//! Error types for headset-power-core.

use crate::hidpp::RequestTag;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure (open, write or read).
    #[error("HID error: {0}")]
    Hid(String),

    /// Device not found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A request tag that has no command frame assigned.
    #[error("request {0:?} is reserved and has no command frame")]
    ReservedRequest(RequestTag),

    /// Value out of safe range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Calibration curve file could not be read.
    #[error("curve error: {0}")]
    Curve(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
