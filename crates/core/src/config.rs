//! Engine configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object (or
//! no file at all) gives the stock timing.
//!
//! ## Timing
//! - **Battery poll**: 5 s, one voltage request per period
//! - **Request tick**: 250 ms, one queued request plus one read per tick
//! - **Read timeout**: 100 ms, bounds the stall of every tick
//! - **Offline after**: 20 consecutive empty reads (about 5 s of silence)
//!
//! The read timeout must stay below the request tick or ticks pile up.

use crate::curve::{load_curve, CurveOrder, Curves};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const POLL_INTERVAL_MIN_MS: u64 = 1_000;
pub const POLL_INTERVAL_MAX_MS: u64 = 3_600_000;
pub const REQUEST_INTERVAL_MIN_MS: u64 = 50;
pub const REQUEST_INTERVAL_MAX_MS: u64 = 5_000;
pub const OFFLINE_AFTER_MIN: u32 = 1;
pub const OFFLINE_AFTER_MAX: u32 = 1_000;
pub const LIGHTING_RETRY_MAX: u32 = 10;

/// Tunables for the request engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the battery voltage poll.
    pub poll_interval_ms: u64,
    /// Period of the request/read tick.
    pub request_interval_ms: u64,
    /// Upper bound of each read.
    pub read_timeout_ms: u64,
    /// Consecutive empty reads before the headset is considered gone.
    pub offline_after_timeouts: u32,
    /// Consecutive lighting re-sends allowed while the headset disagrees.
    pub lighting_retry_limit: u32,
    /// Charging curve file, ascending by voltage.
    pub charging_curve: Option<PathBuf>,
    /// Discharging curve file, descending by voltage.
    pub discharging_curve: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            request_interval_ms: 250,
            read_timeout_ms: 100,
            offline_after_timeouts: 20,
            lighting_retry_limit: 3,
            charging_curve: None,
            discharging_curve: None,
        }
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject timings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "poll_interval_ms",
            self.poll_interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )?;
        check_range(
            "request_interval_ms",
            self.request_interval_ms,
            REQUEST_INTERVAL_MIN_MS,
            REQUEST_INTERVAL_MAX_MS,
        )?;
        check_range(
            "read_timeout_ms",
            self.read_timeout_ms,
            1,
            self.request_interval_ms.saturating_sub(1),
        )?;
        check_range(
            "offline_after_timeouts",
            self.offline_after_timeouts as u64,
            OFFLINE_AFTER_MIN as u64,
            OFFLINE_AFTER_MAX as u64,
        )?;
        check_range(
            "lighting_retry_limit",
            self.lighting_retry_limit as u64,
            0,
            LIGHTING_RETRY_MAX as u64,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Read timeout in the unit hidapi expects.
    pub fn read_timeout(&self) -> i32 {
        i32::try_from(self.read_timeout_ms).unwrap_or(i32::MAX)
    }

    /// Load both calibration curves. Missing or unreadable files give empty
    /// tables.
    pub fn load_curves(&self) -> Curves {
        Curves {
            charging: self
                .charging_curve
                .as_deref()
                .map(|p| load_curve(p, CurveOrder::Reversed))
                .unwrap_or_default(),
            discharging: self
                .discharging_curve
                .as_deref()
                .map(|p| load_curve(p, CurveOrder::AsLoaded))
                .unwrap_or_default(),
        }
    }
}
