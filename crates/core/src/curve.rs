//! Voltage to state-of-charge calibration curves.
//!
//! A curve is an ordered list of `(threshold voltage, percent)` points. A
//! lookup walks the list in stored order and returns the first point whose
//! threshold is at or below the sample, so tables must be stored with the
//! highest threshold first.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, error};

/// One calibration point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Lowest voltage (raw device units) that maps to `percent`.
    pub threshold: i32,
    /// State of charge at this threshold.
    pub percent: f64,
}

/// How the points in a curve file are ordered relative to lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveOrder {
    /// File is already highest-threshold first.
    AsLoaded,
    /// File is ascending and must be reversed.
    Reversed,
}

/// An immutable calibration curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveTable {
    points: Vec<CurvePoint>,
}

impl CurveTable {
    /// Build a table from points already in lookup order.
    pub fn new(points: Vec<CurvePoint>) -> Self {
        Self { points }
    }

    /// Build a table from `(threshold, percent)` pairs in lookup order.
    pub fn from_pairs(pairs: &[(i32, f64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(threshold, percent)| CurvePoint { threshold, percent })
                .collect(),
        )
    }

    /// Parse `voltage,percent` lines.
    ///
    /// Lines with fewer than two fields are skipped. Fields that are not
    /// numbers read as zero, which keeps a half-broken file usable.
    pub fn parse_csv(text: &str, order: CurveOrder) -> Self {
        let mut points: Vec<CurvePoint> = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.trim_end_matches('\r').split(',');
                let threshold = fields.next()?;
                let percent = fields.next()?;
                Some(CurvePoint {
                    threshold: threshold.trim().parse().unwrap_or(0),
                    percent: percent.trim().parse().unwrap_or(0.0),
                })
            })
            .collect();
        if order == CurveOrder::Reversed {
            points.reverse();
        }
        Self { points }
    }

    /// Read and parse a curve file.
    pub fn from_file(path: &Path, order: CurveOrder) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Curve(format!("{}: {e}", path.display())))?;
        let table = Self::parse_csv(&text, order);
        debug!(path = %path.display(), points = table.len(), "Loaded curve");
        Ok(table)
    }

    /// Look up the state of charge for a voltage sample.
    ///
    /// Empty tables yield 0. A sample below every threshold yields the last
    /// point's percentage.
    pub fn lookup(&self, voltage: i32) -> f64 {
        self.points
            .iter()
            .find(|p| p.threshold <= voltage)
            .or(self.points.last())
            .map_or(0.0, |p| p.percent)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }
}

/// Load a curve, falling back to an empty table if the file is unusable.
pub fn load_curve(path: &Path, order: CurveOrder) -> CurveTable {
    CurveTable::from_file(path, order).unwrap_or_else(|e| {
        error!(error = %e, "Failed to load curve, state of charge will read 0");
        CurveTable::default()
    })
}

/// The pair of curves used for state-of-charge estimation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curves {
    pub charging: CurveTable,
    pub discharging: CurveTable,
}

impl Curves {
    /// Pick the curve for the current regime.
    pub fn select(&self, charging: bool) -> &CurveTable {
        if charging {
            &self.charging
        } else {
            &self.discharging
        }
    }

    /// State of charge for a voltage under the given regime.
    pub fn soc(&self, voltage: i32, charging: bool) -> f64 {
        self.select(charging).lookup(voltage)
    }
}
