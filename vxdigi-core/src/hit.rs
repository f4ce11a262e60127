//! Pixel state, charge deposits and digitized hits.

use crate::geometry::GridCoordinate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Front-end state of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PixelStatus {
    /// No stored charge.
    #[default]
    Idle,
    /// Charge below threshold, the pixel has not fired in this pulse.
    Charging,
    /// Charge at or above threshold.
    Ready,
    /// Charge fell back below threshold after the pixel fired.
    Discharging,
    /// Address outside the ladder grid.
    OutOfBounds,
    /// Address on a sensor tile that does not exist.
    GeometryError,
}

impl PixelStatus {
    /// Whether the pixel is over threshold.
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Whether the status denotes an invalid address rather than a pixel state.
    #[inline]
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::OutOfBounds | Self::GeometryError)
    }
}

/// Matrix-level status, recording index errors seen since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatrixStatus {
    #[default]
    Ok,
    PixelNumberError,
    SegmentNumberError,
}

/// Read view of a pixel, or a completed measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelData {
    /// Stored charge, or the collected charge for a measurement.
    pub charge: f64,
    /// Time the pixel fired (start time if it has not fired).
    pub time: f64,
    pub status: PixelStatus,
}

impl PixelData {
    /// Creates pixel data with the given status and no charge.
    #[inline]
    #[must_use]
    pub fn with_status(status: PixelStatus) -> Self {
        Self {
            charge: 0.0,
            time: 0.0,
            status,
        }
    }
}

/// One measured pixel of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChargePoint {
    pub row: usize,
    pub col: usize,
    pub charge: f64,
}

impl ChargePoint {
    /// Creates a new charge point.
    #[inline]
    #[must_use]
    pub fn new(row: usize, col: usize, charge: f64) -> Self {
        Self { row, col, charge }
    }

    /// Grid coordinate of the pixel.
    #[inline]
    #[must_use]
    pub fn coord(&self) -> GridCoordinate {
        GridCoordinate::new(self.row, self.col)
    }
}

/// Charge pushed by the upstream simulation into one pixel of one ladder.
///
/// Row and column are signed: diffusion tails routinely land outside the
/// sensor and are rejected by the matrix rather than by the producer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChargeDeposit {
    pub layer: i32,
    pub ladder: i32,
    pub row: i32,
    pub col: i32,
    pub charge: f64,
    pub time: f64,
}

impl ChargeDeposit {
    /// Creates a new deposit.
    #[must_use]
    pub fn new(layer: i32, ladder: i32, row: i32, col: i32, charge: f64, time: f64) -> Self {
        Self {
            layer,
            ladder,
            row,
            col,
            charge,
            time,
        }
    }
}

/// A digitized hit: one reconstructed cluster of a ladder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentDigiHit {
    /// Charge-weighted centroid along x, grid frame (`row * pitch_x`).
    pub x: f64,
    /// Charge-weighted centroid along y, grid frame (`col * pitch_y`).
    pub y: f64,
    /// Sum of the member charges.
    pub charge: f64,
    /// Earliest time the cluster was seen.
    pub time: f64,
    /// Encoded cell identifier.
    pub cell_id: u64,
    /// Number of pixels in the cluster.
    pub size: usize,
    /// Member pixels with their measured charge.
    pub pixels: Vec<ChargePoint>,
}

impl SegmentDigiHit {
    /// Lower 32 bits of the cell identifier.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_id0(&self) -> u32 {
        (self.cell_id & 0xFFFF_FFFF) as u32
    }
}
