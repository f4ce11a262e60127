//! Ladder geometry: pixel grid, sensor tiling and coordinate transforms.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

use crate::config::SensorConfig;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear pixel index, `row * columns + col`.
///
/// This is the key shared by the pixel arena, the labeling set and the
/// cluster reference table.
pub type LinearPosition = usize;

/// Row/column address of a pixel on the ladder grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCoordinate {
    /// Row (along the ladder width).
    pub row: usize,
    /// Column (along the ladder length).
    pub col: usize,
}

impl GridCoordinate {
    /// Creates a new grid coordinate.
    #[inline]
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Bijection between grid coordinates and linear positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPosition {
    columns: usize,
}

impl GridPosition {
    /// Creates a locator for a grid with the given number of columns.
    #[inline]
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self { columns }
    }

    /// Linear position of `(row, col)`.
    #[inline]
    #[must_use]
    pub fn linear(&self, row: usize, col: usize) -> LinearPosition {
        row * self.columns + col
    }

    /// Grid coordinate of a linear position.
    #[inline]
    #[must_use]
    pub fn coord(&self, pos: LinearPosition) -> GridCoordinate {
        GridCoordinate {
            row: pos / self.columns,
            col: pos % self.columns,
        }
    }

    /// Number of columns of the grid.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }
}

/// Validated pixel layout of one ladder.
///
/// Rows run across the ladder width (local x), columns along its length
/// (local y). The grid is tiled by `x_segments × y_segments` sensors of
/// `sensor_rows × sensor_columns` pixels each.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LadderGeometry {
    pub layer: i32,
    pub ladder: i32,
    pub length: f64,
    pub width: f64,
    pub thickness: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub rows: usize,
    pub columns: usize,
    pub sensor_rows: usize,
    pub sensor_columns: usize,
    pub x_segments: usize,
    pub y_segments: usize,
}

impl LadderGeometry {
    /// Builds the pixel layout for a ladder.
    ///
    /// # Errors
    /// Returns [`Error::Geometry`] if a dimension or pitch is not positive,
    /// a segment count is zero, the ladder holds no pixels, or the segment
    /// counts do not evenly tile the pixel grid.
    pub fn from_config(config: &SensorConfig) -> Result<Self> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::Geometry(format!("{name} must be positive, got {value}")))
            }
        };
        positive("ladder length", config.ladder_length)?;
        positive("ladder width", config.ladder_width)?;
        positive("pixel size x", config.pixel_size_x)?;
        positive("pixel size y", config.pixel_size_y)?;
        if !(config.thickness.is_finite() && config.thickness >= 0.0) {
            return Err(Error::Geometry(format!(
                "thickness must be non-negative, got {}",
                config.thickness
            )));
        }
        if config.x_segments == 0 || config.y_segments == 0 {
            return Err(Error::Geometry(format!(
                "segment counts must be non-zero, got {}x{}",
                config.x_segments, config.y_segments
            )));
        }

        let rows = whole_pixels("ladder width", config.ladder_width, config.pixel_size_x)?;
        let columns = whole_pixels("ladder length", config.ladder_length, config.pixel_size_y)?;
        if rows == 0 || columns == 0 {
            return Err(Error::Geometry(format!(
                "ladder {}/{} holds no pixels ({rows}x{columns})",
                config.layer, config.ladder
            )));
        }
        if rows % config.x_segments != 0 {
            return Err(Error::Geometry(format!(
                "{rows} pixel rows cannot be split into {} sensors",
                config.x_segments
            )));
        }
        if columns % config.y_segments != 0 {
            return Err(Error::Geometry(format!(
                "{columns} pixel columns cannot be split into {} sensors",
                config.y_segments
            )));
        }

        Ok(Self {
            layer: config.layer,
            ladder: config.ladder,
            length: config.ladder_length,
            width: config.ladder_width,
            thickness: config.thickness,
            pixel_size_x: config.pixel_size_x,
            pixel_size_y: config.pixel_size_y,
            rows,
            columns,
            sensor_rows: rows / config.x_segments,
            sensor_columns: columns / config.y_segments,
            x_segments: config.x_segments,
            y_segments: config.y_segments,
        })
    }

    /// Total number of pixels on the ladder.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Number of sensor tiles.
    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.x_segments * self.y_segments
    }

    /// Locator for the ladder grid.
    #[inline]
    #[must_use]
    pub fn locate(&self) -> GridPosition {
        GridPosition::new(self.columns)
    }

    #[inline]
    #[must_use]
    pub fn half_length(&self) -> f64 {
        self.length / 2.0
    }

    #[inline]
    #[must_use]
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    #[inline]
    #[must_use]
    pub fn half_thickness(&self) -> f64 {
        self.thickness / 2.0
    }

    /// Returns the grid coordinate for signed indices, `None` outside the ladder.
    #[inline]
    #[must_use]
    pub fn checked_coord(&self, row: i32, col: i32) -> Option<GridCoordinate> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < self.rows && col < self.columns).then_some(GridCoordinate { row, col })
    }

    /// Pixel row containing the local x coordinate (centered-bin convention).
    #[inline]
    #[must_use]
    pub fn x_to_row(&self, x: f64) -> i32 {
        ((x + self.half_width()) / self.pixel_size_x).floor() as i32
    }

    /// Pixel column containing the local y coordinate.
    #[inline]
    #[must_use]
    pub fn y_to_col(&self, y: f64) -> i32 {
        ((y + self.half_length()) / self.pixel_size_y).floor() as i32
    }

    /// Local x of the centre of a pixel row.
    #[inline]
    #[must_use]
    pub fn row_to_x(&self, row: i32) -> f64 {
        (0.5 + f64::from(row)) * self.pixel_size_x - self.half_width()
    }

    /// Local y of the centre of a pixel column.
    #[inline]
    #[must_use]
    pub fn col_to_y(&self, col: i32) -> f64 {
        (0.5 + f64::from(col)) * self.pixel_size_y - self.half_length()
    }

    /// Converts a grid-frame position (`row * pitch_x`, `col * pitch_y`) to
    /// ladder-local coordinates centred on the ladder.
    #[inline]
    #[must_use]
    pub fn grid_to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x + 0.5 * self.pixel_size_x - self.half_width(),
            y + 0.5 * self.pixel_size_y - self.half_length(),
        )
    }

    /// Ladder row of a row inside sensor tile `seg_x`.
    #[inline]
    #[must_use]
    pub fn sensor_row_to_ladder_row(&self, seg_x: usize, pos_x: usize) -> usize {
        seg_x * self.sensor_rows + pos_x
    }

    /// Ladder column of a column inside sensor tile `seg_y`.
    #[inline]
    #[must_use]
    pub fn sensor_col_to_ladder_col(&self, seg_y: usize, pos_y: usize) -> usize {
        seg_y * self.sensor_columns + pos_y
    }

    /// Tile containing a ladder pixel.
    #[inline]
    #[must_use]
    pub fn segment_of(&self, row: usize, col: usize) -> (usize, usize) {
        (row / self.sensor_rows, col / self.sensor_columns)
    }

    /// Linear index of a tile, `seg_x * y_segments + seg_y`.
    #[inline]
    #[must_use]
    pub fn segment_index(&self, seg_x: usize, seg_y: usize) -> usize {
        seg_x * self.y_segments + seg_y
    }

    /// Whether `(seg_x, seg_y)` names an existing tile.
    #[inline]
    #[must_use]
    pub fn has_segment(&self, seg_x: usize, seg_y: usize) -> bool {
        seg_x < self.x_segments && seg_y < self.y_segments
    }

    /// Whether a pixel lies on the outer border of the ladder.
    #[inline]
    #[must_use]
    pub fn is_edge(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.columns
    }
}

/// Number of pixels of pitch `pitch` spanning `extent`. The ratio must be
/// integral up to rounding noise.
fn whole_pixels(name: &str, extent: f64, pitch: f64) -> Result<usize> {
    let ratio = extent / pitch;
    let count = ratio.round();
    if (ratio - count).abs() > PIXEL_COUNT_TOLERANCE * count.max(1.0) {
        return Err(Error::Geometry(format!(
            "{name} {extent} is not a whole number of {pitch} pixels"
        )));
    }
    Ok(count as usize)
}

const PIXEL_COUNT_TOLERANCE: f64 = 1e-6;
