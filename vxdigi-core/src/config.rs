//! Sensor configuration.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default LCIO tracker cell-id layout.
pub const DEFAULT_CELL_ID_ENCODING: &str = "system:5,side:-2,layer:9,module:8,sensor:8";

/// Extent of the connectivity search during a clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClusteringScope {
    /// Clusters may straddle sensor tiles; one heap per ladder.
    #[default]
    Ladder,
    /// Clusters are cut at tile borders; one heap per tile.
    Sensor,
}

/// Configuration of one ladder, fixed for the lifetime of a sensor instance.
///
/// Lengths are in millimetres, charges in electrons and times in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SensorConfig {
    /// Layer containing the ladder.
    pub layer: i32,
    /// Ladder index inside the layer.
    pub ladder: i32,
    /// Number of sensor tiles across the ladder width (rows).
    pub x_segments: usize,
    /// Number of sensor tiles along the ladder length (columns).
    pub y_segments: usize,
    /// Ladder length (along y / columns).
    pub ladder_length: f64,
    /// Ladder width (along x / rows).
    pub ladder_width: f64,
    /// Sensitive thickness.
    pub thickness: f64,
    /// Pixel pitch along x.
    pub pixel_size_x: f64,
    /// Pixel pitch along y.
    pub pixel_size_y: f64,
    /// Bit-field layout used to encode cell identifiers.
    pub cell_id_encoding: String,
    /// Vertex barrel identifier.
    pub barrel_id: i32,
    /// Per-pixel discriminator threshold.
    pub threshold: f64,
    /// Linear discharge slope of the front end (charge per time unit).
    pub discharge_slope: f64,
    /// Time of the first clock tick.
    pub start_time: f64,
    /// Clock period.
    pub clock_step: f64,
    /// Connectivity scope of the clustering pass.
    pub scope: ClusteringScope,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            layer: 0,
            ladder: 0,
            x_segments: 1,
            y_segments: 1,
            ladder_length: 12.8,
            ladder_width: 12.8,
            thickness: 0.05,
            pixel_size_x: 0.025,
            pixel_size_y: 0.025,
            cell_id_encoding: DEFAULT_CELL_ID_ENCODING.to_string(),
            barrel_id: 1,
            threshold: 200.0,
            discharge_slope: 50.0,
            start_time: 0.0,
            clock_step: 1.0,
            scope: ClusteringScope::Ladder,
        }
    }
}

impl SensorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the layer and ladder identifiers.
    #[must_use]
    pub fn with_ids(mut self, layer: i32, ladder: i32) -> Self {
        self.layer = layer;
        self.ladder = ladder;
        self
    }

    /// Sets the number of sensor tiles in x and y.
    #[must_use]
    pub fn with_segments(mut self, x_segments: usize, y_segments: usize) -> Self {
        self.x_segments = x_segments;
        self.y_segments = y_segments;
        self
    }

    /// Sets the ladder length, width and thickness.
    #[must_use]
    pub fn with_dimensions(mut self, length: f64, width: f64, thickness: f64) -> Self {
        self.ladder_length = length;
        self.ladder_width = width;
        self.thickness = thickness;
        self
    }

    /// Sets the pixel pitch.
    #[must_use]
    pub fn with_pixel_size(mut self, size_x: f64, size_y: f64) -> Self {
        self.pixel_size_x = size_x;
        self.pixel_size_y = size_y;
        self
    }

    /// Sets the cell-id encoding string.
    #[must_use]
    pub fn with_cell_id_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.cell_id_encoding = encoding.into();
        self
    }

    /// Sets the barrel identifier.
    #[must_use]
    pub fn with_barrel_id(mut self, barrel_id: i32) -> Self {
        self.barrel_id = barrel_id;
        self
    }

    /// Sets the discriminator threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the discharge slope.
    #[must_use]
    pub fn with_discharge_slope(mut self, slope: f64) -> Self {
        self.discharge_slope = slope;
        self
    }

    /// Sets the start time and the clock period.
    #[must_use]
    pub fn with_clock(mut self, start_time: f64, clock_step: f64) -> Self {
        self.start_time = start_time;
        self.clock_step = clock_step;
        self
    }

    /// Sets the clustering scope.
    #[must_use]
    pub fn with_scope(mut self, scope: ClusteringScope) -> Self {
        self.scope = scope;
        self
    }

    /// Charge removed from a pixel at every clock tick.
    #[must_use]
    pub fn discharge_per_tick(&self) -> f64 {
        self.discharge_slope * self.clock_step
    }

    /// Checks the electronics parameters. Geometry is validated separately
    /// by [`crate::LadderGeometry::from_config`].
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a non-positive slope or clock step, or a
    /// negative threshold.
    pub fn validate(&self) -> Result<()> {
        if !(self.discharge_slope.is_finite() && self.discharge_slope > 0.0) {
            return Err(Error::Config(format!(
                "discharge slope must be positive, got {}",
                self.discharge_slope
            )));
        }
        if !(self.clock_step.is_finite() && self.clock_step > 0.0) {
            return Err(Error::Config(format!(
                "clock step must be positive, got {}",
                self.clock_step
            )));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(Error::Config(format!(
                "threshold must be non-negative, got {}",
                self.threshold
            )));
        }
        if !self.start_time.is_finite() {
            return Err(Error::Config("start time must be finite".to_string()));
        }
        Ok(())
    }
}
