//! Pixel matrix of one ladder.
//!
//! Every pixel stores charge on a capacitor that is discharged linearly by
//! the front end. At each clock tick the stored level is compared with the
//! threshold, the transitions of the tick are recorded, and the level is
//! lowered by `slope * step`.
//!
//! # Pixel states
//!
//! | level at tick start           | status        |
//! |-------------------------------|---------------|
//! | `0`                           | `Idle`        |
//! | `0 < q < thr`, not fired      | `Charging`    |
//! | `q >= thr`                    | `Ready`       |
//! | `0 < q < thr`, fired          | `Discharging` |
//!
//! A pixel *fires* when it enters `Ready` and *completes* when it leaves it.
//! On completion the charge collected during the pulse is reported as a
//! measurement.
//!
//! "Over threshold" is decided by a [`Discriminator`], [`SingleThreshold`]
//! unless another one is injected.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

use std::sync::Arc;

use vxdigi_core::{
    GridPosition, LadderGeometry, LinearPosition, MatrixStatus, PixelData, PixelStatus, Result,
    SensorConfig,
};

use crate::discriminator::{Discriminator, SingleThreshold};

#[derive(Debug, Clone, Copy, Default)]
struct PixelRawData {
    /// Level stored on the pixel.
    charge: f64,
    /// Charge deposited since the pulse started.
    collected: f64,
    /// Ticks left until the stored level is fully discharged.
    counter: u32,
    fire_time: f64,
    status: PixelStatus,
    fired: bool,
    live: bool,
}

impl PixelRawData {
    #[inline]
    fn classify(&self, discriminator: &dyn Discriminator, threshold: f64) -> PixelStatus {
        if self.charge <= 0.0 {
            PixelStatus::Idle
        } else if discriminator.is_over_threshold(self.charge, threshold) {
            PixelStatus::Ready
        } else if self.fired {
            PixelStatus::Discharging
        } else {
            PixelStatus::Charging
        }
    }
}

/// Simulation of the pixel matrix of an RD53A-like readout chip.
///
/// The matrix covers a whole ladder; the ladder is divided into a grid of
/// sensors. State lives in one contiguous arena indexed by
/// [`LinearPosition`]; only pixels holding charge (the live list) are visited
/// at each tick.
///
/// The matrix must be driven by an agent that pushes charge with
/// [`update_pixel`](Self::update_pixel) and calls
/// [`clock_sync`](Self::clock_sync) exactly once per clock period.
#[derive(Clone)]
pub struct PixelDigiMatrix {
    geometry: LadderGeometry,
    locate: GridPosition,
    barrel_id: i32,
    cell_id_encoding: String,
    threshold: f64,
    discriminator: Arc<dyn Discriminator>,
    delta_c: f64,
    start_time: f64,
    clock_step: f64,
    ticks: u64,
    pixels: Vec<PixelRawData>,
    live: Vec<LinearPosition>,
    fired: Vec<LinearPosition>,
    completed: Vec<(LinearPosition, PixelData)>,
    status: MatrixStatus,
    out_of_bounds: usize,
}

impl std::fmt::Debug for PixelDigiMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelDigiMatrix")
            .field("geometry", &self.geometry)
            .field("threshold", &self.threshold)
            .field("discriminator", &self.discriminator.name())
            .field("ticks", &self.ticks)
            .field("live", &self.live.len())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl PixelDigiMatrix {
    /// Creates the matrix of pixels for the ladder described by `config`,
    /// discriminating with [`SingleThreshold`].
    ///
    /// # Errors
    /// Returns `Error::Geometry` if the segment counts do not tile the ladder
    /// and `Error::Config` for invalid front-end parameters.
    pub fn new(config: &SensorConfig) -> Result<Self> {
        Self::with_discriminator(config, Arc::new(SingleThreshold))
    }

    /// Same as [`PixelDigiMatrix::new`] with a custom discriminator.
    pub fn with_discriminator(
        config: &SensorConfig,
        discriminator: Arc<dyn Discriminator>,
    ) -> Result<Self> {
        config.validate()?;
        let geometry = LadderGeometry::from_config(config)?;
        let pixels = vec![PixelRawData::default(); geometry.pixel_count()];

        Ok(Self {
            locate: geometry.locate(),
            geometry,
            barrel_id: config.barrel_id,
            cell_id_encoding: config.cell_id_encoding.clone(),
            threshold: config.threshold,
            discriminator,
            delta_c: config.discharge_per_tick(),
            start_time: config.start_time,
            clock_step: config.clock_step,
            ticks: 0,
            pixels,
            live: Vec::new(),
            fired: Vec::new(),
            completed: Vec::new(),
            status: MatrixStatus::Ok,
            out_of_bounds: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &LadderGeometry {
        &self.geometry
    }

    #[inline]
    #[must_use]
    pub fn locate(&self) -> GridPosition {
        self.locate
    }

    #[inline]
    #[must_use]
    pub fn layer(&self) -> i32 {
        self.geometry.layer
    }

    #[inline]
    #[must_use]
    pub fn ladder(&self) -> i32 {
        self.geometry.ladder
    }

    #[inline]
    #[must_use]
    pub fn barrel_id(&self) -> i32 {
        self.barrel_id
    }

    #[inline]
    #[must_use]
    pub fn cell_id_encoding(&self) -> &str {
        &self.cell_id_encoding
    }

    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Discriminator deciding the `Ready` state.
    #[must_use]
    pub fn discriminator(&self) -> &dyn Discriminator {
        self.discriminator.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn clock_step(&self) -> f64 {
        self.clock_step
    }

    /// Matrix-level status: index errors recorded since the last reset.
    #[inline]
    #[must_use]
    pub fn status(&self) -> MatrixStatus {
        self.status
    }

    /// Number of deposits rejected because they fell outside the ladder.
    #[inline]
    #[must_use]
    pub fn out_of_bounds_count(&self) -> usize {
        self.out_of_bounds
    }

    /// Number of completed clock ticks since the last reset.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time of the next clock tick.
    #[inline]
    #[must_use]
    pub fn clock_time(&self) -> f64 {
        self.tick_time(self.ticks)
    }

    /// Time of the most recently evaluated tick (start time before the first).
    #[inline]
    #[must_use]
    pub fn sync_time(&self) -> f64 {
        self.tick_time(self.ticks.saturating_sub(1))
    }

    #[inline]
    fn tick_time(&self, tick: u64) -> f64 {
        self.start_time + tick as f64 * self.clock_step
    }

    /// Clears every pixel and restores the clock to the start time.
    pub fn reset(&mut self) {
        for &idx in &self.live {
            self.pixels[idx] = PixelRawData::default();
        }
        self.live.clear();
        self.fired.clear();
        self.completed.clear();
        self.ticks = 0;
        self.status = MatrixStatus::Ok;
        self.out_of_bounds = 0;
    }

    /// Adds charge to a pixel of the ladder.
    ///
    /// Indices outside the ladder are not an error: diffusion tails spill
    /// over the sensor edges. They are counted, flagged in the matrix status
    /// and reported as [`PixelStatus::OutOfBounds`]. Non-positive or
    /// non-finite charge is ignored.
    pub fn update_pixel(&mut self, row: i32, col: i32, charge: f64) -> PixelStatus {
        let Some(coord) = self.geometry.checked_coord(row, col) else {
            self.out_of_bounds += 1;
            if self.status == MatrixStatus::Ok {
                self.status = MatrixStatus::PixelNumberError;
            }
            return PixelStatus::OutOfBounds;
        };
        self.charge(self.locate.linear(coord.row, coord.col), charge)
    }

    /// Adds charge to a pixel addressed inside a sensor tile.
    pub fn update_sensor_pixel(
        &mut self,
        seg_x: usize,
        seg_y: usize,
        pos_x: usize,
        pos_y: usize,
        charge: f64,
    ) -> PixelStatus {
        if !self.geometry.has_segment(seg_x, seg_y) {
            self.status = MatrixStatus::SegmentNumberError;
            return PixelStatus::GeometryError;
        }
        if pos_x >= self.geometry.sensor_rows || pos_y >= self.geometry.sensor_columns {
            self.out_of_bounds += 1;
            if self.status == MatrixStatus::Ok {
                self.status = MatrixStatus::PixelNumberError;
            }
            return PixelStatus::OutOfBounds;
        }
        let row = self.geometry.sensor_row_to_ladder_row(seg_x, pos_x);
        let col = self.geometry.sensor_col_to_ladder_col(seg_y, pos_y);
        self.charge(self.locate.linear(row, col), charge)
    }

    fn charge(&mut self, idx: LinearPosition, charge: f64) -> PixelStatus {
        let pix = &mut self.pixels[idx];
        if !(charge.is_finite() && charge > 0.0) {
            return pix.status;
        }
        pix.charge += charge;
        pix.collected += charge;
        pix.counter = (pix.charge / self.delta_c).ceil() as u32;
        if !pix.live {
            pix.live = true;
            self.live.push(idx);
        }
        pix.status
    }

    /// Advances the matrix by one clock period.
    ///
    /// For every live pixel the status is evaluated on the stored level, the
    /// fire/complete transitions are recorded, the decay counter is updated
    /// and the level is decreased by `slope * step`. Transitions of the
    /// previous tick are discarded.
    ///
    /// Calling this twice for one tick decays the charge twice.
    pub fn clock_sync(&mut self) {
        let now = self.clock_time();
        let threshold = self.threshold;
        let delta_c = self.delta_c;
        let discriminator = self.discriminator.as_ref();

        self.fired.clear();
        self.completed.clear();

        let pixels = &mut self.pixels;
        let fired = &mut self.fired;
        let completed = &mut self.completed;

        self.live.retain(|&idx| {
            let pix = &mut pixels[idx];
            let was_ready = pix.status == PixelStatus::Ready;
            let status = pix.classify(discriminator, threshold);

            if status == PixelStatus::Ready && !was_ready {
                pix.fired = true;
                pix.fire_time = now;
                fired.push(idx);
            } else if was_ready && status != PixelStatus::Ready {
                completed.push((
                    idx,
                    PixelData {
                        charge: pix.collected,
                        time: pix.fire_time,
                        status,
                    },
                ));
                pix.collected = 0.0;
            }

            pix.status = status;
            pix.counter = pix.counter.saturating_sub(1);
            pix.charge = (pix.charge - delta_c).max(0.0);

            if status == PixelStatus::Idle {
                *pix = PixelRawData::default();
                false
            } else {
                true
            }
        });

        self.fired.sort_unstable();
        self.completed.sort_unstable_by_key(|&(idx, _)| idx);
        self.ticks += 1;

        log::trace!(
            "ladder {}/{} tick {} at {}: {} live, {} fired, {} completed",
            self.geometry.layer,
            self.geometry.ladder,
            self.ticks,
            now,
            self.live.len(),
            self.fired.len(),
            self.completed.len()
        );
    }

    /// Completes every pixel that is still over threshold and returns the
    /// measurements, in ascending position order.
    ///
    /// Used to drain the matrix at the end of an event.
    pub fn flush_ready(&mut self) -> Vec<(LinearPosition, PixelData)> {
        let mut flushed = Vec::new();
        for &idx in &self.live {
            let pix = &mut self.pixels[idx];
            if pix.status != PixelStatus::Ready {
                continue;
            }
            pix.status = PixelStatus::Discharging;
            flushed.push((
                idx,
                PixelData {
                    charge: pix.collected,
                    time: pix.fire_time,
                    status: pix.status,
                },
            ));
            pix.collected = 0.0;
        }
        flushed.sort_unstable_by_key(|&(idx, _)| idx);
        flushed
    }

    /// Pixels that fired at the last tick.
    #[inline]
    #[must_use]
    pub fn fired(&self) -> &[LinearPosition] {
        &self.fired
    }

    /// Measurements of the pixels that left `Ready` at the last tick.
    #[inline]
    #[must_use]
    pub fn completed(&self) -> &[(LinearPosition, PixelData)] {
        &self.completed
    }

    /// Whether the last tick produced anything to cluster.
    #[must_use]
    pub fn has_clusterable(&self) -> bool {
        !self.completed.is_empty() || self.ready_count() > 0
    }

    /// Positions taking part in a clustering pass: pixels over threshold and
    /// pixels that completed at the last tick, ascending (row-major).
    #[must_use]
    pub fn clusterable(&self) -> Vec<LinearPosition> {
        let mut positions: Vec<LinearPosition> = self
            .live
            .iter()
            .copied()
            .filter(|&idx| self.pixels[idx].status == PixelStatus::Ready)
            .chain(self.completed.iter().map(|&(idx, _)| idx))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// Number of pixels currently over threshold.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.live
            .iter()
            .filter(|&&idx| self.pixels[idx].status == PixelStatus::Ready)
            .count()
    }

    /// Number of pixels holding charge or pending decay.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// True if any pixel holds a nonzero charge.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.live.iter().any(|&idx| self.pixels[idx].charge > 0.0)
    }

    /// Reads a pixel of the ladder.
    #[must_use]
    pub fn get_pixel(&self, row: i32, col: i32) -> PixelData {
        match self.geometry.checked_coord(row, col) {
            Some(coord) => self.pixel_at(self.locate.linear(coord.row, coord.col)),
            None => PixelData::with_status(PixelStatus::OutOfBounds),
        }
    }

    /// Reads a pixel addressed inside a sensor tile.
    #[must_use]
    pub fn get_sensor_pixel(
        &self,
        seg_x: usize,
        seg_y: usize,
        pos_x: usize,
        pos_y: usize,
    ) -> PixelData {
        if !self.geometry.has_segment(seg_x, seg_y) {
            return PixelData::with_status(PixelStatus::GeometryError);
        }
        if pos_x >= self.geometry.sensor_rows || pos_y >= self.geometry.sensor_columns {
            return PixelData::with_status(PixelStatus::OutOfBounds);
        }
        let row = self.geometry.sensor_row_to_ladder_row(seg_x, pos_x);
        let col = self.geometry.sensor_col_to_ladder_col(seg_y, pos_y);
        self.pixel_at(self.locate.linear(row, col))
    }

    /// Reads a pixel by linear position. The position must be on the ladder.
    #[must_use]
    pub fn pixel_at(&self, idx: LinearPosition) -> PixelData {
        let pix = &self.pixels[idx];
        PixelData {
            charge: pix.charge,
            time: if pix.fired { pix.fire_time } else { self.start_time },
            status: pix.status,
        }
    }

    /// Remaining decay ticks of a pixel, `None` outside the ladder.
    #[must_use]
    pub fn decay_counter(&self, row: i32, col: i32) -> Option<u32> {
        let coord = self.geometry.checked_coord(row, col)?;
        Some(self.pixels[self.locate.linear(coord.row, coord.col)].counter)
    }

    /// Whether a pixel is in the given state.
    #[must_use]
    pub fn check_status(&self, row: i32, col: i32, status: PixelStatus) -> bool {
        self.get_pixel(row, col).status == status
    }

    /// Whether any pixel of a sensor tile is in the given state.
    #[must_use]
    pub fn check_status_on_sensor(&self, seg_x: usize, seg_y: usize, status: PixelStatus) -> bool {
        if !self.geometry.has_segment(seg_x, seg_y) {
            return status == PixelStatus::GeometryError;
        }
        match status {
            PixelStatus::OutOfBounds | PixelStatus::GeometryError => false,
            PixelStatus::Idle => {
                let busy = self.live_in_segment(seg_x, seg_y).count();
                busy < self.geometry.sensor_rows * self.geometry.sensor_columns
            }
            _ => self
                .live_in_segment(seg_x, seg_y)
                .any(|idx| self.pixels[idx].status == status),
        }
    }

    fn live_in_segment(
        &self,
        seg_x: usize,
        seg_y: usize,
    ) -> impl Iterator<Item = LinearPosition> + '_ {
        self.live.iter().copied().filter(move |&idx| {
            let coord = self.locate.coord(idx);
            self.geometry.segment_of(coord.row, coord.col) == (seg_x, seg_y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vxdigi_core::Error;

    fn config() -> SensorConfig {
        SensorConfig::new()
            .with_dimensions(0.5, 0.25, 0.05)
            .with_pixel_size(0.025, 0.025)
            .with_segments(2, 4)
            .with_threshold(200.0)
            .with_discharge_slope(50.0)
            .with_clock(0.0, 1.0)
    }

    #[test]
    fn test_construction_geometry() {
        let matrix = PixelDigiMatrix::new(&config()).unwrap();
        let geometry = matrix.geometry();
        assert_eq!(geometry.rows, 10);
        assert_eq!(geometry.columns, 20);
        assert_eq!(geometry.sensor_rows, 5);
        assert_eq!(geometry.sensor_columns, 5);
    }

    #[test]
    fn test_construction_fails_on_bad_tiling() {
        let result = PixelDigiMatrix::new(&config().with_segments(3, 4));
        assert!(matches!(result, Err(Error::Geometry(_))));
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut matrix = PixelDigiMatrix::new(&config()).unwrap();
        assert_eq!(matrix.update_pixel(-1, 0, 100.0), PixelStatus::OutOfBounds);
        assert_eq!(matrix.update_pixel(0, 20, 100.0), PixelStatus::OutOfBounds);
        assert_eq!(matrix.update_pixel(10, 0, 100.0), PixelStatus::OutOfBounds);
        assert_eq!(matrix.out_of_bounds_count(), 3);
        assert_eq!(matrix.status(), MatrixStatus::PixelNumberError);
        assert!(!matrix.is_active());
        assert_eq!(matrix.get_pixel(-1, 0).status, PixelStatus::OutOfBounds);
    }

    #[test]
    fn test_status_transitions() {
        let mut matrix = PixelDigiMatrix::new(&config()).unwrap();
        matrix.update_pixel(1, 1, 120.0);
        assert_eq!(matrix.decay_counter(1, 1), Some(3));
        matrix.clock_sync();
        assert!(matrix.check_status(1, 1, PixelStatus::Charging));
        assert!(matrix.fired().is_empty());

        matrix.update_pixel(1, 1, 200.0);
        matrix.clock_sync();
        assert!(matrix.check_status(1, 1, PixelStatus::Ready));
        assert_eq!(matrix.fired(), &[21]);

        // 270 -> 220 -> 170
        matrix.clock_sync();
        assert!(matrix.check_status(1, 1, PixelStatus::Ready));
        matrix.clock_sync();
        assert!(matrix.check_status(1, 1, PixelStatus::Discharging));
        let completed = matrix.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, 21);
        assert!((completed[0].1.charge - 320.0).abs() < 1e-9);
        assert!((completed[0].1.time - 1.0).abs() < 1e-9);

        for _ in 0..4 {
            matrix.clock_sync();
        }
        assert!(matrix.check_status(1, 1, PixelStatus::Idle));
        assert_eq!(matrix.live_count(), 0);
    }

    #[test]
    fn test_zero_threshold_crossing_is_reported() {
        let mut matrix = PixelDigiMatrix::new(&config()).unwrap();
        matrix.update_pixel(0, 0, 250.0);
        matrix.clock_sync();
        assert!(matrix.check_status(0, 0, PixelStatus::Ready));
        matrix.clock_sync();
        assert!(matrix.check_status(0, 0, PixelStatus::Ready));
        // Level reached zero while over threshold: completion and idle at once.
        let mut matrix = PixelDigiMatrix::new(&config().with_threshold(50.0)).unwrap();
        matrix.update_pixel(0, 0, 50.0);
        matrix.clock_sync();
        assert!(!matrix.is_active());
        assert_eq!(matrix.clusterable(), vec![0]);
        matrix.clock_sync();
        assert_eq!(matrix.completed().len(), 1);
        assert!(matrix.check_status(0, 0, PixelStatus::Idle));
    }

    #[test]
    fn test_custom_discriminator() {
        let strict = |charge: f64, threshold: f64| charge >= 2.0 * threshold;
        let mut matrix = PixelDigiMatrix::with_discriminator(&config(), Arc::new(strict)).unwrap();
        assert_eq!(matrix.discriminator().name(), "custom");
        matrix.update_pixel(0, 0, 300.0);
        matrix.update_pixel(0, 5, 450.0);
        matrix.clock_sync();
        assert!(matrix.check_status(0, 0, PixelStatus::Charging));
        assert!(matrix.check_status(0, 5, PixelStatus::Ready));
        assert_eq!(matrix.fired(), &[5]);

        // 400 left: still over twice the threshold; 350 is not.
        matrix.clock_sync();
        assert!(matrix.check_status(0, 5, PixelStatus::Ready));
        matrix.clock_sync();
        assert!(matrix.check_status(0, 5, PixelStatus::Discharging));
        assert_eq!(matrix.completed().len(), 1);
        assert!((matrix.completed()[0].1.charge - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_addressing() {
        let mut matrix = PixelDigiMatrix::new(&config()).unwrap();
        assert_eq!(
            matrix.update_sensor_pixel(2, 0, 0, 0, 10.0),
            PixelStatus::GeometryError
        );
        assert_eq!(matrix.status(), MatrixStatus::SegmentNumberError);
        assert_eq!(
            matrix.get_sensor_pixel(0, 4, 0, 0).status,
            PixelStatus::GeometryError
        );
        assert_eq!(
            matrix.get_sensor_pixel(0, 0, 5, 0).status,
            PixelStatus::OutOfBounds
        );

        matrix.update_sensor_pixel(1, 2, 3, 4, 300.0);
        matrix.clock_sync();
        assert!(matrix.check_status(8, 14, PixelStatus::Ready));
        assert!(matrix.check_status_on_sensor(1, 2, PixelStatus::Ready));
        assert!(!matrix.check_status_on_sensor(0, 0, PixelStatus::Ready));
        assert!(matrix.check_status_on_sensor(1, 2, PixelStatus::Idle));
        assert!(matrix.check_status_on_sensor(5, 5, PixelStatus::GeometryError));
    }

    #[test]
    fn test_flush_ready() {
        let mut matrix = PixelDigiMatrix::new(&config()).unwrap();
        matrix.update_pixel(2, 3, 1000.0);
        matrix.update_pixel(2, 4, 100.0);
        matrix.clock_sync();
        let flushed = matrix.flush_ready();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].0, 43);
        assert!((flushed[0].1.charge - 1000.0).abs() < 1e-9);
        assert_eq!(matrix.ready_count(), 0);
    }

    #[test]
    fn test_reset_restores_clock() {
        let mut matrix = PixelDigiMatrix::new(&config().with_clock(10.0, 2.5)).unwrap();
        matrix.update_pixel(0, 0, 500.0);
        matrix.clock_sync();
        matrix.clock_sync();
        assert!((matrix.clock_time() - 15.0).abs() < 1e-9);
        assert!((matrix.sync_time() - 12.5).abs() < 1e-9);
        matrix.update_pixel(-5, 0, 1.0);
        matrix.reset();
        assert_eq!(matrix.ticks(), 0);
        assert!((matrix.clock_time() - 10.0).abs() < 1e-9);
        assert!(!matrix.is_active());
        assert_eq!(matrix.live_count(), 0);
        assert_eq!(matrix.status(), MatrixStatus::Ok);
        assert_eq!(matrix.out_of_bounds_count(), 0);
    }
}
