//! Tick-driven digitization of one ladder.
//!
//! [`HkSensor`] owns the pixel matrix of a ladder together with the
//! labeling set and the cluster heaps. Each tick runs the same cycle:
//!
//! 1. charge is pushed with [`HkSensor::update_pixel`]
//! 2. [`HkSensor::clock_sync`] advances the front end by one clock period
//! 3. [`HkSensor::build_hits`] labels the clusterable pixels, hands the
//!    clusters and the completed measurements to the heaps and turns every
//!    finished cluster into a [`SegmentDigiHit`]
//!
//! At the end of an event [`HkSensor::finish`] forces out whatever is still
//! open, and [`HkSensor::reset`] prepares the sensor for the next event.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

use std::sync::Arc;

use vxdigi_core::{
    CellIdEncoder, ChargeDeposit, ChargePoint, ClusteringScope, Error, LadderGeometry,
    LinearPosition, PixelData, PixelStatus, Result, SegmentDigiHit, SensorConfig,
};
use vxdigi_frontend::{Discriminator, PixelDigiMatrix, SingleThreshold};

use crate::heap::{ClusterHeap, ClusterItem};
use crate::hoshen_kopelman::GridPartitionedSet;
use crate::postprocess::{ClusterProcessor, Passthrough};

/// Position of a sensor in its tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorPhase {
    /// No charge since the last reset or the last consumed tick.
    #[default]
    Idle,
    /// Charge pushed for the upcoming tick.
    Charging,
    /// Clock advanced, hits not built yet.
    Synced,
    /// Labeling pass in progress.
    Clustering,
    /// Measurements applied, finished clusters being emitted.
    Draining,
    /// Terminal drain done; only `reset` is accepted.
    Finished,
}

/// Result of driving one event through a sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorEventOutput {
    /// Hits in emission order.
    pub hits: Vec<SegmentDigiHit>,
    /// Deposits rejected because they fell outside the ladder.
    pub out_of_bounds: usize,
    /// Deposits at or after the end of the last tick.
    pub out_of_window: usize,
    /// Clusters released by the heaps, before post-processing.
    pub clusters: usize,
}

/// Digitizer of one ladder: front-end matrix, Hoshen-Kopelman labeling and
/// cross-tick cluster reconciliation.
pub struct HkSensor {
    matrix: PixelDigiMatrix,
    grid_set: GridPartitionedSet,
    heaps: Vec<ClusterHeap>,
    scope: ClusteringScope,
    encoder: CellIdEncoder,
    processor: Arc<dyn ClusterProcessor>,
    phase: SensorPhase,
    released: usize,
}

impl std::fmt::Debug for HkSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HkSensor")
            .field("layer", &self.matrix.layer())
            .field("ladder", &self.matrix.ladder())
            .field("scope", &self.scope)
            .field("phase", &self.phase)
            .field("processor", &self.processor.name())
            .finish_non_exhaustive()
    }
}

impl HkSensor {
    /// Builds a sensor with the identity post-processing hook.
    pub fn new(config: &SensorConfig) -> Result<Self> {
        Self::with_processor(config, Arc::new(Passthrough))
    }

    /// Builds a sensor with a custom post-processing hook.
    pub fn with_processor(
        config: &SensorConfig,
        processor: Arc<dyn ClusterProcessor>,
    ) -> Result<Self> {
        Self::with_hooks(config, processor, Arc::new(SingleThreshold))
    }

    /// Builds a sensor with a custom post-processing hook and front-end
    /// discriminator.
    ///
    /// # Errors
    /// Returns the geometry and configuration errors of the matrix, and
    /// [`Error::CellId`] if the cell-id layout cannot hold the identifiers
    /// of this ladder.
    pub fn with_hooks(
        config: &SensorConfig,
        processor: Arc<dyn ClusterProcessor>,
        discriminator: Arc<dyn Discriminator>,
    ) -> Result<Self> {
        let matrix = PixelDigiMatrix::with_discriminator(config, discriminator)?;
        let mut encoder = CellIdEncoder::parse(&config.cell_id_encoding)?;

        let geometry = matrix.geometry();
        let last_segment = geometry.segment_count() - 1;
        encode_cell_id(&mut encoder, &matrix, last_segment)?;

        let (grid_set, heap_count) = match config.scope {
            ClusteringScope::Ladder => (
                GridPartitionedSet::new(geometry.rows, geometry.columns),
                1,
            ),
            ClusteringScope::Sensor => (
                GridPartitionedSet::with_tiles(
                    geometry.rows,
                    geometry.columns,
                    geometry.sensor_rows,
                    geometry.sensor_columns,
                ),
                geometry.segment_count(),
            ),
        };

        let heaps = (0..heap_count)
            .map(|segment| {
                let mut heap = ClusterHeap::new(geometry.columns);
                match config.scope {
                    ClusteringScope::Ladder => {
                        heap.set_label(format!("{}/{}", config.layer, config.ladder));
                    }
                    ClusteringScope::Sensor => {
                        heap.set_label(format!("{}/{}/{segment}", config.layer, config.ladder));
                    }
                }
                heap
            })
            .collect();

        log::debug!(
            "sensor {}/{}: {}x{} pixels, {} heap(s), discriminator {}, post-processing {}",
            config.layer,
            config.ladder,
            geometry.rows,
            geometry.columns,
            heap_count,
            matrix.discriminator().name(),
            processor.name()
        );

        Ok(Self {
            matrix,
            grid_set,
            heaps,
            scope: config.scope,
            encoder,
            processor,
            phase: SensorPhase::Idle,
            released: 0,
        })
    }

    /// Front-end matrix of the ladder.
    #[must_use]
    pub fn matrix(&self) -> &PixelDigiMatrix {
        &self.matrix
    }

    /// Pixel layout of the ladder.
    #[must_use]
    pub fn geometry(&self) -> &LadderGeometry {
        self.matrix.geometry()
    }

    /// Connectivity scope of the labeling pass.
    #[must_use]
    pub fn scope(&self) -> ClusteringScope {
        self.scope
    }

    /// Current position in the tick cycle.
    #[must_use]
    pub fn phase(&self) -> SensorPhase {
        self.phase
    }

    /// Clusters still waiting for measurements, over all heaps.
    #[must_use]
    pub fn open_clusters(&self) -> usize {
        self.heaps.iter().map(ClusterHeap::open_clusters).sum()
    }

    /// Clusters released by the heaps since the last reset.
    #[must_use]
    pub fn released_clusters(&self) -> usize {
        self.released
    }

    /// Adds charge to a ladder pixel. Never fails; see
    /// [`PixelDigiMatrix::update_pixel`] for the returned status.
    pub fn update_pixel(&mut self, row: i32, col: i32, charge: f64) -> PixelStatus {
        if self.phase == SensorPhase::Idle {
            self.phase = SensorPhase::Charging;
        }
        self.matrix.update_pixel(row, col, charge)
    }

    /// Advances the front end by one clock period.
    ///
    /// # Errors
    /// Returns [`Error::Sequence`] if the previous tick has not been consumed
    /// by [`build_hits`](Self::build_hits) or the sensor is finished.
    pub fn clock_sync(&mut self) -> Result<()> {
        match self.phase {
            SensorPhase::Synced => Err(Error::Sequence {
                expected: "build_hits",
                found: "clock_sync",
            }),
            SensorPhase::Finished => Err(Error::Sequence {
                expected: "reset",
                found: "clock_sync",
            }),
            _ => {
                self.matrix.clock_sync();
                self.phase = SensorPhase::Synced;
                Ok(())
            }
        }
    }

    /// Consumes the last tick and appends the finished hits to `output`.
    ///
    /// # Errors
    /// Returns [`Error::Sequence`] unless [`clock_sync`](Self::clock_sync)
    /// was called since the last `build_hits`.
    pub fn build_hits(&mut self, output: &mut Vec<SegmentDigiHit>) -> Result<()> {
        if self.phase != SensorPhase::Synced {
            return Err(Error::Sequence {
                expected: "clock_sync",
                found: "build_hits",
            });
        }

        self.phase = SensorPhase::Clustering;
        if self.matrix.has_clusterable() {
            self.label_clusters();
        }

        self.phase = SensorPhase::Draining;
        let completed = self.matrix.completed().to_vec();
        self.apply_measurements(&completed);
        let popped: Vec<ClusterItem> = self
            .heaps
            .iter_mut()
            .flat_map(ClusterHeap::pop_clusters)
            .collect();
        self.commit(popped, output)?;

        self.phase = SensorPhase::Idle;
        Ok(())
    }

    /// One full tick: [`clock_sync`](Self::clock_sync) then
    /// [`build_hits`](Self::build_hits).
    pub fn tick(&mut self, output: &mut Vec<SegmentDigiHit>) -> Result<()> {
        self.clock_sync()?;
        self.build_hits(output)
    }

    /// Terminal drain of the event.
    ///
    /// Charge pushed since the last tick is evaluated by one more tick.
    /// Pixels still over threshold are then completed with the charge
    /// collected so far, and every open cluster is released and emitted.
    ///
    /// # Errors
    /// Returns [`Error::Sequence`] if a synced tick has not been consumed.
    pub fn finish(&mut self, output: &mut Vec<SegmentDigiHit>) -> Result<()> {
        match self.phase {
            SensorPhase::Synced => {
                return Err(Error::Sequence {
                    expected: "build_hits",
                    found: "finish",
                });
            }
            SensorPhase::Charging => self.tick(output)?,
            _ => {}
        }

        self.phase = SensorPhase::Draining;
        let flushed = self.matrix.flush_ready();
        self.apply_measurements(&flushed);

        let mut popped = Vec::new();
        for heap in &mut self.heaps {
            popped.extend(heap.pop_clusters());
            popped.extend(heap.drain());
        }
        self.commit(popped, output)?;

        log::debug!(
            "sensor {}/{} finished after {} ticks: {} clusters released",
            self.matrix.layer(),
            self.matrix.ladder(),
            self.matrix.ticks(),
            self.released
        );
        self.phase = SensorPhase::Finished;
        Ok(())
    }

    /// Clears pixels, heaps and clock for a new event.
    pub fn reset(&mut self) {
        self.matrix.reset();
        self.grid_set.init();
        for heap in &mut self.heaps {
            heap.clear();
        }
        self.released = 0;
        self.phase = SensorPhase::Idle;
    }

    /// Runs one event over `ticks` clock periods.
    ///
    /// Deposits are applied in time order; a deposit is pushed before the
    /// first tick whose period ends after it, so deposits before the start
    /// time land in tick 0. Deposits at or after the end of the last period
    /// are counted as out of window. The sensor is reset first and finished
    /// at the end.
    ///
    /// Deposits are expected to belong to this ladder; others are skipped.
    pub fn run_event(
        &mut self,
        deposits: &[ChargeDeposit],
        ticks: usize,
    ) -> Result<SensorEventOutput> {
        self.reset();

        let (layer, ladder) = (self.matrix.layer(), self.matrix.ladder());
        let mut ordered: Vec<&ChargeDeposit> = deposits
            .iter()
            .filter(|d| {
                let own = d.layer == layer && d.ladder == ladder;
                if !own {
                    log::warn!(
                        "sensor {layer}/{ladder}: skipping deposit for ladder {}/{}",
                        d.layer,
                        d.ladder
                    );
                }
                own
            })
            .collect();
        ordered.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut output = SensorEventOutput::default();
        let mut pending = ordered.into_iter().peekable();
        for _ in 0..ticks {
            let period_end = self.matrix.clock_time() + self.matrix.clock_step();
            while let Some(deposit) = pending.next_if(|d| d.time < period_end) {
                self.update_pixel(deposit.row, deposit.col, deposit.charge);
            }
            self.tick(&mut output.hits)?;
        }
        output.out_of_window = pending.count();
        output.out_of_bounds = self.matrix.out_of_bounds_count();

        self.finish(&mut output.hits)?;
        output.clusters = self.released;

        if output.out_of_window > 0 || output.out_of_bounds > 0 {
            log::warn!(
                "sensor {layer}/{ladder}: ignored {} out-of-window and {} out-of-bounds deposits",
                output.out_of_window,
                output.out_of_bounds
            );
        }
        Ok(output)
    }

    fn label_clusters(&mut self) {
        let time = self.matrix.sync_time();
        let locate = self.matrix.locate();

        self.grid_set.init();
        for pos in self.matrix.clusterable() {
            let coord = locate.coord(pos);
            self.grid_set.add(coord.row, coord.col);
        }
        self.grid_set.close();

        while let Some(cluster) = self.grid_set.next_cluster() {
            let heap = self.heap_index(cluster[0]);
            self.heaps[heap].add_cluster(&cluster, time);
        }
    }

    fn apply_measurements(&mut self, measurements: &[(LinearPosition, PixelData)]) {
        let locate = self.matrix.locate();
        for &(pos, data) in measurements {
            let coord = locate.coord(pos);
            let heap = self.heap_index(pos);
            self.heaps[heap].setup_pixel(coord.row, coord.col, data);
        }
    }

    fn heap_index(&self, pos: LinearPosition) -> usize {
        match self.scope {
            ClusteringScope::Ladder => 0,
            ClusteringScope::Sensor => {
                let geometry = self.matrix.geometry();
                let coord = self.matrix.locate().coord(pos);
                let (seg_x, seg_y) = geometry.segment_of(coord.row, coord.col);
                geometry.segment_index(seg_x, seg_y)
            }
        }
    }

    fn commit(&mut self, popped: Vec<ClusterItem>, output: &mut Vec<SegmentDigiHit>) -> Result<()> {
        self.released += popped.len();
        let processor = Arc::clone(&self.processor);
        for item in popped {
            for cluster in processor.process(item, self.matrix.geometry()) {
                if let Some(hit) = self.make_hit(cluster)? {
                    output.push(hit);
                }
            }
        }
        Ok(())
    }

    fn make_hit(&mut self, cluster: ClusterItem) -> Result<Option<SegmentDigiHit>> {
        if cluster.pixels.is_empty() {
            return Ok(None);
        }
        let charge = cluster.total_charge();
        if charge < self.matrix.threshold() {
            log::trace!(
                "sensor {}/{}: cluster {} below threshold ({charge})",
                self.matrix.layer(),
                self.matrix.ladder(),
                cluster.id
            );
            return Ok(None);
        }

        let geometry = self.matrix.geometry();
        let (row, col) = centroid(&cluster.pixels);
        let seed_row = (row.round() as usize).min(geometry.rows - 1);
        let seed_col = (col.round() as usize).min(geometry.columns - 1);
        let (seg_x, seg_y) = geometry.segment_of(seed_row, seed_col);
        let segment = geometry.segment_index(seg_x, seg_y);
        let (x, y) = (row * geometry.pixel_size_x, col * geometry.pixel_size_y);

        let cell_id = encode_cell_id(&mut self.encoder, &self.matrix, segment)?;
        Ok(Some(SegmentDigiHit {
            x,
            y,
            charge,
            time: cluster.time,
            cell_id,
            size: cluster.pixels.len(),
            pixels: cluster.pixels,
        }))
    }
}

/// Charge-weighted centroid in pixel units, arithmetic mean if every
/// charge is zero.
fn centroid(pixels: &[ChargePoint]) -> (f64, f64) {
    let total: f64 = pixels.iter().map(|p| p.charge).sum();
    if total > 0.0 {
        let row = pixels.iter().map(|p| p.charge * p.row as f64).sum::<f64>() / total;
        let col = pixels.iter().map(|p| p.charge * p.col as f64).sum::<f64>() / total;
        (row, col)
    } else {
        let n = pixels.len() as f64;
        let row = pixels.iter().map(|p| p.row as f64).sum::<f64>() / n;
        let col = pixels.iter().map(|p| p.col as f64).sum::<f64>() / n;
        (row, col)
    }
}

fn encode_cell_id(
    encoder: &mut CellIdEncoder,
    matrix: &PixelDigiMatrix,
    segment: usize,
) -> Result<u64> {
    let fields = [
        ("system", i64::from(matrix.barrel_id())),
        ("side", 0),
        ("layer", i64::from(matrix.layer())),
        ("module", i64::from(matrix.ladder())),
        ("sensor", segment as i64),
    ];
    encoder.reset();
    for (name, value) in fields {
        if encoder.has_field(name) {
            encoder.set(name, value)?;
        }
    }
    Ok(encoder.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config() -> SensorConfig {
        SensorConfig::new()
            .with_ids(2, 7)
            .with_dimensions(1.0, 0.5, 0.05)
            .with_pixel_size(0.025, 0.025)
            .with_threshold(200.0)
            .with_discharge_slope(50.0)
            .with_clock(0.0, 1.0)
    }

    #[test]
    fn test_single_pixel_end_to_end() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        sensor.update_pixel(3, 5, 500.0);

        let mut hits = Vec::new();
        for _ in 0..7 {
            sensor.tick(&mut hits).unwrap();
            assert!(hits.is_empty());
        }
        sensor.tick(&mut hits).unwrap();
        assert_eq!(hits.len(), 1);

        let hit = &hits[0];
        assert_abs_diff_eq!(hit.charge, 500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.time, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.x, 3.0 * 0.025, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.y, 5.0 * 0.025, epsilon = 1e-12);
        assert_eq!(hit.size, 1);

        let decoder = CellIdEncoder::parse(vxdigi_core::DEFAULT_CELL_ID_ENCODING).unwrap();
        assert_eq!(decoder.decode(hit.cell_id, "system"), Some(1));
        assert_eq!(decoder.decode(hit.cell_id, "layer"), Some(2));
        assert_eq!(decoder.decode(hit.cell_id, "module"), Some(7));
        assert_eq!(decoder.decode(hit.cell_id, "sensor"), Some(0));
        assert_eq!(sensor.open_clusters(), 0);
    }

    #[test]
    fn test_centroid_of_pair() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        sensor.update_pixel(0, 0, 300.0);
        sensor.update_pixel(0, 1, 300.0);

        let mut hits = Vec::new();
        for _ in 0..10 {
            sensor.tick(&mut hits).unwrap();
        }
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hits[0].y, 0.5 * 0.025, epsilon = 1e-12);
        assert_abs_diff_eq!(hits[0].charge, 600.0, epsilon = 1e-9);
        assert_eq!(hits[0].size, 2);
    }

    #[test]
    fn test_zero_charge_centroid_is_mean() {
        let pixels = [ChargePoint::new(1, 2, 0.0), ChargePoint::new(3, 4, 0.0)];
        let (row, col) = centroid(&pixels);
        assert_abs_diff_eq!(row, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(col, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_without_charge_is_quiet() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        sensor.update_pixel(4, 4, 900.0);
        sensor.tick(&mut Vec::new()).unwrap();
        sensor.reset();

        let mut hits = Vec::new();
        for _ in 0..100 {
            sensor.tick(&mut hits).unwrap();
            assert!(!sensor.matrix().is_active());
        }
        sensor.finish(&mut hits).unwrap();
        assert!(hits.is_empty());
        assert_eq!(sensor.released_clusters(), 0);
    }

    #[test]
    fn test_sequence_errors() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        let mut hits = Vec::new();

        assert!(matches!(
            sensor.build_hits(&mut hits),
            Err(Error::Sequence { found: "build_hits", .. })
        ));
        sensor.clock_sync().unwrap();
        assert_eq!(sensor.phase(), SensorPhase::Synced);
        assert!(matches!(
            sensor.clock_sync(),
            Err(Error::Sequence { expected: "build_hits", .. })
        ));
        assert!(sensor.finish(&mut hits).is_err());
        sensor.build_hits(&mut hits).unwrap();
        assert_eq!(sensor.phase(), SensorPhase::Idle);

        sensor.finish(&mut hits).unwrap();
        assert_eq!(sensor.phase(), SensorPhase::Finished);
        assert!(matches!(
            sensor.clock_sync(),
            Err(Error::Sequence { expected: "reset", .. })
        ));
        sensor.reset();
        assert!(sensor.tick(&mut hits).is_ok());
    }

    #[test]
    fn test_finish_flushes_ready_pixels() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        sensor.update_pixel(5, 5, 1000.0);
        let mut hits = Vec::new();
        sensor.tick(&mut hits).unwrap();
        sensor.tick(&mut hits).unwrap();
        assert!(hits.is_empty());
        assert_eq!(sensor.open_clusters(), 1);

        sensor.finish(&mut hits).unwrap();
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].charge, 1000.0, epsilon = 1e-9);
        assert_eq!(sensor.open_clusters(), 0);
    }

    #[test]
    fn test_finish_evaluates_pending_charge() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        sensor.update_pixel(3, 5, 500.0);
        assert_eq!(sensor.phase(), SensorPhase::Charging);

        let mut hits = Vec::new();
        sensor.finish(&mut hits).unwrap();
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].charge, 500.0, epsilon = 1e-9);
        assert_eq!(sensor.matrix().ticks(), 1);
        assert_eq!(sensor.open_clusters(), 0);
        assert_eq!(sensor.phase(), SensorPhase::Finished);

        // Charge under threshold is evaluated too, and yields nothing.
        sensor.reset();
        sensor.update_pixel(3, 5, 150.0);
        let mut hits = Vec::new();
        sensor.finish(&mut hits).unwrap();
        assert!(hits.is_empty());
        assert_eq!(sensor.matrix().ticks(), 1);
    }

    #[test]
    fn test_discriminator_hook() {
        let doubled = |charge: f64, threshold: f64| charge >= 2.0 * threshold;
        let mut sensor =
            HkSensor::with_hooks(&config(), Arc::new(Passthrough), Arc::new(doubled)).unwrap();
        sensor.update_pixel(2, 2, 300.0);
        sensor.update_pixel(9, 9, 500.0);
        let mut hits = Vec::new();
        for _ in 0..12 {
            sensor.tick(&mut hits).unwrap();
        }
        sensor.finish(&mut hits).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pixels[0].coord(), vxdigi_core::GridCoordinate::new(9, 9));
        assert_abs_diff_eq!(hits[0].charge, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scope_decides_tile_straddling() {
        let base = config().with_segments(2, 1);
        let decoder = CellIdEncoder::parse(vxdigi_core::DEFAULT_CELL_ID_ENCODING).unwrap();

        let run = |scope| {
            let mut sensor = HkSensor::new(&base.clone().with_scope(scope)).unwrap();
            // Rows 9 and 10 sit on either side of the tile border.
            sensor.update_pixel(9, 5, 400.0);
            sensor.update_pixel(10, 5, 400.0);
            let mut hits = Vec::new();
            for _ in 0..10 {
                sensor.tick(&mut hits).unwrap();
            }
            sensor.finish(&mut hits).unwrap();
            hits
        };

        let ladder = run(ClusteringScope::Ladder);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].size, 2);

        let tiles = run(ClusteringScope::Sensor);
        assert_eq!(tiles.len(), 2);
        let mut sensors: Vec<i64> = tiles
            .iter()
            .filter_map(|hit| decoder.decode(hit.cell_id, "sensor"))
            .collect();
        sensors.sort_unstable();
        assert_eq!(sensors, vec![0, 1]);
    }

    #[test]
    fn test_processor_hook() {
        let mut sensor = HkSensor::with_processor(
            &config(),
            Arc::new(crate::postprocess::EdgePixelFilter),
        )
        .unwrap();
        sensor.update_pixel(0, 0, 500.0);
        sensor.update_pixel(8, 8, 500.0);
        let mut hits = Vec::new();
        for _ in 0..10 {
            sensor.tick(&mut hits).unwrap();
        }
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pixels[0].coord(), vxdigi_core::GridCoordinate::new(8, 8));
        assert_eq!(sensor.released_clusters(), 2);
    }

    #[test]
    fn test_run_event_windows() {
        let mut sensor = HkSensor::new(&config()).unwrap();
        let deposits = [
            ChargeDeposit::new(2, 7, 3, 5, 300.0, 0.2),
            ChargeDeposit::new(2, 7, 3, 5, 200.0, -4.0),
            ChargeDeposit::new(2, 7, -1, 5, 500.0, 0.0),
            ChargeDeposit::new(2, 7, 6, 6, 500.0, 10.0),
            ChargeDeposit::new(3, 7, 1, 1, 500.0, 0.0),
        ];
        let output = sensor.run_event(&deposits, 10).unwrap();
        assert_eq!(output.hits.len(), 1);
        assert_abs_diff_eq!(output.hits[0].charge, 500.0, epsilon = 1e-9);
        assert_eq!(output.out_of_bounds, 1);
        assert_eq!(output.out_of_window, 1);
        assert_eq!(output.clusters, 1);
        assert_eq!(sensor.phase(), SensorPhase::Finished);

        // A second event starts from a clean sensor.
        let again = sensor.run_event(&deposits, 10).unwrap();
        assert_eq!(again, output);
    }

    #[test]
    fn test_cell_id_layout_too_small() {
        let narrow = config().with_ids(2, 300).with_cell_id_encoding("layer:4,module:8");
        assert!(matches!(HkSensor::new(&narrow), Err(Error::CellId(_))));
    }
}
