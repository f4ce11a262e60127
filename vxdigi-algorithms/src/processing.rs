//! Multi-ladder event processing.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use vxdigi_core::{ChargeDeposit, Error, Result, SegmentDigiHit, SensorConfig};
use vxdigi_frontend::{Discriminator, SingleThreshold};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::postprocess::{ClusterProcessor, Passthrough};
use crate::sensor::HkSensor;

/// Counters of one processed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitizationStatistics {
    /// Deposits handed to the digitizer.
    pub deposits: usize,
    /// Deposits addressed to a ladder without a sensor.
    pub unrouted: usize,
    /// Deposits outside their ladder.
    pub out_of_bounds: usize,
    /// Deposits after the end of the last tick.
    pub out_of_window: usize,
    /// Clusters released by the heaps.
    pub clusters: usize,
    /// Hits emitted.
    pub hits: usize,
}

/// Hits and counters of one event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventOutput {
    /// Hits of every ladder, in sensor order.
    pub hits: Vec<SegmentDigiHit>,
    /// Event counters.
    pub stats: DigitizationStatistics,
}

/// Owns one [`HkSensor`] per ladder and digitizes whole events.
#[derive(Debug)]
pub struct Digitizer {
    sensors: Vec<HkSensor>,
    index: HashMap<(i32, i32), usize>,
    ticks: usize,
}

impl Digitizer {
    /// Builds one sensor per configuration, each running `ticks` clock
    /// periods per event.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if two configurations name the same
    /// (layer, ladder), or the construction error of a sensor.
    pub fn new(configs: &[SensorConfig], ticks: usize) -> Result<Self> {
        Self::with_processor(configs, ticks, Arc::new(Passthrough))
    }

    /// Same as [`Digitizer::new`], with a post-processing hook shared by
    /// every sensor.
    ///
    /// # Errors
    /// See [`Digitizer::new`].
    pub fn with_processor(
        configs: &[SensorConfig],
        ticks: usize,
        processor: Arc<dyn ClusterProcessor>,
    ) -> Result<Self> {
        Self::with_hooks(configs, ticks, processor, Arc::new(SingleThreshold))
    }

    /// Same as [`Digitizer::new`], with a post-processing hook and a
    /// front-end discriminator shared by every sensor.
    ///
    /// # Errors
    /// See [`Digitizer::new`].
    pub fn with_hooks(
        configs: &[SensorConfig],
        ticks: usize,
        processor: Arc<dyn ClusterProcessor>,
        discriminator: Arc<dyn Discriminator>,
    ) -> Result<Self> {
        let mut sensors = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());
        for config in configs {
            let key = (config.layer, config.ladder);
            if index.insert(key, sensors.len()).is_some() {
                return Err(Error::Config(format!(
                    "ladder {}/{} configured twice",
                    config.layer, config.ladder
                )));
            }
            sensors.push(HkSensor::with_hooks(
                config,
                Arc::clone(&processor),
                Arc::clone(&discriminator),
            )?);
        }
        Ok(Self {
            sensors,
            index,
            ticks,
        })
    }

    /// Number of ladders.
    #[must_use]
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Clock periods simulated per event.
    #[must_use]
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Sensors in configuration order.
    #[must_use]
    pub fn sensors(&self) -> &[HkSensor] {
        &self.sensors
    }

    /// Sensor of a ladder.
    #[must_use]
    pub fn sensor(&self, layer: i32, ladder: i32) -> Option<&HkSensor> {
        self.index.get(&(layer, ladder)).map(|&i| &self.sensors[i])
    }

    /// Digitizes one event.
    ///
    /// Deposits are routed by (layer, ladder); every ladder then runs its
    /// event on its own rayon task. Hits are concatenated in sensor order.
    ///
    /// # Errors
    /// Propagates the first sensor error.
    pub fn process_event(&mut self, deposits: &[ChargeDeposit]) -> Result<EventOutput> {
        let mut routed: Vec<Vec<ChargeDeposit>> = vec![Vec::new(); self.sensors.len()];
        let mut unrouted = 0usize;
        for deposit in deposits {
            match self.index.get(&(deposit.layer, deposit.ladder)) {
                Some(&i) => routed[i].push(*deposit),
                None => unrouted += 1,
            }
        }
        if unrouted > 0 {
            log::warn!("{unrouted} deposits addressed to unknown ladders");
        }

        let ticks = self.ticks;
        let outputs = self
            .sensors
            .par_iter_mut()
            .zip(routed.par_iter())
            .map(|(sensor, deposits)| sensor.run_event(deposits, ticks))
            .collect::<Result<Vec<_>>>()?;

        let mut output = EventOutput {
            hits: Vec::new(),
            stats: DigitizationStatistics {
                deposits: deposits.len(),
                unrouted,
                ..DigitizationStatistics::default()
            },
        };
        for sensor_output in outputs {
            output.stats.out_of_bounds += sensor_output.out_of_bounds;
            output.stats.out_of_window += sensor_output.out_of_window;
            output.stats.clusters += sensor_output.clusters;
            output.hits.extend(sensor_output.hits);
        }
        output.stats.hits = output.hits.len();

        log::debug!(
            "event: {} deposits, {} clusters, {} hits",
            output.stats.deposits,
            output.stats.clusters,
            output.stats.hits
        );
        Ok(output)
    }
}
