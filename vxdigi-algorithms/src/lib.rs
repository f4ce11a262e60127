//! vxdigi-algorithms: Clustering and hit building for pixel ladders.
//!
//! This crate turns the tick-by-tick output of the front-end matrix into
//! digitized hits:
//! - **Hoshen-Kopelman** - connected-component labeling of the clusterable pixels
//! - **Cluster heap** - reconciliation of clusters seen at different ticks
//! - **Sensor** - per-ladder tick cycle and hit emission
//! - **Digitizer** - routing of deposits and parallel processing of ladders
//!
#![warn(missing_docs)]

pub mod heap;
pub mod hoshen_kopelman;
mod postprocess;
mod processing;
mod sensor;

pub use heap::{ClusterHeap, ClusterId, ClusterItem, ReferenceTable};
pub use hoshen_kopelman::{cluster_bounds, ClusterOfPixel, GridPartitionedSet, Label};
pub use postprocess::{ClusterProcessor, EdgePixelFilter, Passthrough, SizeFilter};
pub use processing::{DigitizationStatistics, Digitizer, EventOutput};
pub use sensor::{HkSensor, SensorEventOutput, SensorPhase};

// Re-export core types used in the public API
pub use vxdigi_core::{ChargeDeposit, ClusteringScope, SegmentDigiHit, SensorConfig};
pub use vxdigi_frontend::{Discriminator, OffsetThreshold, SingleThreshold};
