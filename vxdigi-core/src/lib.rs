//! vxdigi-core: Core types for pixel-detector front-end digitization.
//!
//! This crate provides the ladder geometry, pixel and hit data types,
//! cell-identifier encoding and per-sensor configuration shared by the
//! front-end simulation and the clustering stage.
//!

pub mod cell_id;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hit;

pub use cell_id::{CellIdEncoder, CellIdField};
pub use config::{ClusteringScope, SensorConfig, DEFAULT_CELL_ID_ENCODING};
pub use error::{Error, Result};
pub use geometry::{GridCoordinate, GridPosition, LadderGeometry, LinearPosition};
pub use hit::{ChargeDeposit, ChargePoint, MatrixStatus, PixelData, PixelStatus, SegmentDigiHit};
