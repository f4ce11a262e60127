//! vxdigi-frontend: clock-driven simulation of a pixel readout front end.
//!
//! This crate models the analog/digital front end of an RD53A-like chip:
//! charge accumulation on every pixel of a ladder, linear discharge and
//! single-threshold discrimination at each clock tick.
//!
//! # Key Components
//!
//! - [`PixelDigiMatrix`] - per-ladder pixel arena and clock state machine
//! - [`Discriminator`] - threshold decision, [`SingleThreshold`] by default
//!
//! # Driving the matrix
//!
//! 1. Push the charge of the tick with `update_pixel`
//! 2. Call `clock_sync` exactly once
//! 3. Read `fired`, `completed` and `clusterable` before the next tick

mod discriminator;
mod matrix;

pub use discriminator::{Discriminator, OffsetThreshold, SingleThreshold};
pub use matrix::PixelDigiMatrix;

// Re-export core types for convenience
pub use vxdigi_core::{MatrixStatus, PixelData, PixelStatus};
