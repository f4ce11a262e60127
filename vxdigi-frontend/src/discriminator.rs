//! Threshold discrimination of the stored pixel level.

/// Decides whether a stored level is over threshold.
///
/// The matrix asks once per live pixel and tick. Implementations must be
/// deterministic for events to be reproducible.
pub trait Discriminator: Send + Sync {
    /// Whether `charge` counts as over `threshold`.
    fn is_over_threshold(&self, charge: f64, threshold: f64) -> bool;

    /// Short name used in log output.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> Discriminator for F
where
    F: Fn(f64, f64) -> bool + Send + Sync,
{
    fn is_over_threshold(&self, charge: f64, threshold: f64) -> bool {
        self(charge, threshold)
    }
}

/// Single threshold: over when `charge >= threshold`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreshold;

impl Discriminator for SingleThreshold {
    #[inline]
    fn is_over_threshold(&self, charge: f64, threshold: f64) -> bool {
        charge >= threshold
    }

    fn name(&self) -> &'static str {
        "single-threshold"
    }
}

/// Threshold shifted by a fixed offset, e.g. a measured trim of the chip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetThreshold {
    /// Added to the configured threshold.
    pub offset: f64,
}

impl Discriminator for OffsetThreshold {
    #[inline]
    fn is_over_threshold(&self, charge: f64, threshold: f64) -> bool {
        charge >= threshold + self.offset
    }

    fn name(&self) -> &'static str {
        "offset-threshold"
    }
}
