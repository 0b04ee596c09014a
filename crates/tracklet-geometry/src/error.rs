//! Error types for tracklet-geometry.

use thiserror::Error;

/// Errors raised while constructing a sector window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The partition must contain at least one sector.
    #[error("sector count must be positive")]
    NoSectors,

    /// The sector index is outside the partition.
    #[error("sector index {index} out of range for {count} sectors")]
    IndexOutOfRange { index: u32, count: u32 },

    /// The half-window is narrower than half the nominal slice, which would
    /// leave gaps between neighbouring sectors.
    #[error("half-window {half_window} is narrower than the nominal half-slice {nominal}")]
    NegativeOverlap { half_window: f64, nominal: f64 },

    /// The half-window is not a finite number.
    #[error("half-window must be finite, got {0}")]
    NonFinite(f64),
}
