//! Tracklet Sector Geometry
//!
//! Azimuthal partitioning of the detector into equal sectors with an overlap
//! margin on each side.
//!
//! # Periodic Coordinates
//!
//! Azimuth lives on the circle, so every comparison is made on angles reduced
//! into the canonical range (−π, π]. A sector whose window crosses the ±π seam
//! keeps `phi_min > phi_max` impossible by carrying `phi_min` below −π.
//!
//! # Overlap
//!
//! Each sector nominally covers `2π/N`. The configured half-window is wider
//! than half of that, and the surplus is added on both sides:
//!
//! ```text
//! overlap = half_window - π/N
//! width   = 2π/N + 2·overlap
//! ```
//!
//! Neighbouring sectors therefore share a band of `2·overlap` around every
//! nominal boundary, and hits in that band are processed by both.

mod angle;
mod error;
mod window;

pub use angle::{reduce_range, delta_phi, TWO_PI};
pub use error::GeometryError;
pub use window::SectorWindow;

/// Sector count used by the barrel track finder.
pub const DEFAULT_SECTOR_COUNT: u32 = 9;
