//! Angular admission window of one sector.
//!
//! The window is computed once from the sector index, the partition size and
//! the configured half-window, and never changes afterwards.

use std::f64::consts::PI;

use crate::angle::{reduce_range, TWO_PI};
use crate::error::GeometryError;

/// Rounding tolerance for overlaps and bound comparisons.
const EPSILON: f64 = 1e-12;

/// The azimuthal window of one sector.
///
/// `phi_min` and `phi_max` are in canonical form: `phi_max` in (−π, π],
/// `phi_min <= phi_max`, with `phi_min` allowed below −π when the window
/// crosses the seam. A window a full turn wide or wider is stored as
/// `[−π, π]` and admits every angle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorWindow {
    index: u32,
    count: u32,
    phi_min: f64,
    phi_max: f64,
    /// Overlap term, also used as the admission margin.
    margin: f64,
}

impl SectorWindow {
    /// Build the window of sector `index` out of `count` equal sectors.
    ///
    /// `half_window` is half the full angular extent a sector processes,
    /// overlap included. It must be at least `π / count`.
    pub fn new(index: u32, count: u32, half_window: f64) -> Result<Self, GeometryError> {
        if count == 0 {
            return Err(GeometryError::NoSectors);
        }
        if index >= count {
            return Err(GeometryError::IndexOutOfRange { index, count });
        }
        if !half_window.is_finite() {
            return Err(GeometryError::NonFinite(half_window));
        }

        let dphi = TWO_PI / count as f64;
        let overlap = half_window - 0.5 * dphi;
        if overlap < -EPSILON {
            return Err(GeometryError::NegativeOverlap {
                half_window,
                nominal: 0.5 * dphi,
            });
        }
        let overlap = overlap.max(0.0);
        if dphi + 2.0 * overlap >= TWO_PI {
            return Ok(Self {
                index,
                count,
                phi_min: -PI,
                phi_max: PI,
                margin: overlap,
            });
        }

        // Both bounds come from their own nominal edge so that neighbours
        // without overlap share the exact same boundary value.
        let mut phi_min = index as f64 * dphi - overlap;
        let mut phi_max = (index + 1) as f64 * dphi + overlap;

        // Sector 0 is centred on φ = 0.
        phi_min -= 0.5 * dphi;
        phi_max -= 0.5 * dphi;

        phi_min = reduce_range(phi_min);
        phi_max = reduce_range(phi_max);
        if phi_min > phi_max {
            phi_min -= TWO_PI;
        }

        Ok(Self {
            index,
            count,
            phi_min,
            phi_max,
            margin: overlap,
        })
    }

    /// Windows for every sector of a partition, in index order.
    pub fn partition(count: u32, half_window: f64) -> Result<Vec<Self>, GeometryError> {
        (0..count).map(|i| Self::new(i, count, half_window)).collect()
    }

    /// Sector index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Number of sectors in the partition.
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Lower bound (may be below −π for a seam-crossing sector).
    pub const fn phi_min(&self) -> f64 {
        self.phi_min
    }

    /// Upper bound, in (−π, π].
    pub const fn phi_max(&self) -> f64 {
        self.phi_max
    }

    /// Overlap added on each side of the nominal slice.
    pub const fn margin(&self) -> f64 {
        self.margin
    }

    /// Angular extent of the window, overlap included.
    pub fn width(&self) -> f64 {
        self.phi_max - self.phi_min
    }

    /// Centre of the window, in (−π, π].
    pub fn center(&self) -> f64 {
        reduce_range(self.phi_min + 0.5 * self.width())
    }

    /// Whether the window spans the whole circle.
    pub fn is_full_circle(&self) -> bool {
        self.width() >= TWO_PI
    }

    /// Coarse admission test: is `angle` within the window widened by the
    /// margin on both sides? Bounds are inclusive.
    pub fn admits(&self, angle: f64) -> bool {
        self.within(angle, self.margin)
    }

    /// Strict test against `[phi_min, phi_max]`, no margin.
    pub fn contains(&self, angle: f64) -> bool {
        self.within(angle, 0.0)
    }

    /// Angle relative to `phi_min`, clipped into `[0, width]`.
    pub fn localize(&self, angle: f64) -> f64 {
        let half = 0.5 * self.width();
        let local = reduce_range(reduce_range(angle) - self.phi_min - half) + half;
        local.clamp(0.0, self.width())
    }

    fn within(&self, angle: f64, margin: f64) -> bool {
        let phi = reduce_range(angle);
        let lo = self.phi_min - margin - EPSILON;
        let hi = self.phi_max + margin + EPSILON;
        // The −2π copy only matters when the margin pushes `hi` past +π.
        [0.0, TWO_PI, -TWO_PI]
            .iter()
            .any(|shift| phi >= lo + shift && phi <= hi + shift)
    }
}

impl std::fmt::Display for SectorWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector {}/{} [{:.4}, {:.4}] ±{:.4}",
            self.index, self.count, self.phi_min, self.phi_max, self.margin
        )
    }
}
