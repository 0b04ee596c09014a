//! Periodic angle helpers.

use std::f64::consts::PI;

/// Full turn in radians.
pub const TWO_PI: f64 = 2.0 * PI;

/// Reduce an angle into (−π, π].
///
/// Angles already in range are returned bit-for-bit unchanged, so window
/// bounds survive a second reduction exactly.
#[inline]
pub fn reduce_range(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let reduced = (angle + PI).rem_euclid(TWO_PI) - PI;
    if reduced <= -PI {
        reduced + TWO_PI
    } else {
        reduced
    }
}

/// Signed difference `a - b` reduced into (−π, π].
#[inline]
pub fn delta_phi(a: f64, b: f64) -> f64 {
    reduce_range(a - b)
}
