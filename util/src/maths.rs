//! Utility maths functions

use std::f64::consts::TAU;

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance from a to b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi(a: f64, b: f64) -> f64 {
    let c = rem_euclid(a - b, TAU);
    let d = rem_euclid(b - a, TAU);

    if c < d {
        -c
    } else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// The return value `r` satisfies `0.0 <= r < rhs.abs()` in most cases. Due
/// to floating point round-off it can result in `r == rhs.abs()` when `lhs`
/// is much smaller than `rhs.abs()` in magnitude and `lhs < 0.0`.
pub fn rem_euclid(lhs: f64, rhs: f64) -> f64 {
    let r = lhs % rhs;
    if r < 0.0 {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle into the range [0, 2pi).
///
/// Unlike `rem_euclid` the upper bound is never returned.
pub fn wrap_2pi(angle: f64) -> f64 {
    let w = rem_euclid(angle, TAU);
    if w >= TAU {
        0.0
    } else {
        w
    }
}

/// Return the euclidian distance between two planar points.
pub fn dist_2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
