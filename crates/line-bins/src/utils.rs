//! Utility functions for micro-degree coordinates and longitude wrapping
//!
//! All pipeline coordinates are signed 32-bit micro-degrees. Inside the pipeline
//! ("grid coordinates") longitude lives in `[0, 360°)` and latitude is shifted
//! by +90° into `[0, 180°]`, so both axes start at zero on the grid's origin.

/// Micro-degrees per degree
pub const MILL: i32 = 1_000_000;

/// 360 degrees in micro-degrees
pub const M360: i32 = 360 * MILL;

/// 180 degrees in micro-degrees
pub const M180: i32 = 180 * MILL;

/// 90 degrees in micro-degrees
pub const M90: i32 = 90 * MILL;

/// Largest value stored in an unsigned 16-bit delta
pub const MAX_DELTA: i32 = u16::MAX as i32;

/// Wrap a longitude in micro-degrees into `[0, 360°)`
#[inline(always)]
pub fn wrap_longitude(x: i64) -> i32 {
    x.rem_euclid(M360 as i64) as i32
}

/// Signed longitude difference `to - from`, taken the shorter way around the globe
///
/// The result lies in `[-180°, 180°]`.
#[inline(always)]
pub fn shorter_way_dx(from: i32, to: i32) -> i32 {
    let dx = to - from;
    if dx > M180 {
        dx - M360
    } else if dx < -M180 {
        dx + M360
    } else {
        dx
    }
}

/// Convert micro-degrees to degrees
#[inline(always)]
pub fn micro_to_degrees(value: i32) -> f64 {
    value as f64 / MILL as f64
}

/// Convert degrees to micro-degrees (rounded to the nearest micro-degree)
#[inline(always)]
pub fn degrees_to_micro(value: f64) -> i32 {
    (value * MILL as f64).round() as i32
}
