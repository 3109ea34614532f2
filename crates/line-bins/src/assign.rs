//! Bin assigner and coordinate quantizer
//!
//! Cuts the crossing-augmented point stream of one feature into runs that each
//! lie inside a single bin, and converts every run into bin-relative 16-bit
//! deltas.

use crate::crossing::CrossedPoint;
use crate::segment::{MAX_SEGMENT_POINTS, QuantizedPoint, Segment};
use crate::utils::MAX_DELTA;
use crate::{Axis, BinError, Grid, Result};
use geo::Coord;

/// Segments of one feature, each paired with the bin that owns it
pub type Assigned = Vec<(usize, Segment)>;

/// Partition `points` into single-bin segments
///
/// A run ends at every point lying on a bin edge and at the last point. A
/// feature that never crosses an edge becomes one segment in the bin of its
/// first point.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn assign(feature_id: usize, level: u16, points: &[CrossedPoint], grid: &Grid) -> Result<Assigned> {
    let Some(first) = points.first() else {
        return Ok(Vec::new());
    };

    if !points.iter().any(CrossedPoint::is_crossing) {
        let bin = grid.bin_of(first.coord);
        let segment = quantize_run(feature_id, level, points, 0, bin, grid)?;
        return Ok(split_long(bin, segment));
    }

    let width = grid.width();
    let n = points.len();
    let mut out = Vec::new();
    let mut last = 0;

    for i in 1..n {
        let p = points[i].coord;
        if p.x % width != 0 && p.y % width != 0 && i != n - 1 {
            continue;
        }
        let bin = owning_bin(&points[last..=i], grid);
        let segment = quantize_run(feature_id, level, &points[last..=i], last, bin, grid)?;
        out.extend(split_long(bin, segment));
        last = i;
    }

    Ok(out)
}

/// Bin containing a run whose interior never touches an edge
///
/// Runs of three or more points use their middle point. A two-point run is
/// located by its average, except that an endpoint at longitude 0 takes the
/// column of the other endpoint so runs ending on Greenwich from the west stay
/// in the last column.
fn owning_bin(run: &[CrossedPoint], grid: &Grid) -> usize {
    if run.len() > 2 {
        return grid.bin_of(run[run.len() / 2].coord);
    }

    let a = run[0].coord;
    let b = run[run.len() - 1].coord;
    let row = grid.row((a.y + b.y) / 2);
    let col = match (a.x, b.x) {
        (0, x) | (x, 0) => grid.col(x),
        (xa, xb) => grid.col((xa + xb) / 2),
    };
    grid.bin_index(col, row)
}

/// Quantize a run relative to the origin of `bin`
///
/// `offset` is the index of the run's first point in the feature's stream and
/// only serves error reporting.
fn quantize_run(
    feature_id: usize,
    level: u16,
    run: &[CrossedPoint],
    offset: usize,
    bin: usize,
    grid: &Grid,
) -> Result<Segment> {
    let origin = grid.origin(bin);
    let on_last_col = grid.col_row(bin).0 == grid.last_col();

    let points = run
        .iter()
        .enumerate()
        .map(|(k, p)| {
            quantize(p.coord, origin, on_last_col, grid).map_err(|(axis, value)| {
                BinError::QuantizationOverflow {
                    feature: feature_id,
                    axis,
                    point: offset + k,
                    value,
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Segment::new(feature_id, level, points))
}

/// Convert one grid coordinate into deltas from `origin`
///
/// In the last column the Greenwich edge is the east edge of the bin, so a
/// point at longitude 0 maps to the full delta rather than 0. Returns the
/// offending axis and value on overflow.
pub fn quantize(
    p: Coord<i32>,
    origin: Coord<i32>,
    on_last_col: bool,
    grid: &Grid,
) -> std::result::Result<QuantizedPoint, (Axis, i64)> {
    let rel_x = if p.x == 0 && on_last_col {
        grid.width()
    } else {
        p.x - origin.x
    };
    let rel_y = p.y - origin.y;

    let scale = |rel: i32, axis: Axis| {
        let value = (rel as f64 * grid.short_factor()).round_ties_even() as i64;
        if (0..=MAX_DELTA as i64).contains(&value) {
            Ok(value as u16)
        } else {
            Err((axis, value))
        }
    };

    Ok(QuantizedPoint::new(scale(rel_x, Axis::Lon)?, scale(rel_y, Axis::Lat)?))
}

fn split_long(bin: usize, segment: Segment) -> Assigned {
    segment
        .split(MAX_SEGMENT_POINTS)
        .into_iter()
        .map(|s| (bin, s))
        .collect()
}
