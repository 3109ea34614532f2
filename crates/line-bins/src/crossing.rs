//! Grid crosser: synthesizes the points where a line crosses a bin edge
//!
//! Walks consecutive (densified) points and, whenever a step changes bin
//! column and/or row, inserts the exact crossing point(s) on the crossed
//! edge(s). Every output point is tagged with the bin of the run that ends at
//! it, so a crossing point carries the bin the line is leaving.
//!
//! Longitude columns wrap: a step between the last column and column 0 crosses
//! the edge at 0°/360°, detected explicitly rather than from the raw
//! coordinate difference.

use crate::utils::{M360, shorter_way_dx, wrap_longitude};
use crate::{BinStats, Grid};
use geo::Coord;
use smallvec::SmallVec;

/// Whether a point came from the input or was synthesized on a bin edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointKind {
    Vertex,
    Crossing,
}

/// A point of the crossing-augmented stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossedPoint {
    /// Position in grid coordinates
    pub coord: Coord<i32>,
    pub kind: PointKind,
    /// Bin of the run that ends at this point
    pub bin: usize,
}

impl CrossedPoint {
    fn vertex(coord: Coord<i32>, grid: &Grid) -> Self {
        Self {
            coord,
            kind: PointKind::Vertex,
            bin: grid.bin_of(coord),
        }
    }

    fn crossing(coord: Coord<i32>, bin: usize) -> Self {
        Self {
            coord,
            kind: PointKind::Crossing,
            bin,
        }
    }

    #[inline]
    pub fn is_crossing(&self) -> bool {
        self.kind == PointKind::Crossing
    }
}

/// Crossing points inserted for a single step (zero, one or two)
pub type StepCrossings = SmallVec<[CrossedPoint; 2]>;

/// Insert bin-edge crossing points between consecutive points
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn cross_grid(points: &[Coord<i32>], grid: &Grid, stats: &mut BinStats) -> Vec<CrossedPoint> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(points.len() + points.len() / 4 + 1);
    out.push(CrossedPoint::vertex(first, grid));

    for pair in points.windows(2) {
        let crossings = step_crossings(pair[0], pair[1], grid, stats);
        stats.crossing_points += crossings.len();
        out.extend(crossings);
        out.push(CrossedPoint::vertex(pair[1], grid));
    }

    out
}

/// Crossing points for the step `a -> b`, in the order the line meets them
pub fn step_crossings(a: Coord<i32>, b: Coord<i32>, grid: &Grid, stats: &mut BinStats) -> StepCrossings {
    let mut out = StepCrossings::new();

    let (col1, row1) = (grid.col(a.x), grid.row(a.y));
    let (col2, row2) = (grid.col(b.x), grid.row(b.y));
    if col1 == col2 && row1 == row2 {
        return out;
    }

    let width = grid.width();
    let dx = shorter_way_dx(a.x, b.x);
    let dy = b.y - a.y;
    let from_bin = grid.bin_index(col1, row1);

    // Interpolation stays in integers so a line through a corner meets both
    // edges at the same point
    let x_cross = if col1 != col2 {
        let (hi, lo) = (col1.max(col2), col1.min(col2));
        let (x_c, dx_1) = if hi == grid.last_col() && lo == 0 {
            // Wraps through 0°/360°
            let dx_1 = if col1 == 0 { -a.x } else { M360 - a.x };
            (0, dx_1)
        } else {
            if hi - lo > 1 {
                stats.jumps += 1;
            }
            let x_c = hi as i32 * width;
            (x_c, x_c - a.x)
        };
        let y_c = a.y as i64 + dx_1 as i64 * dy as i64 / dx as i64;
        Some((Coord { x: x_c, y: y_c as i32 }, dx_1))
    } else {
        None
    };

    let y_cross = if row1 != row2 {
        if row1.abs_diff(row2) > 1 {
            stats.jumps += 1;
        }
        let y_c = row1.max(row2) as i32 * width;
        let dy_1 = y_c - a.y;
        let x_c = a.x as i64 + dy_1 as i64 * dx as i64 / dy as i64;
        Some((
            Coord {
                x: wrap_longitude(x_c),
                y: y_c,
            },
            dy_1,
        ))
    } else {
        None
    };

    match (x_cross, y_cross) {
        (Some((xp, _)), None) => out.push(CrossedPoint::crossing(xp, from_bin)),
        (None, Some((yp, _))) => out.push(CrossedPoint::crossing(yp, from_bin)),
        (Some((xp, dx_1)), Some((yp, dy_1))) => {
            if xp.y == yp.y || xp.x == yp.x {
                // One of the crossings landed on the corner
                stats.corner_crossings += 1;
                let [p1, p2] = corner_points(Coord { x: xp.x, y: yp.y }, dx, dy, grid);
                let via = if dx < 0 {
                    grid.bin_index(col1, row2)
                } else {
                    grid.bin_index(col2, row1)
                };
                out.push(CrossedPoint::crossing(p1, from_bin));
                out.push(CrossedPoint::crossing(p2, via));
            } else if (dx_1 as i64).abs() * (dy as i64).abs() < (dy_1 as i64).abs() * (dx as i64).abs() {
                // The longitude edge comes first along the step
                out.push(CrossedPoint::crossing(xp, from_bin));
                out.push(CrossedPoint::crossing(yp, grid.bin_index(col2, row1)));
            } else {
                out.push(CrossedPoint::crossing(yp, from_bin));
                out.push(CrossedPoint::crossing(xp, grid.bin_index(col1, row2)));
            }
        }
        (None, None) => {}
    }

    out
}

/// Two crossing points replacing a single point exactly on a bin corner
///
/// Westward steps leave through the latitude edge first, other steps through
/// the longitude edge first. Each point is moved by the grid noise into the
/// bin the line passes between the two edges, so neither lands on the corner.
fn corner_points(corner: Coord<i32>, dx: i32, dy: i32, grid: &Grid) -> [Coord<i32>; 2] {
    let noise = grid.noise();
    let toward_end_row = if dy > 0 { noise } else { -noise };

    if dx < 0 {
        [
            Coord {
                x: corner.x + noise,
                y: corner.y,
            },
            Coord {
                x: corner.x,
                y: corner.y + toward_end_row,
            },
        ]
    } else {
        [
            Coord {
                x: corner.x,
                y: corner.y - toward_end_row,
            },
            Coord {
                x: corner.x + noise,
                y: corner.y,
            },
        ]
    }
}
