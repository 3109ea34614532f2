//! Densifier: guarantees no step spans more than one bin width
//!
//! After this pass every consecutive pair of points differs by at most one bin
//! width in longitude (measured the shorter way around the globe) and latitude,
//! so each step crosses at most one edge per axis.

use crate::utils::{shorter_way_dx, wrap_longitude};
use crate::{BinStats, Grid};
use geo::Coord;

/// Insert evenly spaced points wherever a step is wider than one bin
///
/// Inserted points are wrapped into `[0, 360°)` and moved off bin edges the
/// same way input vertices are.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn densify(points: &[Coord<i32>], grid: &Grid, stats: &mut BinStats) -> Vec<Coord<i32>> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let width = grid.width() as i64;

    let mut out = Vec::with_capacity(points.len());
    out.push(first);

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dx = shorter_way_dx(a.x, b.x) as i64;
        let dy = (b.y - a.y) as i64;

        if dx.abs() > width || dy.abs() > width {
            let steps = |d: i64| d.unsigned_abs().div_ceil(width as u64) as i64;
            let n = steps(dx).max(steps(dy)) + 1;
            for k in 1..n {
                let mut p = Coord {
                    x: wrap_longitude(a.x as i64 + dx * k / n),
                    y: (a.y as i64 + dy * k / n) as i32,
                };
                grid.snap_off_edges(&mut p);
                out.push(p);
            }
            stats.densified_points += (n - 1) as usize;
        }
        out.push(b);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinSize;
    use crate::utils::M360;

    fn max_step(points: &[Coord<i32>]) -> (i32, i32) {
        points.windows(2).fold((0, 0), |(mx, my), w| {
            (
                mx.max(shorter_way_dx(w[0].x, w[1].x).abs()),
                my.max((w[1].y - w[0].y).abs()),
            )
        })
    }

    #[test]
    fn test_short_steps_untouched() {
        let grid = Grid::new(BinSize::Five);
        let mut stats = BinStats::default();
        let points = vec![
            Coord { x: 1_000_000, y: 91_000_000 },
            Coord { x: 4_000_000, y: 93_000_000 },
            Coord { x: 8_000_000, y: 96_000_000 },
        ];

        let out = densify(&points, &grid, &mut stats);
        assert_eq!(out, points);
        assert_eq!(stats.densified_points, 0);
    }

    #[test]
    fn test_long_step_is_split() {
        let grid = Grid::new(BinSize::Five);
        let mut stats = BinStats::default();
        let points = vec![
            Coord { x: 77, y: 90_000_077 },
            Coord { x: 6_000_000, y: 90_000_077 },
        ];

        let out = densify(&points, &grid, &mut stats);
        // ceil(5_999_923 / 5_000_000) + 1 = 3 steps, so two inserted points
        assert_eq!(out.len(), 4);
        assert_eq!(stats.densified_points, 2);
        assert_eq!(out[1], Coord { x: 2_000_051, y: 90_000_077 });
        assert_eq!(out[2], Coord { x: 4_000_025, y: 90_000_077 });
        assert_eq!(out.first(), points.first());
        assert_eq!(out.last(), points.last());
    }

    #[test]
    fn test_densify_across_antimeridian() {
        let grid = Grid::new(BinSize::One);
        let mut stats = BinStats::default();
        let points = vec![
            Coord { x: 357_500_000, y: 100_500_000 },
            Coord { x: 2_500_000, y: 100_500_000 },
        ];

        let out = densify(&points, &grid, &mut stats);
        let (mx, my) = max_step(&out);
        assert!(mx <= grid.width());
        assert_eq!(my, 0);
        // The short way is 5° east, never through 180°
        assert!(out.iter().all(|p| p.x >= 357_500_000 || p.x <= 2_500_000));
        assert!(out.iter().all(|p| p.x >= 0 && p.x < M360));
    }

    #[test]
    fn test_densified_points_avoid_edges() {
        let grid = Grid::new(BinSize::One);
        let mut stats = BinStats::default();
        // The middle insert would land exactly on 2°
        let points = vec![
            Coord { x: 500_000, y: 100_500_000 },
            Coord { x: 3_500_000, y: 100_500_000 },
        ];

        let out = densify(&points, &grid, &mut stats);
        assert_eq!(out.len(), 5);
        assert_eq!(out[2].x, 2_000_000 + grid.noise());
        assert!(out.iter().all(|p| !grid.on_edge(p.x) && !grid.on_edge(p.y)));
        let (mx, _) = max_step(&out);
        assert!(mx <= grid.width());
    }

    #[test]
    fn test_empty_input() {
        let grid = Grid::default();
        let mut stats = BinStats::default();
        assert!(densify(&[], &grid, &mut stats).is_empty());
    }
}
