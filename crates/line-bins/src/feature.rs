//! Feature storage and coordinate normalization
//!
//! A `Feature` is one input polyline in signed micro-degrees (longitude may be
//! in `[-180°, 360°]`). Before binning it is normalized into grid coordinates:
//! longitude wrapped into `[0, 360°)`, latitude shifted into `[0, 180°]`, and
//! every vertex moved off any bin edge it sits on exactly.

use crate::utils::{M90, wrap_longitude};
use crate::{BinError, BinStats, Grid, Result};
use geo::Coord;

/// One input polyline
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Ordinal of the feature in its input stream
    pub id: usize,
    /// Hierarchical level, copied onto every segment derived from this feature
    pub level: u16,
    /// Vertices as (longitude, latitude) micro-degrees
    pub points: Vec<Coord<i32>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Feature {
    pub fn new(id: usize, level: u16, points: Vec<Coord<i32>>) -> Self {
        Self { id, level, points }
    }

    /// Build a feature from (longitude, latitude) pairs in degrees
    pub fn from_degrees(id: usize, level: u16, lonlat: &[(f64, f64)]) -> Self {
        let points = lonlat
            .iter()
            .map(|&(lon, lat)| Coord {
                x: crate::utils::degrees_to_micro(lon),
                y: crate::utils::degrees_to_micro(lat),
            })
            .collect();
        Self::new(id, level, points)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert the vertices into grid coordinates for `grid`
    ///
    /// Vertices exactly on a bin edge are moved by the grid's noise offset and
    /// counted in `stats`.
    pub fn to_grid(&self, grid: &Grid, stats: &mut BinStats) -> Result<Vec<Coord<i32>>> {
        let mut out = Vec::with_capacity(self.points.len());
        for (k, p) in self.points.iter().enumerate() {
            if p.y < -M90 || p.y > M90 {
                return Err(BinError::InvalidCoordinate {
                    feature: self.id,
                    point: k,
                    x: p.x,
                    y: p.y,
                });
            }
            let mut q = Coord {
                x: wrap_longitude(p.x as i64),
                y: p.y + M90,
            };
            match grid.snap_off_edges(&mut q) {
                (true, true) => {
                    stats.corner_vertices += 1;
                    tracing::debug!("Feature {} went exactly through a corner; moved", self.id);
                }
                (true, false) => stats.x_exact += 1,
                (false, true) => stats.y_exact += 1,
                (false, false) => {}
            }
            out.push(q);
        }
        Ok(out)
    }
}
