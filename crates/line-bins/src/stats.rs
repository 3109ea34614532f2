//! Run statistics, accumulated per feature and merged across the run

use std::collections::BTreeMap;
use std::ops::AddAssign;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters describing what the binning pipeline did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinStats {
    /// Features binned
    pub features: usize,
    /// Features per hierarchical level
    pub features_per_level: BTreeMap<u16, usize>,
    /// Points read from the input
    pub points_in: usize,
    /// Points inserted by the densifier
    pub densified_points: usize,
    /// Points synthesized on bin edges by the grid crosser
    pub crossing_points: usize,
    /// Steps that cut exactly through a bin corner
    pub corner_crossings: usize,
    /// Steps whose bin index jumped by more than one column or row
    pub jumps: usize,
    /// Input vertices moved off an exact bin corner
    pub corner_vertices: usize,
    /// Input vertices moved off an exact longitude edge
    pub x_exact: usize,
    /// Input vertices moved off an exact latitude edge
    pub y_exact: usize,
    /// Segments produced
    pub segments: usize,
    /// Points stored in segments
    pub points_out: usize,
    /// Points stored twice because two segments share them
    pub duplicate_points: usize,
}

impl BinStats {
    /// Growth of the point count caused by densifying and edge crossings, in percent
    pub fn growth_percent(&self) -> f64 {
        if self.points_in == 0 {
            return 0.0;
        }
        100.0 * (self.points_out as f64 - self.points_in as f64) / self.points_in as f64
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Total input and output points: {} {}",
            self.points_in,
            self.points_out
        );
        tracing::info!(
            "Total features processed: {} ({} segments)",
            self.features,
            self.segments
        );
        for (level, count) in &self.features_per_level {
            tracing::info!("  level {level}: {count} features");
        }
        tracing::info!(
            "{} points added by densifying, {} crossing points, {} duplicates at crossings",
            self.densified_points,
            self.crossing_points,
            self.duplicate_points
        );
        tracing::info!(
            "{} corner crossings ({} duplicate corner points), {} jumps",
            self.corner_crossings,
            2 * self.corner_crossings,
            self.jumps
        );
        tracing::info!(
            "Moved {} corner, {} x-edge and {} y-edge vertices",
            self.corner_vertices,
            self.x_exact,
            self.y_exact
        );
        tracing::info!(
            "Adding edges made the database grow by {:.3} %",
            self.growth_percent()
        );
    }
}

impl AddAssign<&BinStats> for BinStats {
    fn add_assign(&mut self, other: &BinStats) {
        self.features += other.features;
        for (level, count) in &other.features_per_level {
            *self.features_per_level.entry(*level).or_default() += count;
        }
        self.points_in += other.points_in;
        self.densified_points += other.densified_points;
        self.crossing_points += other.crossing_points;
        self.corner_crossings += other.corner_crossings;
        self.jumps += other.jumps;
        self.corner_vertices += other.corner_vertices;
        self.x_exact += other.x_exact;
        self.y_exact += other.y_exact;
        self.segments += other.segments;
        self.points_out += other.points_out;
        self.duplicate_points += other.duplicate_points;
    }
}
