//! LineBinner - Top-level manager for the bins and the binning pipeline
//!
//! This module provides the high-level API: feed features (one by one, in
//! parallel batches, or straight from an input file), then write the binned
//! database.

use crate::assign::{Assigned, assign};
use crate::codec::FeatureReader;
use crate::crossing::cross_grid;
use crate::densify::densify;
use crate::writer::{WriteReport, write_database};
use crate::{Bin, BinSize, BinStats, Feature, Grid, Result};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a binning run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Grid cell size
    pub bin_size: BinSize,
    /// Turn writer consistency mismatches into errors instead of warnings
    pub strict: bool,
    /// Features binned concurrently per batch when loading a file
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_size: BinSize::Five,
            strict: false,
            batch_size: 4096,
        }
    }
}

/// Owns the bins of one run and the statistics gathered so far
#[derive(Debug, Clone)]
pub struct LineBinner {
    config: Config,
    grid: Grid,
    /// One chain per bin, in bin index order
    bins: Vec<Bin>,
    stats: BinStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl LineBinner {
    /// Create an empty binner for the configured grid
    pub fn new(config: Config) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("binner::new");

        let grid = Grid::new(config.bin_size);
        Self {
            bins: vec![Bin::default(); grid.n_bins()],
            grid,
            config,
            stats: BinStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Statistics of every feature added so far
    pub fn stats(&self) -> &BinStats {
        &self.stats
    }

    /// Segment chains, indexed by bin
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Run the pipeline for one feature without touching any bin
    ///
    /// Returns the feature's segments with their owning bins, in line order,
    /// and the statistics of this feature alone.
    pub fn bin_feature(feature: &Feature, grid: &Grid) -> Result<(Assigned, BinStats)> {
        let mut stats = BinStats::default();
        if feature.is_empty() {
            return Ok((Vec::new(), stats));
        }
        stats.features = 1;
        stats.features_per_level.insert(feature.level, 1);
        stats.points_in = feature.len();

        let points = feature.to_grid(grid, &mut stats)?;
        let points = densify(&points, grid, &mut stats);
        let crossed = cross_grid(&points, grid, &mut stats);
        let assigned = assign(feature.id, feature.level, &crossed, grid)?;

        stats.segments = assigned.len();
        stats.points_out = assigned.iter().map(|(_, s)| s.len()).sum();
        stats.duplicate_points = stats.points_out.saturating_sub(crossed.len());

        tracing::debug!(
            "Feature {} (level {}): {} points -> {} segments, {} points",
            feature.id,
            feature.level,
            stats.points_in,
            stats.segments,
            stats.points_out
        );
        Ok((assigned, stats))
    }

    fn append(&mut self, assigned: Assigned, stats: &BinStats) {
        for (bin, segment) in assigned {
            self.bins[bin].push(segment);
        }
        self.stats += stats;
    }

    /// Bin one feature and append its segments to their bins
    pub fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        let (assigned, stats) = Self::bin_feature(feature, &self.grid)?;
        self.append(assigned, &stats);
        Ok(())
    }

    /// Bin several features in parallel
    ///
    /// Features are processed concurrently, then appended in input order, so
    /// the bins end up exactly as if the features had been added one by one.
    /// On failure the error of the earliest failing feature is returned.
    pub fn add_features_parallel(&mut self, features: &[Feature]) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("binner::add_features_parallel");

        let grid = self.grid;
        let results: Vec<Result<(Assigned, BinStats)>> = features
            .par_iter()
            .map(|feature| Self::bin_feature(feature, &grid))
            .collect();

        // Sequential append keeps chain order deterministic
        for result in results {
            let (assigned, stats) = result?;
            self.append(assigned, &stats);
        }
        Ok(())
    }

    /// Read every feature of an input file and bin it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("binner::load_file");

        let path = path.as_ref();
        tracing::info!("Binning {} with {}° bins", path.display(), self.config.bin_size);

        let batch_size = self.config.batch_size.max(1);
        let mut reader = FeatureReader::open(path)?;
        let mut batch = Vec::with_capacity(batch_size);
        loop {
            batch.clear();
            for feature in reader.by_ref().take(batch_size) {
                batch.push(feature?);
            }
            if batch.is_empty() {
                break;
            }
            self.add_features_parallel(&batch)?;
        }

        tracing::info!(
            "Binned {} features into {} segments",
            self.stats.features,
            self.stats.segments
        );
        Ok(())
    }

    /// Write the database to `<prefix>.bin`, `<prefix>.seg` and `<prefix>.pt`
    ///
    /// Bins are emptied as they are written; statistics are kept.
    pub fn write(&mut self, prefix: impl AsRef<Path>) -> Result<WriteReport> {
        #[cfg(feature = "profiling")]
        profiling::scope!("binner::write");

        write_database(prefix.as_ref(), &self.grid, &mut self.bins)?.into_result(self.config.strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinnedLines;
    use crate::codec::FeatureWriter;
    use geo::Coord;

    fn coastline(id: usize, level: u16) -> Feature {
        // A zig-zag across several 5° bins on both sides of Greenwich
        let lonlat: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let lon = -20.0 + i as f64 * 1.1;
                let lat = 40.0 + if i % 2 == 0 { 0.3 } else { 2.7 } + id as f64 * 0.01;
                (lon, lat)
            })
            .collect();
        Feature::from_degrees(id, level, &lonlat)
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.bin_size, BinSize::Five);
        assert!(!config.strict);
        assert_eq!(config.batch_size, 4096);
    }

    #[test]
    fn test_new_binner_is_empty() {
        let binner = LineBinner::new(Config::default());
        assert_eq!(binner.bins().len(), 72 * 36);
        assert!(binner.bins().iter().all(Bin::is_empty));
        assert_eq!(binner.stats(), &BinStats::default());
    }

    #[test]
    fn test_add_feature_accounting() {
        let mut binner = LineBinner::new(Config::default());
        binner.add_feature(&coastline(0, 1)).unwrap();

        let stats = binner.stats();
        assert_eq!(stats.features, 1);
        assert_eq!(stats.points_in, 40);
        assert!(stats.crossing_points > 0);

        let stored: usize = binner.bins().iter().map(Bin::n_points).sum();
        let segments: usize = binner.bins().iter().map(Bin::len).sum();
        assert_eq!(stored, stats.points_out);
        assert_eq!(segments, stats.segments);
        assert_eq!(
            stats.points_out,
            stats.points_in + stats.densified_points + stats.crossing_points + stats.duplicate_points
        );
    }

    #[test]
    fn test_single_bin_feature_is_one_segment() {
        let mut binner = LineBinner::new(Config::default());
        let feature = Feature::from_degrees(0, 2, &[(1.0, 1.0), (2.0, 2.0), (3.0, 1.5)]);
        binner.add_feature(&feature).unwrap();

        let occupied: Vec<_> = binner
            .bins()
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].0, 1224);
        assert_eq!(occupied[0].1.segments()[0].len(), 3);
        assert_eq!(occupied[0].1.segments()[0].level, 2);
    }

    #[test]
    fn test_empty_feature_is_ignored() {
        let mut binner = LineBinner::new(Config::default());
        binner.add_feature(&Feature::new(0, 1, vec![])).unwrap();
        assert_eq!(binner.stats().features, 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let features: Vec<_> = (0..32).map(|i| coastline(i, (i % 3) as u16 + 1)).collect();

        let mut sequential = LineBinner::new(Config::default());
        for f in &features {
            sequential.add_feature(f).unwrap();
        }
        let mut parallel = LineBinner::new(Config::default());
        parallel.add_features_parallel(&features).unwrap();

        assert_eq!(sequential.bins(), parallel.bins());
        assert_eq!(sequential.stats(), parallel.stats());
    }

    #[test]
    fn test_parallel_reports_first_error() {
        let mut features: Vec<_> = (0..4).map(|i| coastline(i, 1)).collect();
        features[1].points[3] = Coord { x: 0, y: 95_000_000 };
        features[2].points[0] = Coord { x: 0, y: -95_000_000 };

        let mut binner = LineBinner::new(Config::default());
        match binner.add_features_parallel(&features) {
            Err(crate::BinError::InvalidCoordinate { feature, point, .. }) => {
                assert_eq!(feature, 1);
                assert_eq!(point, 3);
            }
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }
    }

    #[test]
    fn test_load_file_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("coast.lines");
        let mut writer = FeatureWriter::create(&input).unwrap();
        for i in 0..10 {
            writer.write_feature(&coastline(i, 1)).unwrap();
        }
        writer.finish().unwrap();

        let mut binner = LineBinner::new(Config {
            strict: true,
            batch_size: 3,
            ..Default::default()
        });
        binner.load_file(&input).unwrap();
        assert_eq!(binner.stats().features, 10);
        assert_eq!(binner.stats().features_per_level[&1], 10);

        let prefix = dir.path().join("binned");
        let report = binner.write(&prefix).unwrap();
        assert_eq!(report.points_written, binner.stats().points_out);
        assert_eq!(report.segments_written, binner.stats().segments);
        assert!(binner.bins().iter().all(Bin::is_empty));

        let db = BinnedLines::open(&prefix).unwrap();
        assert_eq!(db.header().n_points as usize, binner.stats().points_out);
    }
}
