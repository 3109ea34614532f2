//! Binary writer for the three-file database
//!
//! Bins are visited row-major; each segment is written and then dropped, so
//! only the chains not yet flushed stay in memory.

use crate::format::{BIN_EXT, BinHeader, FileHeader, PT_EXT, SEG_EXT, SegmentHeader, companion_path};
use crate::{Bin, BinError, Grid, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A running total that disagrees with the value declared in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub what: &'static str,
    pub written: usize,
    pub declared: usize,
}

impl From<ConsistencyWarning> for BinError {
    fn from(w: ConsistencyWarning) -> Self {
        BinError::Consistency {
            what: w.what,
            written: w.written,
            declared: w.declared,
        }
    }
}

/// Outcome of a database write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Header as written to the `.bin` file
    pub header: FileHeader,
    pub points_written: usize,
    pub segments_written: usize,
    pub warnings: Vec<ConsistencyWarning>,
}

impl WriteReport {
    /// Apply the consistency policy
    ///
    /// Strict callers get the first mismatch as an error, others get every
    /// mismatch logged as a warning.
    pub fn into_result(self, strict: bool) -> Result<Self> {
        if strict {
            if let Some(w) = self.warnings.first() {
                return Err(w.clone().into());
            }
        }
        for w in &self.warnings {
            tracing::warn!(
                "# {} written ({}) differ from actual {} ({})!",
                w.what,
                w.written,
                w.what,
                w.declared
            );
        }
        Ok(self)
    }

    pub fn is_consistent(&self) -> bool {
        self.warnings.is_empty()
    }
}

struct Output {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Output {
    fn create(prefix: &Path, ext: &str) -> Result<Self> {
        let path = companion_path(prefix, ext);
        let file = File::create(&path).map_err(BinError::io(&path))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(BinError::io(&self.path))
    }
}

fn to_i32(what: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| BinError::TooLarge { what, value })
}

/// Write `bins` to `<prefix>.bin`, `<prefix>.seg` and `<prefix>.pt`
///
/// Every bin is left empty afterwards. `bins` must hold one entry per bin of
/// `grid`, in bin index order.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn write_database(prefix: &Path, grid: &Grid, bins: &mut [Bin]) -> Result<WriteReport> {
    debug_assert_eq!(bins.len(), grid.n_bins());

    let mut bin_table = Vec::with_capacity(bins.len());
    let mut n_segments = 0usize;
    let mut n_points = 0usize;
    for bin in bins.iter() {
        let count = bin.segments().iter().filter(|s| !s.is_empty()).count();
        bin_table.push(BinHeader {
            first_seg_id: to_i32("segments", n_segments)?,
            n_segments: to_i32("segments", count)?,
        });
        n_segments += count;
        n_points += bin.n_points();
    }

    let header = FileHeader {
        n_bins: to_i32("bins", bins.len())?,
        n_points: to_i32("points", n_points)?,
        bin_size: grid.bin_size().minutes(),
        nx_bins: to_i32("bins", grid.nx())?,
        ny_bins: to_i32("bins", grid.ny())?,
        n_segments: to_i32("segments", n_segments)?,
    };

    let mut bin_out = Output::create(prefix, BIN_EXT)?;
    let mut seg_out = Output::create(prefix, SEG_EXT)?;
    let mut pt_out = Output::create(prefix, PT_EXT)?;

    header
        .write_to(&mut bin_out.writer)
        .map_err(BinError::io(&bin_out.path))?;
    for record in &bin_table {
        record
            .write_to(&mut bin_out.writer)
            .map_err(BinError::io(&bin_out.path))?;
    }
    bin_out.finish()?;

    let mut points_written = 0usize;
    let mut segments_written = 0usize;
    for bin in bins.iter_mut() {
        for segment in bin.take().into_iter().filter(|s| !s.is_empty()) {
            let n = u16::try_from(segment.len()).map_err(|_| BinError::TooLarge {
                what: "segment points",
                value: segment.len(),
            })?;
            SegmentHeader {
                n,
                level: segment.level,
                first_p: to_i32("points", points_written)?,
            }
            .write_to(&mut seg_out.writer)
            .map_err(BinError::io(&seg_out.path))?;

            for p in &segment.points {
                p.write_to(&mut pt_out.writer)
                    .map_err(BinError::io(&pt_out.path))?;
            }
            points_written += segment.len();
            segments_written += 1;
        }
    }
    seg_out.finish()?;
    pt_out.finish()?;

    let mut warnings = Vec::new();
    if points_written != n_points {
        warnings.push(ConsistencyWarning {
            what: "points",
            written: points_written,
            declared: n_points,
        });
    }
    if segments_written != n_segments {
        warnings.push(ConsistencyWarning {
            what: "segments",
            written: segments_written,
            declared: n_segments,
        });
    }

    tracing::info!(
        "Wrote {} segments and {} points to {}.{{{BIN_EXT},{SEG_EXT},{PT_EXT}}}",
        segments_written,
        points_written,
        prefix.display()
    );

    Ok(WriteReport {
        header,
        points_written,
        segments_written,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinSize, QuantizedPoint, Segment};
    use std::fs;

    fn segment(level: u16, n: u16) -> Segment {
        Segment::new(0, level, (0..n).map(|i| QuantizedPoint::new(i, 2 * i)).collect())
    }

    #[test]
    fn test_write_layout() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("lines");
        let grid = Grid::new(BinSize::Twenty);
        let mut bins = vec![Bin::default(); grid.n_bins()];
        bins[3].push(segment(1, 3));
        bins[3].push(segment(2, 2));
        bins[10].push(segment(4, 5));

        let report = write_database(&prefix, &grid, &mut bins)
            .unwrap()
            .into_result(true)
            .unwrap();
        assert_eq!(report.points_written, 10);
        assert_eq!(report.segments_written, 3);
        assert!(report.is_consistent());
        assert!(bins.iter().all(Bin::is_empty));

        let bin_bytes = fs::read(companion_path(&prefix, BIN_EXT)).unwrap();
        assert_eq!(
            bin_bytes.len(),
            FileHeader::SIZE + grid.n_bins() * BinHeader::SIZE
        );
        let mut cursor = bin_bytes.as_slice();
        let header = FileHeader::read_from(&mut cursor).unwrap();
        assert_eq!(header, report.header);
        assert_eq!(header.n_bins, 162);
        assert_eq!(header.bin_size, 1200);
        assert_eq!((header.nx_bins, header.ny_bins), (18, 9));

        let table: Vec<_> = (0..grid.n_bins())
            .map(|_| BinHeader::read_from(&mut cursor).unwrap())
            .collect();
        assert_eq!(table[0], BinHeader { first_seg_id: 0, n_segments: 0 });
        assert_eq!(table[3], BinHeader { first_seg_id: 0, n_segments: 2 });
        assert_eq!(table[4], BinHeader { first_seg_id: 2, n_segments: 0 });
        assert_eq!(table[10], BinHeader { first_seg_id: 2, n_segments: 1 });
        assert_eq!(table[161], BinHeader { first_seg_id: 3, n_segments: 0 });

        let seg_bytes = fs::read(companion_path(&prefix, SEG_EXT)).unwrap();
        let mut cursor = seg_bytes.as_slice();
        let segs: Vec<_> = (0..3)
            .map(|_| SegmentHeader::read_from(&mut cursor).unwrap())
            .collect();
        assert!(cursor.is_empty());
        assert_eq!(segs[0], SegmentHeader { n: 3, level: 1, first_p: 0 });
        assert_eq!(segs[1], SegmentHeader { n: 2, level: 2, first_p: 3 });
        assert_eq!(segs[2], SegmentHeader { n: 5, level: 4, first_p: 5 });

        let pt_bytes = fs::read(companion_path(&prefix, PT_EXT)).unwrap();
        assert_eq!(pt_bytes.len(), 10 * QuantizedPoint::SIZE);
        // Last point of the last segment
        assert_eq!(&pt_bytes[36..], &[4, 0, 8, 0]);
    }

    #[test]
    fn test_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("empty");
        let grid = Grid::new(BinSize::Twenty);
        let mut bins = vec![Bin::default(); grid.n_bins()];

        let report = write_database(&prefix, &grid, &mut bins).unwrap();
        assert_eq!(report.header.n_points, 0);
        assert_eq!(report.header.n_segments, 0);
        assert_eq!(fs::metadata(companion_path(&prefix, SEG_EXT)).unwrap().len(), 0);
        assert_eq!(fs::metadata(companion_path(&prefix, PT_EXT)).unwrap().len(), 0);
    }

    #[test]
    fn test_strict_mode_rejects_mismatch() {
        let report = WriteReport {
            header: FileHeader {
                n_bins: 0,
                n_points: 0,
                bin_size: 300,
                nx_bins: 0,
                ny_bins: 0,
                n_segments: 0,
            },
            points_written: 3,
            segments_written: 1,
            warnings: vec![ConsistencyWarning {
                what: "points",
                written: 3,
                declared: 2,
            }],
        };

        assert!(report.clone().into_result(false).is_ok());
        match report.into_result(true) {
            Err(BinError::Consistency { what, written, declared }) => {
                assert_eq!(what, "points");
                assert_eq!((written, declared), (3, 2));
            }
            other => panic!("expected Consistency, got {other:?}"),
        }
    }

    #[test]
    fn test_unwritable_prefix_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing").join("lines");
        let grid = Grid::new(BinSize::Twenty);
        let mut bins = vec![Bin::default(); grid.n_bins()];

        match write_database(&prefix, &grid, &mut bins) {
            Err(BinError::Io { path, .. }) => assert_eq!(path, companion_path(&prefix, BIN_EXT)),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
