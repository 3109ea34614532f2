//! Reader for the three-file binned database
//!
//! Opening a database loads the global header and the bin table; segments and
//! points are fetched per bin on demand, so a caller interested in one region
//! never scans the whole point table.

use crate::format::{BIN_EXT, BinHeader, FileHeader, PT_EXT, SEG_EXT, SegmentHeader, companion_path};
use crate::utils::MAX_DELTA;
use crate::{BinError, BinSize, Grid, QuantizedPoint, Result};
use geo::{Coord, LineString};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A stored segment, still in quantized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    pub level: u16,
    pub points: Vec<QuantizedPoint>,
}

/// A stored segment decoded to (longitude, latitude) degrees
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    pub level: u16,
    pub line: LineString<f64>,
}

/// Handle to a database written by [`crate::LineBinner::write`]
#[derive(Debug)]
pub struct BinnedLines {
    header: FileHeader,
    bins: Vec<BinHeader>,
    grid: Grid,
    seg_path: PathBuf,
    pt_path: PathBuf,
}

fn corrupt(path: &Path, reason: impl Into<String>) -> BinError {
    BinError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn file_len(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(BinError::io(path))
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl BinnedLines {
    /// Open `<prefix>.bin` and check the companion files against its header
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let bin_path = companion_path(prefix, BIN_EXT);
        let seg_path = companion_path(prefix, SEG_EXT);
        let pt_path = companion_path(prefix, PT_EXT);

        let file = File::open(&bin_path).map_err(BinError::io(&bin_path))?;
        let mut reader = BufReader::new(file);
        let header = FileHeader::read_from(&mut reader).map_err(BinError::io(&bin_path))?;

        let bin_size = BinSize::from_minutes(header.bin_size).ok_or_else(|| {
            corrupt(&bin_path, format!("unsupported bin size {} minutes", header.bin_size))
        })?;
        let grid = Grid::new(bin_size);
        if header.nx_bins as usize != grid.nx()
            || header.ny_bins as usize != grid.ny()
            || header.n_bins as usize != grid.n_bins()
        {
            return Err(corrupt(
                &bin_path,
                format!(
                    "grid {}x{} ({} bins) does not match {}° bins",
                    header.nx_bins, header.ny_bins, header.n_bins, bin_size
                ),
            ));
        }
        if header.n_points < 0 || header.n_segments < 0 {
            return Err(corrupt(&bin_path, "negative totals in header"));
        }

        let expected = (FileHeader::SIZE + grid.n_bins() * BinHeader::SIZE) as u64;
        if file_len(&bin_path)? != expected {
            return Err(corrupt(&bin_path, format!("expected {expected} bytes")));
        }

        let mut bins = Vec::with_capacity(grid.n_bins());
        for b in 0..grid.n_bins() {
            let record = BinHeader::read_from(&mut reader).map_err(BinError::io(&bin_path))?;
            if record.first_seg_id < 0
                || record.n_segments < 0
                || record.first_seg_id as i64 + record.n_segments as i64 > header.n_segments as i64
            {
                return Err(corrupt(&bin_path, format!("bin {b} points outside the segment table")));
            }
            bins.push(record);
        }

        let expected = header.n_segments as u64 * SegmentHeader::SIZE as u64;
        if file_len(&seg_path)? != expected {
            return Err(corrupt(
                &seg_path,
                format!("expected {expected} bytes for {} segments", header.n_segments),
            ));
        }
        let expected = header.n_points as u64 * QuantizedPoint::SIZE as u64;
        if file_len(&pt_path)? != expected {
            return Err(corrupt(
                &pt_path,
                format!("expected {expected} bytes for {} points", header.n_points),
            ));
        }

        tracing::debug!(
            "Opened {} ({} segments, {} points, {}° bins)",
            bin_path.display(),
            header.n_segments,
            header.n_points,
            bin_size
        );

        Ok(Self {
            header,
            bins,
            grid,
            seg_path,
            pt_path,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Bin table entry for bin `b`
    pub fn bin_header(&self, b: usize) -> Option<&BinHeader> {
        self.bins.get(b)
    }

    /// South-west corner of bin `b` as (longitude, latitude) degrees
    pub fn bin_origin(&self, b: usize) -> Coord<f64> {
        let size = self.grid.bin_size().degrees() as f64;
        let nx = self.grid.nx();
        Coord {
            x: (b % nx) as f64 * size,
            y: 90.0 - ((b / nx) + 1) as f64 * size,
        }
    }

    /// Segments of bin `b` in stored order, undecoded
    pub fn read_bin_raw(&self, b: usize) -> Result<Vec<RawSegment>> {
        let Some(record) = self.bins.get(b) else {
            return Ok(Vec::new());
        };
        if record.n_segments == 0 {
            return Ok(Vec::new());
        }

        let seg_file = File::open(&self.seg_path).map_err(BinError::io(&self.seg_path))?;
        let mut seg_reader = BufReader::new(seg_file);
        seg_reader
            .seek(SeekFrom::Start(
                record.first_seg_id as u64 * SegmentHeader::SIZE as u64,
            ))
            .map_err(BinError::io(&self.seg_path))?;
        let headers = (0..record.n_segments)
            .map(|_| SegmentHeader::read_from(&mut seg_reader))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(BinError::io(&self.seg_path))?;

        let pt_file = File::open(&self.pt_path).map_err(BinError::io(&self.pt_path))?;
        let mut pt_reader = BufReader::new(pt_file);
        let mut segments = Vec::with_capacity(headers.len());
        for h in headers {
            if h.first_p < 0 || h.first_p as i64 + h.n as i64 > self.header.n_points as i64 {
                return Err(corrupt(
                    &self.seg_path,
                    format!("segment in bin {b} points outside the point table"),
                ));
            }
            pt_reader
                .seek(SeekFrom::Start(h.first_p as u64 * QuantizedPoint::SIZE as u64))
                .map_err(BinError::io(&self.pt_path))?;
            let points = (0..h.n)
                .map(|_| QuantizedPoint::read_from(&mut pt_reader))
                .collect::<std::io::Result<Vec<_>>>()
                .map_err(BinError::io(&self.pt_path))?;
            segments.push(RawSegment {
                level: h.level,
                points,
            });
        }
        Ok(segments)
    }

    /// Segments of bin `b` decoded to degrees
    ///
    /// Only segments whose level is listed in `levels` are returned; an empty
    /// list keeps every level.
    pub fn read_bin(&self, b: usize, levels: &[u16]) -> Result<Vec<LineSegment>> {
        let origin = self.bin_origin(b);
        let scale = self.grid.bin_size().degrees() as f64 / MAX_DELTA as f64;

        Ok(self
            .read_bin_raw(b)?
            .into_iter()
            .filter(|s| levels.is_empty() || levels.contains(&s.level))
            .map(|s| LineSegment {
                level: s.level,
                line: s
                    .points
                    .iter()
                    .map(|p| Coord {
                        x: origin.x + p.dx as f64 * scale,
                        y: origin.y + p.dy as f64 * scale,
                    })
                    .collect(),
            })
            .collect())
    }

    /// Bins intersecting a longitude/latitude box, in ascending bin order
    ///
    /// `west` may exceed `east` for boxes straddling 0°/360°, and longitudes may
    /// be given in either `[-180, 180]` or `[0, 360]`.
    pub fn bins_in_region(&self, west: f64, east: f64, south: f64, north: f64) -> Vec<usize> {
        let size = self.grid.bin_size().degrees() as f64;
        let (nx, ny) = (self.grid.nx(), self.grid.ny());

        let w = west.rem_euclid(360.0);
        let span = if east - west >= 360.0 {
            360.0
        } else {
            (east - west).rem_euclid(360.0)
        };
        let first_col = (w / size).floor() as usize;
        let n_cols = (((w + span) / size).ceil() as usize)
            .saturating_sub(first_col)
            .clamp(1, nx);

        let south = south.clamp(-90.0, 90.0) + 90.0;
        let north = north.clamp(-90.0, 90.0) + 90.0;
        let first_row = ((south / size).floor() as usize).min(ny - 1);
        let last_row = (((north / size).ceil() as usize).saturating_sub(1)).clamp(first_row, ny - 1);

        let mut bins: Vec<usize> = (first_row..=last_row)
            .flat_map(|row| {
                (0..n_cols).map(move |k| self.grid.bin_index((first_col + k) % nx, row))
            })
            .collect();
        bins.sort_unstable();
        bins
    }
}
