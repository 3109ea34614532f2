//! On-disk records of the binned database
//!
//! Three companion files share one prefix:
//!
//! - `<prefix>.bin`: a [`FileHeader`] followed by one [`BinHeader`] per bin
//! - `<prefix>.seg`: one [`SegmentHeader`] per segment
//! - `<prefix>.pt`: one [`QuantizedPoint`] per stored point
//!
//! Bins appear in row-major order from the north-west corner; segments and
//! points follow the same bin-major order. All integers are little-endian.

use crate::QuantizedPoint;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Extension of the header + bin table file
pub const BIN_EXT: &str = "bin";
/// Extension of the segment table file
pub const SEG_EXT: &str = "seg";
/// Extension of the point table file
pub const PT_EXT: &str = "pt";

/// Path of one companion file, e.g. `coast` + `bin` -> `coast.bin`
///
/// The extension is appended, never substituted, so prefixes containing dots
/// keep their full name.
pub fn companion_path(prefix: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn read_array<const N: usize>(r: &mut impl Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_i32(r: &mut impl Read) -> io::Result<i32> {
    read_array(r).map(i32::from_le_bytes)
}

pub(crate) fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    read_array(r).map(u16::from_le_bytes)
}

/// Global header at the start of the `.bin` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileHeader {
    pub n_bins: i32,
    pub n_points: i32,
    /// Bin size in arc-minutes
    pub bin_size: i32,
    pub nx_bins: i32,
    pub ny_bins: i32,
    pub n_segments: i32,
}

impl FileHeader {
    pub const SIZE: usize = 24;

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        for value in [
            self.n_bins,
            self.n_points,
            self.bin_size,
            self.nx_bins,
            self.ny_bins,
            self.n_segments,
        ] {
            w.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from(r: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            n_bins: read_i32(r)?,
            n_points: read_i32(r)?,
            bin_size: read_i32(r)?,
            nx_bins: read_i32(r)?,
            ny_bins: read_i32(r)?,
            n_segments: read_i32(r)?,
        })
    }
}

/// Per-bin record of the `.bin` file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinHeader {
    /// Index of the bin's first segment in the `.seg` table
    pub first_seg_id: i32,
    pub n_segments: i32,
}

impl BinHeader {
    pub const SIZE: usize = 8;

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&self.first_seg_id.to_le_bytes())?;
        w.write_all(&self.n_segments.to_le_bytes())
    }

    pub fn read_from(r: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            first_seg_id: read_i32(r)?,
            n_segments: read_i32(r)?,
        })
    }
}

/// Per-segment record of the `.seg` file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentHeader {
    pub n: u16,
    pub level: u16,
    /// Index of the segment's first point in the `.pt` table
    pub first_p: i32,
}

impl SegmentHeader {
    pub const SIZE: usize = 8;

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&self.n.to_le_bytes())?;
        w.write_all(&self.level.to_le_bytes())?;
        w.write_all(&self.first_p.to_le_bytes())
    }

    pub fn read_from(r: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            n: read_u16(r)?,
            level: read_u16(r)?,
            first_p: read_i32(r)?,
        })
    }
}

impl QuantizedPoint {
    pub const SIZE: usize = 4;

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&self.dx.to_le_bytes())?;
        w.write_all(&self.dy.to_le_bytes())
    }

    pub fn read_from(r: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            dx: read_u16(r)?,
            dy: read_u16(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_path_appends_extension() {
        assert_eq!(
            companion_path(Path::new("out/coast"), BIN_EXT),
            PathBuf::from("out/coast.bin")
        );
        assert_eq!(
            companion_path(Path::new("binned_GSHHS_f.5"), PT_EXT),
            PathBuf::from("binned_GSHHS_f.5.pt")
        );
    }

    #[test]
    fn test_file_header_layout() {
        let header = FileHeader {
            n_bins: 2592,
            n_points: 6,
            bin_size: 300,
            nx_bins: 72,
            ny_bins: 36,
            n_segments: 2,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len(), FileHeader::SIZE);
        assert_eq!(&bytes[0..4], &2592i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &300i32.to_le_bytes());
        assert_eq!(&bytes[20..24], &2i32.to_le_bytes());
        assert_eq!(FileHeader::read_from(&mut bytes.as_slice()).unwrap(), header);
    }

    #[test]
    fn test_segment_header_layout() {
        let header = SegmentHeader {
            n: 0xFFFF,
            level: 3,
            first_p: 70_000,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len(), SegmentHeader::SIZE);
        assert_eq!(bytes[..4], [0xFF, 0xFF, 3, 0]);
        assert_eq!(&bytes[4..], &70_000i32.to_le_bytes());
    }

    #[test]
    fn test_point_layout() {
        let mut bytes = Vec::new();
        QuantizedPoint::new(65535, 1).write_to(&mut bytes).unwrap();
        assert_eq!(bytes, [0xFF, 0xFF, 1, 0]);
        assert_eq!(bytes.len(), QuantizedPoint::SIZE);
    }

    #[test]
    fn test_short_read_fails() {
        let bytes = [0u8; BinHeader::SIZE - 1];
        assert!(BinHeader::read_from(&mut bytes.as_slice()).is_err());
    }
}
