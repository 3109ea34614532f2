//! Regular latitude/longitude tiling of the globe
//!
//! Bins are numbered row-major from the north-west corner:
//! `bin = (ny - row - 1) * nx + col`, where `row` counts up from the south pole
//! and `col` counts east from Greenwich.

use crate::utils::{M180, M360, MAX_DELTA, MILL};
use crate::{BinError, Result};
use geo::Coord;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Supported bin sizes in whole degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinSize {
    One,
    Two,
    #[default]
    Five,
    Ten,
    Twenty,
}

impl BinSize {
    pub const ALL: [BinSize; 5] = [
        BinSize::One,
        BinSize::Two,
        BinSize::Five,
        BinSize::Ten,
        BinSize::Twenty,
    ];

    /// Bin size in degrees
    pub const fn degrees(self) -> i32 {
        match self {
            BinSize::One => 1,
            BinSize::Two => 2,
            BinSize::Five => 5,
            BinSize::Ten => 10,
            BinSize::Twenty => 20,
        }
    }

    /// Bin size in arc-minutes (the unit stored in the file header)
    pub const fn minutes(self) -> i32 {
        self.degrees() * 60
    }

    /// Look up a bin size from its value in degrees
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.degrees() == degrees)
    }

    /// Look up a bin size from its value in arc-minutes
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.minutes() == minutes)
    }
}

impl FromStr for BinSize {
    type Err = BinError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i32>()
            .ok()
            .and_then(Self::from_degrees)
            .ok_or_else(|| BinError::InvalidBinSize(s.to_string()))
    }
}

impl std::fmt::Display for BinSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Fixed tiling of the globe, computed once from a [`BinSize`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    bin_size: BinSize,
    /// Number of bin columns (longitude)
    nx: usize,
    /// Number of bin rows (latitude)
    ny: usize,
    /// Bin width in micro-degrees
    width: i32,
    /// Converts micro-degrees to 16-bit delta units
    short_factor: f64,
    /// Offset that moves a point off a bin edge without leaving its bin
    noise: i32,
}

impl Grid {
    pub fn new(bin_size: BinSize) -> Self {
        let minutes = bin_size.minutes();
        let width = (MILL as i64 * minutes as i64 / 60) as i32;
        let short_factor = MAX_DELTA as f64 / width as f64;
        Self {
            bin_size,
            nx: (360 * 60 / minutes) as usize,
            ny: (180 * 60 / minutes) as usize,
            width,
            short_factor,
            noise: (1.0 / short_factor).ceil() as i32,
        }
    }

    #[inline]
    pub fn bin_size(&self) -> BinSize {
        self.bin_size
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total number of bins
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.nx * self.ny
    }

    /// Bin width in micro-degrees
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn short_factor(&self) -> f64 {
        self.short_factor
    }

    #[inline]
    pub fn noise(&self) -> i32 {
        self.noise
    }

    /// Column index of a grid longitude in `[0, 360°)`
    #[inline(always)]
    pub fn col(&self, x: i32) -> usize {
        (x / self.width) as usize
    }

    /// Row index of a grid latitude in `[0, 180°)`
    #[inline(always)]
    pub fn row(&self, y: i32) -> usize {
        (y / self.width) as usize
    }

    /// Column index of the last (easternmost) column
    #[inline(always)]
    pub fn last_col(&self) -> usize {
        self.nx - 1
    }

    /// Row-major bin index for a column and row
    #[inline(always)]
    pub fn bin_index(&self, col: usize, row: usize) -> usize {
        (self.ny - row - 1) * self.nx + col
    }

    /// Bin containing a point in grid coordinates
    #[inline]
    pub fn bin_of(&self, p: Coord<i32>) -> usize {
        self.bin_index(self.col(p.x), self.row(p.y))
    }

    /// Column and row of a bin index
    #[inline]
    pub fn col_row(&self, bin: usize) -> (usize, usize) {
        (bin % self.nx, self.ny - bin / self.nx - 1)
    }

    /// South-west corner of a bin in grid coordinates
    pub fn origin(&self, bin: usize) -> Coord<i32> {
        let (col, row) = self.col_row(bin);
        Coord {
            x: col as i32 * self.width,
            y: row as i32 * self.width,
        }
    }

    /// True if a value sits exactly on a bin edge
    #[inline(always)]
    pub fn on_edge(&self, value: i32) -> bool {
        value % self.width == 0
    }

    /// Move a point off any bin edge it sits on exactly
    ///
    /// Latitude moves north (south at the north pole), longitude moves east.
    /// Returns which axes were moved as `(x_moved, y_moved)`.
    pub fn snap_off_edges(&self, p: &mut Coord<i32>) -> (bool, bool) {
        let y_moved = self.on_edge(p.y);
        if y_moved {
            if p.y >= M180 {
                p.y -= self.noise;
            } else {
                p.y += self.noise;
            }
        }
        let x_moved = self.on_edge(p.x) && p.x + self.noise <= M360;
        if x_moved {
            p.x += self.noise;
        }
        (x_moved, y_moved)
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(BinSize::default())
    }
}
