//! Line Bins - Grid-indexed storage for long geographic polylines
//!
//! This library converts arbitrarily long polylines (coastlines, rivers, borders)
//! into a binned database that lets downstream tools fetch all line material
//! touching one grid cell without scanning the whole dataset. Every cell of a
//! regular latitude/longitude grid owns the pieces of line that fall inside it,
//! stored as 16-bit offsets from the cell's south-west corner.
//!
//! # Architecture
//!
//! - **[`Grid`]**: Fixed tiling of the globe for one [`BinSize`]
//! - **[`codec`]**: Reader/writer for the input feature stream
//! - **[`densify`]**: Inserts points so no step spans more than one bin
//! - **[`crossing`]**: Synthesizes the exact points where a line crosses a bin edge
//! - **[`assign`]**: Splits the crossed stream into per-bin [`Segment`]s and quantizes them
//! - **[`writer`]** / **[`reader`]**: The three-file binary layout (`.bin`, `.seg`, `.pt`)
//! - **[`LineBinner`]**: High-level manager that runs the pipeline and owns the bins
//!
//! # Pipeline
//!
//! Feature → normalize → densify → cross → assign + quantize → bins → write

pub mod assign;
mod binner;
pub mod codec;
pub mod crossing;
pub mod densify;
mod feature;
pub mod format;
mod grid;
pub mod reader;
mod segment;
mod stats;
pub mod utils;
pub mod writer;

// Public API exports
pub use binner::{Config, LineBinner};
pub use feature::Feature;
pub use grid::{BinSize, Grid};
pub use reader::{BinnedLines, LineSegment, RawSegment};
pub use segment::{Bin, QuantizedPoint, Segment};
pub use stats::BinStats;
pub use writer::{ConsistencyWarning, WriteReport};

use std::path::PathBuf;

/// Coordinate axis, used to report which delta overflowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Lon,
    Lat,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Lon => write!(f, "lon"),
            Axis::Lat => write!(f, "lat"),
        }
    }
}

/// Error types for the binning pipeline
#[derive(Debug, thiserror::Error)]
pub enum BinError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid header for feature {feature}: {reason}")]
    InvalidHeader { feature: usize, reason: String },

    #[error("Invalid coordinate ({x}, {y}) in feature {feature} at point {point}")]
    InvalidCoordinate {
        feature: usize,
        point: usize,
        x: i32,
        y: i32,
    },

    #[error(
        "Incremental {axis} ({value}) exceeds short int range for feature {feature} near point {point}; \
         most likely a point separation exceeds the bin spacing"
    )]
    QuantizationOverflow {
        feature: usize,
        axis: Axis,
        point: usize,
        value: i64,
    },

    #[error("Consistency mismatch: {what} written ({written}) differ from declared ({declared})")]
    Consistency {
        what: &'static str,
        written: usize,
        declared: usize,
    },

    #[error("{what} ({value}) does not fit the on-disk record")]
    TooLarge { what: &'static str, value: usize },

    #[error("Bin size must be 1, 2, 5, 10, or 20 degrees, got {0:?}")]
    InvalidBinSize(String),

    #[error("Corrupt database {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl BinError {
    /// Wrap an IO error with the file it happened on
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BinError {
        let path = path.into();
        move |source| BinError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, BinError>;
