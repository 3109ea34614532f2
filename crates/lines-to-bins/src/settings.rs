use clap::Parser;
use line_bins::{BinSize, Config};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Lines to bins - Converts a polyline stream into a grid-indexed, delta-quantized database
pub struct Settings {
    /// Input feature stream (records of `n:i32, level:i32` then `n` x/y micro-degree pairs)
    #[clap(value_name = "INPUT")]
    pub input: PathBuf,

    /// Bin size in degrees: 1, 2, 5, 10 or 20
    #[clap(value_name = "BIN_SIZE")]
    pub bin_size: BinSize,

    /// Output prefix; writes <PREFIX>.bin, <PREFIX>.seg and <PREFIX>.pt
    #[clap(value_name = "PREFIX")]
    pub output: PathBuf,

    /// Fail when written totals differ from the header instead of warning
    #[clap(long, default_value = "false")]
    pub strict: bool,

    /// Features binned concurrently per batch
    #[clap(long, default_value = "4096")]
    pub batch_size: usize,

    /// Also write the final statistics as JSON to this file
    #[clap(long, value_name = "FILE")]
    pub stats_json: Option<PathBuf>,
}

impl Settings {
    /// Binning configuration selected by these settings
    pub fn config(&self) -> Config {
        Config {
            bin_size: self.bin_size,
            strict: self.strict,
            batch_size: self.batch_size,
        }
    }
}
