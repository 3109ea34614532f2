//! `lines_to_bins <input-file> <bin-size> <output-prefix>`
//!
//! Diagnostics and the final statistics summary go to stderr.

mod logging;
mod settings;

use clap::Parser;
use line_bins::{BinError, BinStats, LineBinner};
use settings::Settings;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Bin(#[from] BinError),

    #[error("Cannot write statistics to {}: {source}", path.display())]
    StatsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize statistics to {}: {source}", path.display())]
    StatsJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn run(settings: &Settings) -> Result<LineBinner, CliError> {
    profiling::scope!("lines_to_bins::run");

    let mut binner = LineBinner::new(settings.config());
    binner.load_file(&settings.input)?;
    binner.write(&settings.output)?;

    let stats = binner.stats();
    stats.log_summary();

    if let Some(path) = &settings.stats_json {
        let file = File::create(path).map_err(|source| CliError::StatsIo {
            path: path.clone(),
            source,
        })?;
        write_stats(BufWriter::new(file), path, stats)?;
    }
    Ok(binner)
}

/// Serialize `stats` as pretty JSON and flush, so a failed final write is reported
fn write_stats<W: Write>(mut writer: W, path: &Path, stats: &BinStats) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut writer, stats).map_err(|source| CliError::StatsJson {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| CliError::StatsIo {
        path: path.to_path_buf(),
        source,
    })
}

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::parse();

    match run(&settings) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("lines_to_bins: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use line_bins::codec::FeatureWriter;
    use line_bins::{BinnedLines, Feature};

    #[test]
    fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("coast.lines");
        let mut writer = FeatureWriter::create(&input).unwrap();
        writer
            .write_feature(&Feature::from_degrees(0, 1, &[(0.0, 0.0), (6.0, 0.0)]))
            .unwrap();
        writer
            .write_feature(&Feature::from_degrees(1, 2, &[(359.9, 1.0), (0.1, 1.0)]))
            .unwrap();
        writer.finish().unwrap();

        let stats_path = dir.path().join("stats.json");
        let settings = Settings::try_parse_from([
            "lines_to_bins".into(),
            "--strict".into(),
            "--stats-json".into(),
            stats_path.clone().into_os_string(),
            input.into_os_string(),
            "5".into(),
            dir.path().join("binned").into_os_string(),
        ])
        .unwrap();

        let binner = run(&settings).unwrap();
        assert_eq!(binner.stats().features, 2);

        let db = BinnedLines::open(dir.path().join("binned")).unwrap();
        assert_eq!(db.header().n_segments, 4);

        let json = std::fs::read_to_string(stats_path).unwrap();
        let stats: BinStats = serde_json::from_str(&json).unwrap();
        assert_eq!(&stats, binner.stats());
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::try_parse_from([
            "lines_to_bins".into(),
            dir.path().join("absent").into_os_string(),
            "5".into(),
            dir.path().join("out").into_os_string(),
        ])
        .unwrap();

        match run(&settings) {
            Err(CliError::Bin(BinError::Io { .. })) => {}
            other => panic!("expected Io error, got {:?}", other.map(|_| ())),
        }
    }

    /// Accepts every write but fails to flush
    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_stats_flush_failure_is_reported() {
        let path = Path::new("stats.json");
        match write_stats(FailingFlush(Vec::new()), path, &BinStats::default()) {
            Err(CliError::StatsIo { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("expected StatsIo, got {other:?}"),
        }
    }

    #[test]
    fn test_stats_written_to_buffer() {
        let mut out = Vec::new();
        write_stats(&mut out, Path::new("stats.json"), &BinStats::default()).unwrap();
        let stats: BinStats = serde_json::from_slice(&out).unwrap();
        assert_eq!(stats, BinStats::default());
    }
}
