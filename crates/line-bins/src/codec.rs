//! Input feature stream
//!
//! A stream is a sequence of records, each a header `n:i32, level:i32`
//! followed by `n` points `x:i32, y:i32` in micro-degrees (longitude, then
//! latitude), all little-endian. Features are numbered by their position in
//! the stream, starting at 0.

use crate::format::read_i32;
use crate::{BinError, Feature, Result};
use geo::Coord;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Iterator over the features of an input stream
///
/// Features with no points are skipped with a warning. Iteration stops after
/// the first error.
pub struct FeatureReader<R> {
    reader: R,
    /// File name used in error messages
    label: PathBuf,
    next_id: usize,
    done: bool,
}

impl FeatureReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(BinError::io(path))?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> FeatureReader<R> {
    pub fn new(reader: R, label: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            label: label.into(),
            next_id: 0,
            done: false,
        }
    }

    /// Fill `buf`, returning false on a clean end of stream before any byte
    fn read_record_start(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(k) => filled += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn read_feature(&mut self) -> Result<Option<Feature>> {
        loop {
            let mut head = [0u8; 8];
            if !self
                .read_record_start(&mut head)
                .map_err(BinError::io(&self.label))?
            {
                return Ok(None);
            }
            let id = self.next_id;
            self.next_id += 1;

            let n = i32::from_le_bytes([head[0], head[1], head[2], head[3]]);
            let level = i32::from_le_bytes([head[4], head[5], head[6], head[7]]);

            let n = usize::try_from(n).map_err(|_| BinError::InvalidHeader {
                feature: id,
                reason: format!("negative point count {n}"),
            })?;
            let level = u16::try_from(level).map_err(|_| BinError::InvalidHeader {
                feature: id,
                reason: format!("level {level} out of range"),
            })?;

            if n == 0 {
                tracing::warn!("Feature {id} has no points; skipped");
                continue;
            }

            let mut points = Vec::with_capacity(n.min(1 << 20));
            for _ in 0..n {
                let x = read_i32(&mut self.reader).map_err(BinError::io(&self.label))?;
                let y = read_i32(&mut self.reader).map_err(BinError::io(&self.label))?;
                points.push(Coord { x, y });
            }
            return Ok(Some(Feature::new(id, level, points)));
        }
    }
}

impl<R: Read> Iterator for FeatureReader<R> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_feature() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Writer producing an input stream, for fixtures and conversions
pub struct FeatureWriter<W: Write> {
    writer: W,
    label: PathBuf,
}

impl FeatureWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(BinError::io(path))?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> FeatureWriter<W> {
    pub fn new(writer: W, label: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            label: label.into(),
        }
    }

    /// Append one feature record; the feature's id is implied by its position
    pub fn write_feature(&mut self, feature: &Feature) -> Result<()> {
        let n = i32::try_from(feature.len()).map_err(|_| BinError::TooLarge {
            what: "feature points",
            value: feature.len(),
        })?;
        self.write_raw(n, feature.level as i32, &feature.points)
            .map_err(BinError::io(&self.label))
    }

    fn write_raw(&mut self, n: i32, level: i32, points: &[Coord<i32>]) -> io::Result<()> {
        self.writer.write_all(&n.to_le_bytes())?;
        self.writer.write_all(&level.to_le_bytes())?;
        for p in points {
            self.writer.write_all(&p.x.to_le_bytes())?;
            self.writer.write_all(&p.y.to_le_bytes())?;
        }
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().map_err(BinError::io(&self.label))?;
        Ok(self.writer)
    }
}
