//! Range files describing the chromosome (or feature) layout of one genome.
//!
//! Two layouts are understood:
//! - rank: `seqid rank`, one ordered position per line
//! - bp-scale: `seqid start end [name ...]`, the usual BED columns
//!
//! In rank mode a full BED file is also accepted; ranks are then the index of
//! each feature once the file is sorted by `(seqid, start)`.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use log::debug;

use crate::error::{DotplotError, Result};

/// How each line of a range file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    Rank,
    BpScale,
}

impl RecordMode {
    fn min_fields(self) -> usize {
        match self {
            RecordMode::Rank => 2,
            RecordMode::BpScale => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRecord {
    pub sequence_id: String,
    pub start: i64,
    pub end: i64,
}

impl RangeRecord {
    pub fn new(sequence_id: &str, start: i64, end: i64) -> Self {
        RangeRecord { sequence_id: sequence_id.to_string(), start, end }
    }
}

/// Lazily parses range records in file order.
pub struct RangeReader<R> {
    lines: Lines<R>,
    source: String,
    mode: RecordMode,
    line_no: usize,
}

impl RangeReader<BufReader<File>> {
    pub fn open(path: &Path, mode: RecordMode) -> Result<Self> {
        let file = File::open(path).map_err(|e| DotplotError::io(path, e))?;
        Ok(RangeReader::new(BufReader::new(file), &path.display().to_string(), mode))
    }
}

impl<R: BufRead> RangeReader<R> {
    pub fn new(reader: R, source: &str, mode: RecordMode) -> Self {
        RangeReader {
            lines: reader.lines(),
            source: source.to_string(),
            mode,
            line_no: 0,
        }
    }

    fn parse_line(&self, line: &str) -> Result<RangeRecord> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < self.mode.min_fields() {
            return Err(DotplotError::parse(
                &self.source,
                self.line_no,
                line,
                format!("expected at least {} fields, found {}", self.mode.min_fields(), fields.len()),
            ));
        }

        let coord = |field: &str, what: &str| -> Result<i64> {
            let value = field.parse::<i64>().map_err(|_| {
                DotplotError::parse(&self.source, self.line_no, line, format!("{} `{}` is not an integer", what, field))
            })?;
            if value < 0 {
                return Err(DotplotError::parse(&self.source, self.line_no, line, format!("{} `{}` is negative", what, field)));
            }
            Ok(value)
        };

        match self.mode {
            RecordMode::Rank => {
                let rank = coord(fields[1], "rank")?;
                Ok(RangeRecord::new(fields[0], rank, rank))
            }
            RecordMode::BpScale => {
                let start = coord(fields[1], "start")?;
                let end = coord(fields[2], "end")?;
                if end < start {
                    return Err(DotplotError::parse(&self.source, self.line_no, line, "end lies before start"));
                }
                Ok(RangeRecord::new(fields[0], start, end))
            }
        }
    }
}

impl<R: BufRead> Iterator for RangeReader<R> {
    type Item = Result<RangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(DotplotError::io(&self.source, e))),
            };
            self.line_no += 1;
            if is_header(&line) {
                continue;
            }
            return Some(self.parse_line(&line));
        }
    }
}

fn is_header(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser")
}

/// Replace coordinates by the feature's index in `(seqid, start)` order.
pub fn assign_ranks(mut records: Vec<RangeRecord>) -> Vec<RangeRecord> {
    records.sort_by(|a, b| a.sequence_id.cmp(&b.sequence_id).then(a.start.cmp(&b.start)));
    records
        .into_iter()
        .enumerate()
        .map(|(rank, r)| RangeRecord { sequence_id: r.sequence_id, start: rank as i64, end: rank as i64 })
        .collect()
}

/// Number of whitespace-separated fields on the first data line, if any.
fn first_data_field_count(path: &Path) -> Result<Option<usize>> {
    let file = File::open(path).map_err(|e| DotplotError::io(path, e))?;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| DotplotError::io(path, e))?;
        if !is_header(&line) {
            return Ok(Some(line.split_whitespace().count()));
        }
    }
    Ok(None)
}

/// Load every record of a range file.
///
/// In rank mode a file whose data lines carry three or more columns is read
/// as BED and ranked with [`assign_ranks`].
pub fn load_records(path: &Path, mode: RecordMode) -> Result<Vec<RangeRecord>> {
    let records = match mode {
        RecordMode::BpScale => RangeReader::open(path, mode)?.collect::<Result<Vec<_>>>()?,
        RecordMode::Rank => match first_data_field_count(path)? {
            Some(n) if n >= 3 => {
                debug!("{}: BED layout detected, ranking features", path.display());
                let features = RangeReader::open(path, RecordMode::BpScale)?.collect::<Result<Vec<_>>>()?;
                assign_ranks(features)
            }
            _ => RangeReader::open(path, mode)?.collect::<Result<Vec<_>>>()?,
        },
    };
    debug!("{}: {} records", path.display(), records.len());
    Ok(records)
}
