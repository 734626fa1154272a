//! The `.qa` point list: anchor pairs grouped into clusters.
//!
//! ```text
//! # cluster 1
//! chr1  102  chr5  880  31
//! chr1  103  chr5  881  31
//! # cluster 2
//! ...
//! ```
//!
//! Lines starting with `#` and blank lines separate clusters. Every other line
//! carries `label_a pos_a label_b pos_b score`; only the two positions are used.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use log::debug;

use crate::error::{DotplotError, Result};

const QA_FIELDS: usize = 5;

/// One hit between the query (x) and subject (y) genomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointPair {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl BoundingBox {
    /// Smallest rectangle holding every point, or `None` for no points.
    pub fn from_points(points: &[PointPair]) -> Option<Self> {
        let first = points.first()?;
        let init = BoundingBox { x_min: first.x, x_max: first.x, y_min: first.y, y_max: first.y };
        Some(points[1..].iter().fold(init, |b, p| BoundingBox {
            x_min: b.x_min.min(p.x),
            x_max: b.x_max.max(p.x),
            y_min: b.y_min.min(p.y),
            y_max: b.y_max.max(p.y),
        }))
    }
}

fn is_delimiter(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('#')
}

fn parse_hit(line: &str, source: &str, line_no: usize) -> Result<PointPair> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != QA_FIELDS {
        return Err(DotplotError::parse(
            source,
            line_no,
            line,
            format!("expected {} fields, found {}", QA_FIELDS, fields.len()),
        ));
    }
    let pos = |field: &str| -> Result<i64> {
        field
            .parse::<i64>()
            .map_err(|_| DotplotError::parse(source, line_no, line, format!("position `{}` is not an integer", field)))
    };
    Ok(PointPair { x: pos(fields[1])?, y: pos(fields[3])? })
}

/// Streams one bounding box per non-empty cluster block.
pub struct ClusterBoxes<R> {
    lines: Lines<R>,
    source: String,
    line_no: usize,
    /// A `#` header opened the block being collected.
    in_header_block: bool,
    empty_blocks: usize,
    done: bool,
}

impl<R: BufRead> ClusterBoxes<R> {
    pub fn new(reader: R, source: &str) -> Self {
        ClusterBoxes {
            lines: reader.lines(),
            source: source.to_string(),
            line_no: 0,
            in_header_block: false,
            empty_blocks: 0,
            done: false,
        }
    }

    /// Header blocks seen so far that held no points.
    pub fn empty_blocks(&self) -> usize {
        self.empty_blocks
    }

    fn close_block(&mut self, block: &[PointPair]) -> Option<BoundingBox> {
        let bbox = BoundingBox::from_points(block);
        if bbox.is_none() && self.in_header_block {
            self.empty_blocks += 1;
        }
        bbox
    }

    fn fail(&mut self, err: DotplotError) -> Option<Result<BoundingBox>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for ClusterBoxes<R> {
    type Item = Result<BoundingBox>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut block: Vec<PointPair> = Vec::new();
        loop {
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return self.close_block(&block).map(Ok);
                }
                Some(Err(e)) => {
                    let err = DotplotError::io(&self.source, e);
                    return self.fail(err);
                }
                Some(Ok(line)) => line,
            };
            self.line_no += 1;

            if is_delimiter(&line) {
                let bbox = self.close_block(&block);
                self.in_header_block = line.trim_start().starts_with('#');
                if let Some(bbox) = bbox {
                    return Some(Ok(bbox));
                }
                continue;
            }

            match parse_hit(&line, &self.source, self.line_no) {
                Ok(point) => block.push(point),
                Err(e) => return self.fail(e),
            }
        }
    }
}

/// Bounding boxes of every cluster in the file at `path`.
pub fn extract_boxes(path: &Path) -> Result<Vec<BoundingBox>> {
    let file = File::open(path).map_err(|e| DotplotError::io(path, e))?;
    let mut clusters = ClusterBoxes::new(BufReader::new(file), &path.display().to_string());
    let boxes = clusters.by_ref().collect::<Result<Vec<_>>>()?;
    debug!(
        "{}: {} cluster boxes, {} empty blocks skipped",
        path.display(),
        boxes.len(),
        clusters.empty_blocks()
    );
    Ok(boxes)
}

/// Every point pair of `reader`, in order, ignoring cluster boundaries.
pub fn parse_points<R: BufRead>(reader: R, source: &str) -> Result<Vec<PointPair>> {
    let mut points = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DotplotError::io(source, e))?;
        if is_delimiter(&line) {
            continue;
        }
        points.push(parse_hit(&line, source, idx + 1)?);
    }
    Ok(points)
}

pub fn read_points(path: &Path) -> Result<Vec<PointPair>> {
    let file = File::open(path).map_err(|e| DotplotError::io(path, e))?;
    let points = parse_points(BufReader::new(file), &path.display().to_string())?;
    debug!("{}: {} points", path.display(), points.len());
    Ok(points)
}
