//! Chromosome extents and their cumulative placement along a plot axis.

use rustc_hash::FxHashMap;

use crate::bed::{RangeRecord, RecordMode};
use crate::error::{DotplotError, Result};

/// The span covered by one run of records sharing a sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub sequence_id: String,
    pub min_start: i64,
    pub max_end: i64,
}

impl Extent {
    pub fn new(sequence_id: &str, min_start: i64, max_end: i64) -> Self {
        Extent { sequence_id: sequence_id.to_string(), min_start, max_end }
    }

    /// Inclusive span length, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        self.max_end.abs_diff(self.min_start).saturating_add(1)
    }
}

/// Reduce each run of consecutive records with the same sequence id to an extent.
///
/// Records of one id are expected to be contiguous. Without `presort`, an id
/// that shows up in several separate runs yields one extent per run; with
/// `presort` the records are first stably sorted by `(sequence_id, start)`.
pub fn aggregate_extents(records: &[RangeRecord], mode: RecordMode, presort: bool) -> Vec<Extent> {
    let mut ordered: Vec<&RangeRecord> = records.iter().collect();
    if presort {
        ordered.sort_by(|a, b| a.sequence_id.cmp(&b.sequence_id).then(a.start.cmp(&b.start)));
    }

    let mut extents = Vec::new();
    for run in ordered.chunk_by(|a, b| a.sequence_id == b.sequence_id) {
        let sequence_id = &run[0].sequence_id;
        let extent = match mode {
            RecordMode::Rank => {
                let mut by_rank = run.to_vec();
                by_rank.sort_by_key(|r| r.start);
                Extent::new(sequence_id, by_rank[0].start, by_rank[by_rank.len() - 1].end)
            }
            RecordMode::BpScale => {
                let min_start = run.iter().map(|r| r.start).min().unwrap_or_default();
                let max_end = run.iter().map(|r| r.end).max().unwrap_or_default();
                Extent::new(sequence_id, min_start, max_end)
            }
        };
        extents.push(extent);
    }
    extents
}

/// Sequence ids split over more than one run, in first-seen order.
pub fn find_split_sequences(records: &[RangeRecord]) -> Vec<String> {
    let mut runs: FxHashMap<&str, usize> = FxHashMap::default();
    let mut order = Vec::new();
    for run in records.chunk_by(|a, b| a.sequence_id == b.sequence_id) {
        let id = run[0].sequence_id.as_str();
        let count = runs.entry(id).or_insert(0);
        if *count == 0 {
            order.push(id);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|id| runs[id] > 1)
        .map(str::to_string)
        .collect()
}

/// Where one sequence sits on the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Break {
    pub sequence_id: String,
    pub boundary_start: u64,
    pub midpoint: f64,
    pub boundary_end: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisLayout {
    pub total_length: u64,
    pub breaks: Vec<Break>,
}

impl AxisLayout {
    /// Lay extents end to end in their given order.
    pub fn from_extents(extents: &[Extent]) -> Result<Self> {
        let mut offset = 0u64;
        let mut breaks = Vec::with_capacity(extents.len());
        for extent in extents {
            let len = extent.len();
            let end = offset
                .checked_add(len)
                .ok_or_else(|| DotplotError::AxisTooLong(extent.sequence_id.clone()))?;
            breaks.push(Break {
                sequence_id: extent.sequence_id.clone(),
                boundary_start: offset,
                midpoint: offset as f64 + len as f64 / 2.0,
                boundary_end: end,
            });
            offset = end;
        }
        Ok(AxisLayout { total_length: offset, breaks })
    }

    /// Position as a fraction of the axis length; 0 on an empty axis.
    pub fn fraction(&self, pos: f64) -> f64 {
        if self.total_length == 0 {
            0.0
        } else {
            pos / self.total_length as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[(&str, i64, i64)]) -> Vec<RangeRecord> {
        rows.iter().map(|&(id, s, e)| RangeRecord::new(id, s, e)).collect()
    }

    #[test]
    fn bpscale_extents_take_min_and_max() {
        let recs = records(&[("chr1", 1, 10), ("chr1", 5, 20), ("chr2", 100, 150)]);
        let extents = aggregate_extents(&recs, RecordMode::BpScale, false);
        assert_eq!(extents, vec![Extent::new("chr1", 1, 20), Extent::new("chr2", 100, 150)]);
    }

    #[test]
    fn bpscale_extents_ignore_record_order() {
        let recs = records(&[("chr1", 50, 60), ("chr1", 5, 8), ("chr1", 20, 90)]);
        assert_eq!(aggregate_extents(&recs, RecordMode::BpScale, false), vec![Extent::new("chr1", 5, 90)]);
    }

    #[test]
    fn rank_extents() {
        let recs = records(&[("chr1", 1, 1), ("chr1", 2, 2), ("chr2", 1, 1)]);
        let extents = aggregate_extents(&recs, RecordMode::Rank, false);
        assert_eq!(extents, vec![Extent::new("chr1", 1, 2), Extent::new("chr2", 1, 1)]);
    }

    #[test]
    fn rank_extents_sort_within_run() {
        let recs = records(&[("chr1", 7, 7), ("chr1", 3, 3), ("chr1", 5, 5)]);
        assert_eq!(aggregate_extents(&recs, RecordMode::Rank, false), vec![Extent::new("chr1", 3, 7)]);
    }

    #[test]
    fn empty_input_has_no_extents() {
        assert!(aggregate_extents(&[], RecordMode::BpScale, false).is_empty());
        assert_eq!(AxisLayout::from_extents(&[]).unwrap(), AxisLayout::default());
    }

    #[test]
    fn split_runs_stay_separate_unless_sorted() {
        let recs = records(&[("chr1", 1, 10), ("chr2", 1, 5), ("chr1", 30, 40)]);
        let unsorted = aggregate_extents(&recs, RecordMode::BpScale, false);
        assert_eq!(
            unsorted,
            vec![Extent::new("chr1", 1, 10), Extent::new("chr2", 1, 5), Extent::new("chr1", 30, 40)]
        );
        let sorted = aggregate_extents(&recs, RecordMode::BpScale, true);
        assert_eq!(sorted, vec![Extent::new("chr1", 1, 40), Extent::new("chr2", 1, 5)]);
        assert_eq!(find_split_sequences(&recs), vec!["chr1".to_string()]);
    }

    #[test]
    fn no_split_sequences_in_grouped_input() {
        let recs = records(&[("chr1", 1, 10), ("chr1", 11, 20), ("chr2", 1, 5)]);
        assert!(find_split_sequences(&recs).is_empty());
    }

    #[test]
    fn layout_is_cumulative() {
        let extents = vec![Extent::new("chr1", 1, 20), Extent::new("chr2", 100, 150), Extent::new("chr3", 0, 0)];
        let layout = AxisLayout::from_extents(&extents).unwrap();

        let lengths: Vec<u64> = extents.iter().map(Extent::len).collect();
        assert_eq!(lengths, vec![20, 51, 1]);
        assert_eq!(layout.total_length, lengths.iter().sum::<u64>());
        assert_eq!(layout.total_length, layout.breaks.last().unwrap().boundary_end);

        for pair in layout.breaks.windows(2) {
            assert_eq!(pair[1].boundary_start, pair[0].boundary_end);
        }

        let ids: Vec<&str> = layout.breaks.iter().map(|b| b.sequence_id.as_str()).collect();
        assert_eq!(ids, vec!["chr1", "chr2", "chr3"]);
        assert_eq!(layout.breaks[0].midpoint, 10.0);
        assert_eq!(layout.breaks[1].boundary_start, 20);
        assert_eq!(layout.breaks[1].midpoint, 45.5);
    }

    #[test]
    fn fraction_of_empty_axis_is_zero() {
        assert_eq!(AxisLayout::default().fraction(5.0), 0.0);
        let layout = AxisLayout::from_extents(&[Extent::new("chr1", 1, 100)]).unwrap();
        assert_eq!(layout.fraction(25.0), 0.25);
    }

    #[test]
    fn huge_extents_do_not_panic() {
        assert_eq!(Extent::new("c", i64::MIN, i64::MAX).len(), u64::MAX);
        assert_eq!(Extent::new("c", 0, i64::MAX).len(), 1 << 63);

        let huge = vec![Extent::new("c1", 0, i64::MAX), Extent::new("c2", 0, i64::MAX)];
        match AxisLayout::from_extents(&huge) {
            Err(DotplotError::AxisTooLong(id)) => assert_eq!(id, "c2"),
            other => panic!("expected overflow error, got {:?}", other),
        }
    }
}
