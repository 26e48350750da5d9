//! Sparse observation intervals to a dense 1-second grid.
//!
//! Each record paints its four scores over `[start, start + duration)`; later
//! rows paint over earlier ones wherever they overlap. The grid is owned by
//! the caller and filled strictly in sheet row order, never in time order.

use std::ops::Range;

use tracing::{instrument, trace};

use crate::{
    error::{FileError, Result},
    record::ObservationRecord,
};

/// Duration assumed for a record with no usable `Duration_Seconds`.
pub const DEFAULT_DURATION_SECS: f64 = 600.0;
/// What an older revision of the rating tool assumed instead.
pub const LEGACY_DEFAULT_DURATION_SECS: f64 = 60.0;
/// Two days of seconds. Sessions may run past midnight but never this long.
pub const DEFAULT_MAX_SAMPLES: usize = 2 * 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandConfig {
    pub default_duration_secs: f64,
    /// Longest grid a single file may expand to.
    pub max_samples: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: DEFAULT_DURATION_SECS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenseSample {
    pub category_scores: [u8; 4],
    /// Sum of the four scores written by whichever record painted this second.
    pub total_score: u8,
    pub song_label: Option<String>,
}

/// One sample per second; sample `i` sits at `start_time + i` seconds since
/// midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSeries {
    pub start_time: f64,
    pub samples: Vec<DenseSample>,
}

impl DenseSeries {
    pub fn zeroed(start_time: f64, len: usize) -> Self {
        Self {
            start_time,
            samples: vec![DenseSample::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn time_at(&self, index: usize) -> f64 {
        self.start_time + index as f64
    }

    /// Sample indices covered by an observation, clipped to the grid.
    pub fn span(&self, record: &ObservationRecord) -> Range<usize> {
        let len = self.samples.len();
        let start = (record.time_of_day - self.start_time)
            .round()
            .clamp(0.0, len as f64) as usize;
        let end = start
            .saturating_add(record.duration_seconds.round() as usize)
            .min(len);
        start..end
    }
}

/// Time range a set of records expands to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesBounds {
    pub start_time: f64,
    pub end_time: f64,
}

impl SeriesBounds {
    /// The end is the latest start time plus *that* record's duration, where
    /// a tie on the latest start goes to the row that comes last in the sheet.
    /// A longer record starting earlier can therefore run past the end and
    /// gets cut off. This is how the existing exports were produced, so it
    /// stays.
    pub fn of(records: &[ObservationRecord]) -> Option<Self> {
        let mut start_time = f64::INFINITY;
        let mut latest: Option<&ObservationRecord> = None;

        for record in records {
            start_time = start_time.min(record.time_of_day);
            if latest.map_or(true, |latest| record.time_of_day >= latest.time_of_day) {
                latest = Some(record);
            }
        }

        latest.map(|latest| Self {
            start_time,
            end_time: latest.time_of_day + latest.duration_seconds,
        })
    }

    /// Whole seconds covered, or `None` when that exceeds `max_samples`.
    pub fn len_within(&self, max_samples: usize) -> Option<usize> {
        let seconds = (self.end_time - self.start_time).ceil().max(0.0);
        (seconds <= max_samples as f64).then_some(seconds as usize)
    }
}

/// Builds the score grid.
///
/// Fails with [`FileError::NoValidTimestamps`] when there are no records, and
/// with [`FileError::SpanTooLong`] before allocating a grid longer than
/// `config.max_samples`.
#[instrument(skip_all, fields(records = records.len()), level = "debug")]
pub fn expand(records: &[ObservationRecord], config: &ExpandConfig) -> Result<DenseSeries> {
    let bounds = SeriesBounds::of(records).ok_or(FileError::NoValidTimestamps)?;
    let len = bounds
        .len_within(config.max_samples)
        .ok_or_else(|| FileError::SpanTooLong {
            seconds: bounds.end_time - bounds.start_time,
            max_samples: config.max_samples,
        })?;
    let mut series = DenseSeries::zeroed(bounds.start_time, len);

    for record in records {
        let span = series.span(record);
        trace!(row = record.row, ?span, scores = ?record.scores, "painting");
        let total_score = record.total_score();
        for sample in &mut series.samples[span] {
            sample.category_scores = record.scores;
            sample.total_score = total_score;
        }
    }

    Ok(series)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn expand_default(records: &[ObservationRecord]) -> DenseSeries {
        expand(records, &ExpandConfig::default()).unwrap()
    }

    pub(crate) fn record(row: usize, time: f64, duration: f64, scores: [u8; 4]) -> ObservationRecord {
        ObservationRecord {
            row,
            time_of_day: time,
            duration_seconds: duration,
            scores,
            song_label: None,
            free_text: None,
        }
    }

    fn scores_at(series: &DenseSeries, range: Range<usize>) -> Vec<([u8; 4], u8)> {
        series.samples[range]
            .iter()
            .map(|sample| (sample.category_scores, sample.total_score))
            .collect()
    }

    #[test]
    fn single_record_fills_its_duration() {
        let series = expand_default(&[record(1, 32400.0, 120.0, [0, 1, 0, 2])]);
        assert_eq!(series.start_time, 32400.0);
        assert_eq!(series.len(), 120);
        assert!(series
            .samples
            .iter()
            .all(|sample| sample.category_scores == [0, 1, 0, 2] && sample.total_score == 3));
    }

    #[test]
    fn later_row_overwrites_overlap() {
        let series = expand_default(&[
            record(1, 32400.0, 100.0, [1, 0, 0, 0]),
            record(2, 32450.0, 100.0, [0, 0, 0, 3]),
        ]);
        assert_eq!(series.len(), 150);
        assert!(scores_at(&series, 0..50)
            .iter()
            .all(|&scores| scores == ([1, 0, 0, 0], 1)));
        assert!(scores_at(&series, 50..150)
            .iter()
            .all(|&scores| scores == ([0, 0, 0, 3], 3)));
    }

    #[test]
    fn row_order_wins_over_time_order() {
        // the earlier-starting record comes later in the sheet and paints last
        let series = expand_default(&[
            record(1, 100.0, 50.0, [0, 0, 4, 0]),
            record(2, 90.0, 30.0, [2, 2, 0, 0]),
        ]);
        assert_eq!(series.start_time, 90.0);
        assert_eq!(series.len(), 60);
        assert_eq!(scores_at(&series, 9..10), vec![([2, 2, 0, 0], 4)]);
        assert_eq!(scores_at(&series, 29..30), vec![([2, 2, 0, 0], 4)]);
        assert_eq!(scores_at(&series, 30..31), vec![([0, 0, 4, 0], 4)]);
        assert_eq!(scores_at(&series, 59..60), vec![([0, 0, 4, 0], 4)]);
    }

    #[test]
    fn gaps_stay_zero() {
        let series = expand_default(&[
            record(1, 0.0, 10.0, [1, 1, 1, 1]),
            record(2, 20.0, 10.0, [1, 1, 1, 1]),
        ]);
        assert_eq!(series.len(), 30);
        assert!(scores_at(&series, 10..20)
            .iter()
            .all(|&scores| scores == ([0, 0, 0, 0], 0)));
    }

    #[test]
    fn end_uses_duration_of_last_latest_row() {
        let records = [
            record(1, 0.0, 500.0, [1, 0, 0, 0]),
            record(2, 100.0, 30.0, [0, 1, 0, 0]),
            record(3, 100.0, 60.0, [0, 0, 1, 0]),
        ];
        let bounds = SeriesBounds::of(&records).unwrap();
        assert_eq!(bounds.end_time, 160.0);

        // the long first record is cut off at the end bound
        let series = expand_default(&records);
        assert_eq!(series.len(), 160);
        assert_eq!(scores_at(&series, 99..100), vec![([1, 0, 0, 0], 1)]);
        assert_eq!(scores_at(&series, 159..160), vec![([0, 0, 1, 0], 1)]);
    }

    #[test]
    fn fractional_bounds_round_up_the_length() {
        let series = expand_default(&[record(1, 10.5, 4.2, [0, 0, 0, 1])]);
        assert_eq!(series.len(), 5);
        assert_eq!(series.time_at(4), 14.5);
        assert!(series.samples[..4].iter().all(|sample| sample.total_score == 1));
        assert_eq!(series.samples[4].total_score, 0);
    }

    #[test]
    fn totals_always_match_categories() {
        let series = expand_default(&[
            record(1, 0.0, 40.0, [4, 4, 4, 4]),
            record(2, 10.0, 10.0, [0, 3, 0, 1]),
            record(3, 15.0, 40.0, [2, 0, 1, 0]),
        ]);
        for sample in &series.samples {
            let sum: u8 = sample.category_scores.iter().sum();
            assert_eq!(sample.total_score, sum);
        }
    }

    #[test]
    fn span_is_clipped() {
        let series = DenseSeries::zeroed(100.0, 10);
        assert_eq!(series.span(&record(1, 105.0, 100.0, [0; 4])), 5..10);
        assert_eq!(series.span(&record(1, 150.0, 5.0, [0; 4])), 10..10);
        assert_eq!(series.span(&record(1, 100.4, 2.6, [0; 4])), 0..3);
    }

    #[test]
    fn nothing_to_expand() {
        assert!(matches!(
            expand(&[], &ExpandConfig::default()),
            Err(FileError::NoValidTimestamps)
        ));
    }

    #[test]
    fn oversized_span_is_refused() {
        let config = ExpandConfig::default();
        assert!(matches!(
            expand(&[record(1, 32400.0, 1e13, [1, 0, 0, 0])], &config),
            Err(FileError::SpanTooLong { max_samples, .. }) if max_samples == DEFAULT_MAX_SAMPLES
        ));

        let tight = ExpandConfig {
            max_samples: 100,
            ..Default::default()
        };
        assert_eq!(
            expand(&[record(1, 0.0, 100.0, [1, 0, 0, 0])], &tight)
                .unwrap()
                .len(),
            100
        );
        assert!(matches!(
            expand(&[record(1, 0.0, 100.5, [1, 0, 0, 0])], &tight),
            Err(FileError::SpanTooLong { .. })
        ));
    }
}
