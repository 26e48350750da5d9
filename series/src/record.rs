use csv::StringRecord;
use tracing::warn;

use crate::{
    source::{cell, ColumnMap, Sheet},
    time_codec, RATING_COLUMNS,
};

/// One observation row, with every default already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    /// 1-based data row in the source sheet.
    pub row: usize,
    pub time_of_day: f64,
    /// Always finite and positive.
    pub duration_seconds: f64,
    pub scores: [u8; 4],
    pub song_label: Option<String>,
    pub free_text: Option<String>,
}

impl ObservationRecord {
    /// Returns `None` when the time cell can't be parsed.
    pub fn from_row(
        row_number: usize,
        row: &StringRecord,
        columns: &ColumnMap,
        default_duration: f64,
    ) -> Option<Self> {
        let time_of_day = cell(row, Some(columns.time)).and_then(time_codec::parse)?;

        let duration_seconds = parse_duration(cell(row, columns.duration), default_duration);
        let scores = std::array::from_fn(|category| {
            let value = cell(row, Some(columns.ratings[category]));
            let column = RATING_COLUMNS[category];
            match parse_score(value) {
                Ok(score) => score,
                Err(InvalidScore::Blank) => 0,
                Err(InvalidScore::OutOfRange(score)) => {
                    warn!(row = row_number, column, score, "score outside 0..=4, using 0");
                    0
                }
                Err(InvalidScore::NotANumber) => {
                    warn!(row = row_number, column, value, "unreadable score, using 0");
                    0
                }
            }
        });

        Some(Self {
            row: row_number,
            time_of_day,
            duration_seconds,
            scores,
            song_label: cell(row, columns.song).map(str::to_string),
            free_text: cell(row, columns.observations).map(str::to_string),
        })
    }

    pub fn total_score(&self) -> u8 {
        self.scores.iter().sum()
    }

    pub fn has_annotation(&self) -> bool {
        self.song_label.is_some() || self.free_text.is_some()
    }
}

/// Records of a sheet in row order, plus how many rows were dropped for an
/// unreadable time.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<ObservationRecord>,
    pub skipped_rows: usize,
}

pub fn parse_records(sheet: &Sheet, columns: &ColumnMap, default_duration: f64) -> RecordSet {
    let mut set = RecordSet::default();

    for (index, row) in sheet.rows().iter().enumerate() {
        let row_number = index + 1;
        match ObservationRecord::from_row(row_number, row, columns, default_duration) {
            Some(record) => set.records.push(record),
            None => {
                warn!(
                    row = row_number,
                    time = row.get(columns.time).unwrap_or_default(),
                    "unparseable time, skipping row"
                );
                set.skipped_rows += 1;
            }
        }
    }

    set
}

/// Absent, blank, non-numeric, non-finite, zero and negative durations all
/// fall back to `default`.
pub fn parse_duration(value: Option<&str>, default: f64) -> f64 {
    value
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|duration| duration.is_finite() && *duration > 0.0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidScore {
    Blank,
    NotANumber,
    /// The truncated value, which the Pittsburgh scale has no level for.
    OutOfRange(f64),
}

/// Ratings may be typed as `2` or `2.0`; fractions truncate toward zero.
/// Anything that doesn't land in `0..=4` is invalid.
pub fn parse_score(value: Option<&str>) -> Result<u8, InvalidScore> {
    let score = value
        .ok_or(InvalidScore::Blank)?
        .parse::<f64>()
        .map_err(|_| InvalidScore::NotANumber)?
        .trunc();
    if !score.is_finite() {
        return Err(InvalidScore::NotANumber);
    }
    if (0.0..=4.0).contains(&score) {
        Ok(score as u8)
    } else {
        Err(InvalidScore::OutOfRange(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Time,Duration_Seconds,Aberrant_Vocalization,Motor_Agitation,Aggressiveness,Resisting_Care,Song,Observations\n";

    fn records(body: &str, default_duration: f64) -> RecordSet {
        let sheet = Sheet::from_reader(format!("{HEADER}{body}").as_bytes()).unwrap();
        let columns = ColumnMap::resolve(&sheet).unwrap();
        parse_records(&sheet, &columns, default_duration)
    }

    #[test]
    fn builds_typed_records() {
        let set = records("09:00:00,120,0,1,0,2,Moon River,smiling\n", 600.0);
        assert_eq!(set.skipped_rows, 0);
        assert_eq!(
            set.records,
            vec![ObservationRecord {
                row: 1,
                time_of_day: 32400.0,
                duration_seconds: 120.0,
                scores: [0, 1, 0, 2],
                song_label: Some("Moon River".into()),
                free_text: Some("smiling".into()),
            }]
        );
        assert_eq!(set.records[0].total_score(), 3);
    }

    #[test]
    fn skips_rows_with_unreadable_time() {
        let set = records("bogus,60,1,1,1,1,,\n09:00,60,1,1,1,1,,\n,60,0,0,0,0,,\n", 600.0);
        assert_eq!(set.skipped_rows, 2);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].row, 2);
        assert!(!set.records[0].has_annotation());
    }

    #[test]
    fn defaults_duration_once() {
        let set = records(
            "09:00,,0,0,0,0,,\n09:01,abc,0,0,0,0,,\n09:02,0,0,0,0,0,,\n09:03,-5,0,0,0,0,,\n09:04,30.5,0,0,0,0,,\n",
            60.0,
        );
        let durations = set
            .records
            .iter()
            .map(|record| record.duration_seconds)
            .collect::<Vec<_>>();
        assert_eq!(durations, vec![60.0, 60.0, 60.0, 60.0, 30.5]);
    }

    #[test]
    fn invalid_scores_become_zero() {
        let set = records("09:00,60,2.0,x,7,,,\n", 600.0);
        assert_eq!(set.records[0].scores, [2, 0, 0, 0]);
    }

    #[test]
    fn score_parsing() {
        assert_eq!(parse_score(Some("3")), Ok(3));
        assert_eq!(parse_score(Some("3.9")), Ok(3));
        assert_eq!(parse_score(Some("-0.5")), Ok(0));
        assert_eq!(parse_score(Some("4.5")), Ok(4));
        assert_eq!(parse_score(None), Err(InvalidScore::Blank));
        assert_eq!(parse_score(Some("x")), Err(InvalidScore::NotANumber));
        assert_eq!(parse_score(Some("NaN")), Err(InvalidScore::NotANumber));
    }

    #[test]
    fn out_of_range_scores_keep_their_value_in_the_error() {
        assert_eq!(parse_score(Some("5")), Err(InvalidScore::OutOfRange(5.0)));
        assert_eq!(parse_score(Some("-1")), Err(InvalidScore::OutOfRange(-1.0)));
        assert_eq!(parse_score(Some("12.7")), Err(InvalidScore::OutOfRange(12.0)));

        let set = records("09:00,60,5,-1,3,,,\n", 600.0);
        assert_eq!(set.records[0].scores, [0, 0, 3, 0]);
    }
}
