//! Tabular input: one observation sheet per CSV file.

use std::{fs::File, io::Read, path::Path};

use csv::StringRecord;
use tracing::{instrument, trace};

use crate::{
    error::{FileError, Result},
    DURATION_COLUMN, OBSERVATIONS_COLUMN, RATING_COLUMNS, SONG_COLUMN, TIME_COLUMN,
};

/// Raw rows of a sheet with their (trimmed) header names.
#[derive(Debug, Clone)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Sheet {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
            .collect::<Vec<_>>();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        trace!(columns = headers.len(), rows = rows.len(), "read sheet");

        Ok(Self { headers, rows })
    }

    #[instrument(level = "trace")]
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// First column whose header contains any of `needles`, ignoring case.
    pub fn column_containing(&self, needles: &[&str]) -> Option<usize> {
        self.headers.iter().position(|header| {
            let header = header.to_lowercase();
            needles.iter().any(|needle| header.contains(needle))
        })
    }
}

/// Non-blank, trimmed cell content. Short rows read as blank.
pub fn cell(row: &StringRecord, column: Option<usize>) -> Option<&str> {
    column
        .and_then(|index| row.get(index))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Where the columns of interest live in a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub time: usize,
    pub ratings: [usize; 4],
    pub duration: Option<usize>,
    pub song: Option<usize>,
    pub observations: Option<usize>,
}

impl ColumnMap {
    /// Fails when the time column or any rating column is absent.
    pub fn resolve(sheet: &Sheet) -> Result<Self> {
        let ratings = RATING_COLUMNS.map(|name| sheet.column(name));
        let time = sheet.column(TIME_COLUMN);

        let mut missing = RATING_COLUMNS
            .iter()
            .zip(ratings)
            .filter(|(_, index)| index.is_none())
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>();
        if time.is_none() {
            missing.push(TIME_COLUMN.to_string());
        }

        match (time, ratings) {
            (Some(time), [Some(a), Some(b), Some(c), Some(d)]) => Ok(Self {
                time,
                ratings: [a, b, c, d],
                duration: sheet.column(DURATION_COLUMN),
                song: sheet.column(SONG_COLUMN),
                observations: sheet.column(OBSERVATIONS_COLUMN),
            }),
            _ => Err(FileError::MissingColumns(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(text: &str) -> Sheet {
        Sheet::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn resolves_columns_by_trimmed_name() {
        let sheet = sheet(
            " Time ,Song,Aberrant_Vocalization,Motor_Agitation,Aggressiveness,Resisting_Care\n\
             09:00,,0,0,0,0\n",
        );
        let columns = ColumnMap::resolve(&sheet).unwrap();
        assert_eq!(columns.time, 0);
        assert_eq!(columns.song, Some(1));
        assert_eq!(columns.ratings, [2, 3, 4, 5]);
        assert_eq!(columns.duration, None);
        assert_eq!(columns.observations, None);
    }

    #[test]
    fn reports_every_missing_column() {
        let sheet = sheet("Aberrant_Vocalization,Aggressiveness\n1,2\n");
        match ColumnMap::resolve(&sheet) {
            Err(FileError::MissingColumns(missing)) => assert_eq!(
                missing,
                vec!["Motor_Agitation", "Resisting_Care", "Time"]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_rows_read_as_blank() {
        let sheet = sheet("Time,Song\n09:00\n");
        let row = &sheet.rows()[0];
        assert_eq!(cell(row, Some(0)), Some("09:00"));
        assert_eq!(cell(row, Some(1)), None);
        assert_eq!(cell(row, None), None);
    }

    #[test]
    fn finds_loosely_named_columns() {
        let sheet = sheet("Date,Music Played,Notes\n");
        assert_eq!(sheet.column_containing(&["song", "music"]), Some(1));
        assert_eq!(sheet.column_containing(&["score"]), None);
    }
}
