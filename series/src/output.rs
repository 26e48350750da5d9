//! Everything a file's processing hands downstream: the dense CSV, the
//! annotation placements for the renderer, and where both go on disk.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::NamedTempFile;
use time::Date;
use tracing::debug;

use crate::{
    error::Result,
    expand::DenseSeries,
    layout::{AnnotationEvent, LayoutConfig},
    stats::{SeriesStats, TOTAL_COLUMN},
    time_codec, RATING_COLUMNS,
};

/// Every observation sheet's file name ends with this.
pub const INPUT_MARKER: &str = "Observations_with_Pittsburgh_Scale.csv";
pub const OUTPUT_MARKER: &str = "Pittsburgh_TimeSeries_1sec.csv";

/// `X_Observations_with_Pittsburgh_Scale.csv` becomes
/// `X_Pittsburgh_TimeSeries_1sec.csv`. Names without the marker get the
/// output marker appended to their stem.
pub fn derive_output_name(input_name: &str) -> String {
    if input_name.contains(INPUT_MARKER) {
        return input_name.replace(INPUT_MARKER, OUTPUT_MARKER);
    }
    let stem = Path::new(input_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(input_name);
    format!("{stem}_{OUTPUT_MARKER}")
}

pub fn series_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    input.with_file_name(derive_output_name(&name))
}

pub fn annotations_path(series_path: &Path) -> PathBuf {
    let stem = series_path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    series_path.with_file_name(format!("{stem}_annotations.json"))
}

/// A file written next to its final location and only moved into place on
/// [`StagedFile::commit`]. Dropping it uncommitted removes the temp file.
pub struct StagedFile {
    target: PathBuf,
    file: NamedTempFile,
}

impl StagedFile {
    pub fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        Ok(Self {
            target: target.to_path_buf(),
            file: NamedTempFile::new_in(dir)?,
        })
    }

    pub fn file(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    pub fn commit(self) -> Result<PathBuf> {
        self.file
            .persist(&self.target)
            .map_err(|error| error.error)?;
        debug!(path = %self.target.display(), "persisted");
        Ok(self.target)
    }
}

pub fn write_series<W: Write>(
    series: &DenseSeries,
    reference_date: Date,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    let mut header = vec!["Time_Seconds", "Time", "Datetime"];
    header.extend(RATING_COLUMNS);
    header.extend([TOTAL_COLUMN, "Current_Song"]);
    writer.write_record(&header)?;

    for (index, sample) in series.samples.iter().enumerate() {
        let seconds = series.time_at(index);
        let datetime = time_codec::to_datetime(reference_date, seconds);

        let mut record = Vec::with_capacity(header.len());
        record.push(index.to_string());
        record.push(time_codec::format_hms(seconds));
        record.push(time_codec::format_datetime(datetime)?);
        record.extend(sample.category_scores.iter().map(u8::to_string));
        record.push(sample.total_score.to_string());
        record.push(sample.song_label.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnnotationExport<'a> {
    source: &'a str,
    start_time: f64,
    start_label: String,
    samples: usize,
    level_offsets: &'a [f64],
    stats: &'a SeriesStats,
    annotations: Vec<PlacedAnnotation<'a>>,
}

#[derive(Debug, Serialize)]
struct PlacedAnnotation<'a> {
    time: f64,
    time_label: String,
    text: &'a str,
    has_song: bool,
    assigned_level: usize,
    offset: f64,
}

/// Writes the renderer hand-off: placements, level offsets and the series
/// summary, as pretty JSON.
pub fn write_annotations<W: Write>(
    writer: W,
    source: &str,
    series: &DenseSeries,
    events: &[AnnotationEvent],
    stats: &SeriesStats,
    layout: &LayoutConfig,
) -> Result<()> {
    let export = AnnotationExport {
        source,
        start_time: series.start_time,
        start_label: time_codec::format_hms(series.start_time),
        samples: series.len(),
        level_offsets: &layout.level_offsets,
        stats,
        annotations: events
            .iter()
            .map(|event| PlacedAnnotation {
                time: event.time,
                time_label: time_codec::format_hms(event.time),
                text: &event.text,
                has_song: event.has_song,
                assigned_level: event.assigned_level,
                offset: layout.offset(event.assigned_level),
            })
            .collect(),
    };

    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
