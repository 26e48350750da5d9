//! Runs the whole pipeline over observation files, one file at a time.
//!
//! A file either produces its series (and annotation export) in full or
//! produces nothing; whatever went wrong is logged and the batch carries on.

use std::path::{Path, PathBuf};

use time::{macros::date, Date};
use tracing::{info, instrument, warn};

use crate::{
    error::Result,
    expand::{expand, DenseSeries, ExpandConfig},
    label::propagate_labels,
    layout::{layout, AnnotationEvent, LayoutConfig},
    output::{self, StagedFile, INPUT_MARKER},
    record::parse_records,
    source::{ColumnMap, Sheet},
    stats::SeriesStats,
    time_codec,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub expand: ExpandConfig,
    pub layout: LayoutConfig,
    /// Day the `Datetime` column is anchored to.
    pub reference_date: Date,
    pub write_annotations: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            expand: ExpandConfig::default(),
            layout: LayoutConfig::default(),
            reference_date: date!(1900 - 01 - 01),
            write_annotations: true,
        }
    }
}

/// Every observation sheet below `root`, sorted by path.
pub fn discover(root: &Path) -> std::result::Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = format!(
        "{}/**/*{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        INPUT_MARKER
    );

    let mut files = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(error) => {
                warn!(%error, "unreadable entry during discovery");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();

    Ok(files)
}

/// In-memory result of the pipeline for one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBuild {
    pub series: DenseSeries,
    pub events: Vec<AnnotationEvent>,
    pub stats: SeriesStats,
    pub skipped_rows: usize,
}

pub fn build(sheet: &Sheet, config: &BatchConfig) -> Result<SeriesBuild> {
    let columns = ColumnMap::resolve(sheet)?;
    let set = parse_records(sheet, &columns, config.expand.default_duration_secs);

    let mut series = expand(&set.records, &config.expand)?;
    propagate_labels(&mut series, &set.records);
    let events = layout(&set.records, &config.layout);
    let stats = SeriesStats::of(&series);

    Ok(SeriesBuild {
        series,
        events,
        stats,
        skipped_rows: set.skipped_rows,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub series_path: PathBuf,
    pub annotations_path: Option<PathBuf>,
    pub samples: usize,
    pub annotations: usize,
    pub skipped_rows: usize,
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn process_file(path: &Path, config: &BatchConfig) -> Result<ProcessedFile> {
    info!("processing");
    let sheet = Sheet::open(path)?;
    let build = build(&sheet, config)?;
    let series = &build.series;

    let series_path = output::series_path(path);
    let mut staged_series = StagedFile::create(&series_path)?;
    {
        let mut writer = csv::Writer::from_writer(staged_series.file());
        output::write_series(series, config.reference_date, &mut writer)?;
    }

    let staged_annotations = if config.write_annotations {
        let annotations_path = output::annotations_path(&series_path);
        let mut staged = StagedFile::create(&annotations_path)?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        output::write_annotations(
            staged.file(),
            &source,
            series,
            &build.events,
            &build.stats,
            &config.layout,
        )?;
        Some(staged)
    } else {
        None
    };

    let series_path = staged_series.commit()?;
    let annotations_path = match staged_annotations.map(StagedFile::commit).transpose() {
        Ok(annotations_path) => annotations_path,
        Err(error) => {
            // the series alone would be a partial result
            if let Err(remove_error) = std::fs::remove_file(&series_path) {
                warn!(%remove_error, output = %series_path.display(), "failed to remove series");
            }
            return Err(error);
        }
    };

    let last = series.len().saturating_sub(1);
    info!(
        samples = series.len(),
        from = %time_codec::format_hms(series.time_at(0)),
        to = %time_codec::format_hms(series.time_at(last)),
        annotations = build.events.len(),
        skipped_rows = build.skipped_rows,
        mean_total = %format!("{:.2}", build.stats.total.mean),
        max_total = build.stats.total.max,
        active_pct = %format!("{:.1}", build.stats.total.active_pct),
        output = %series_path.display(),
        "generated series"
    );

    Ok(ProcessedFile {
        input: path.to_path_buf(),
        series_path,
        annotations_path,
        samples: series.len(),
        annotations: build.events.len(),
        skipped_rows: build.skipped_rows,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub input: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub processed: Vec<ProcessedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl BatchSummary {
    pub fn record(&mut self, input: &Path, outcome: Result<ProcessedFile>) {
        match outcome {
            Ok(processed) => self.processed.push(processed),
            Err(error) => self.skip(input, error.to_string()),
        }
    }

    pub fn skip(&mut self, input: &Path, reason: String) {
        warn!(path = %input.display(), %reason, "skipping file");
        self.skipped.push(SkippedFile {
            input: input.to_path_buf(),
            reason,
        });
    }
}

/// Processes `files` in order on the current thread.
pub fn run(files: &[PathBuf], config: &BatchConfig) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for path in files {
        summary.record(path, process_file(path, config));
    }
    info!(
        processed = summary.processed.len(),
        skipped = summary.skipped.len(),
        "batch complete"
    );
    summary
}
