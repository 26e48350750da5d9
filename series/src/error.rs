use thiserror::Error;

/// Everything that can make a single observation file unusable.
///
/// None of these abort a batch: the coordinator logs the error and moves on
/// to the next file.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("annotation export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),

    /// One of the rating columns or the time column is absent.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no parseable timestamps")]
    NoValidTimestamps,

    /// The observations span more seconds than a grid is allowed to hold,
    /// usually a mistyped duration or a time entered as a bare number.
    #[error("observations span {seconds} s, more than the {max_samples} samples allowed")]
    SpanTooLong { seconds: f64, max_samples: usize },
}

pub type Result<T> = std::result::Result<T, FileError>;
