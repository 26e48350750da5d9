//! Rebuilds dense 1-second agitation time series from sparse observation sheets
//! and lays out the song / observation annotations that go along the timeline.

pub mod audit;
pub mod batch;
pub mod error;
pub mod expand;
pub mod label;
pub mod layout;
pub mod output;
pub mod record;
pub mod source;
pub mod stats;
pub mod time_codec;

pub use error::{FileError, Result};
pub use expand::{DenseSample, DenseSeries, ExpandConfig};
pub use layout::{AnnotationEvent, LayoutConfig};
pub use record::ObservationRecord;

/// The four Pittsburgh Agitation Scale categories, in output column order.
pub const RATING_COLUMNS: [&str; 4] = [
    "Aberrant_Vocalization",
    "Motor_Agitation",
    "Aggressiveness",
    "Resisting_Care",
];

pub const TIME_COLUMN: &str = "Time";
pub const DURATION_COLUMN: &str = "Duration_Seconds";
pub const SONG_COLUMN: &str = "Song";
pub const OBSERVATIONS_COLUMN: &str = "Observations";
