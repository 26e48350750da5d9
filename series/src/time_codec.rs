//! Wall-clock strings to seconds since midnight and back.
//!
//! Observation sheets are typed by hand, so the time column holds whatever the
//! rater felt like writing: `14:30:45`, `2:30 PM`, `14.30`, or just a number of
//! seconds. Parsing walks a fixed list of clock layouts and takes the first one
//! that consumes the whole string, then falls back to a `mm:ss` reading and
//! finally to a bare number. The order matters: `14.30` is a clock time, not
//! fourteen and a bit seconds.

use std::sync::LazyLock;

use regex::Regex;
use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, Duration,
    PrimitiveDateTime, Time,
};

const CLOCK_FORMATS: [&[BorrowedFormatItem<'static>]; 6] = [
    format_description!("[hour padding:none]:[minute padding:none]:[second padding:none]"),
    format_description!("[hour padding:none]:[minute padding:none]"),
    format_description!(
        "[hour repr:12 padding:none]:[minute padding:none] [period case_sensitive:false]"
    ),
    format_description!(
        "[hour repr:12 padding:none]:[minute padding:none]:[second padding:none] [period case_sensitive:false]"
    ),
    format_description!("[hour padding:none].[minute padding:none].[second padding:none]"),
    format_description!("[hour padding:none].[minute padding:none]"),
];

const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

static MINUTES_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+):([0-9]+)").expect("static pattern"));

/// Parses a time-of-day cell into seconds since midnight.
///
/// Returns `None` when nothing matches; callers drop the row.
pub fn parse(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(time) = CLOCK_FORMATS
        .iter()
        .find_map(|description| Time::parse(text, *description).ok())
    {
        return Some(seconds_of(time));
    }

    if let Some(seconds) = parse_minutes_seconds(text) {
        return Some(seconds);
    }

    text.parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

fn seconds_of(time: Time) -> f64 {
    let (hour, minute, second) = time.as_hms();
    f64::from(hour) * 3600.0 + f64::from(minute) * 60.0 + f64::from(second)
}

/// `25:30` is not a clock time but reads fine as twenty-five minutes thirty.
/// Only the leading `digits:digits` is considered, anything after it is ignored.
fn parse_minutes_seconds(text: &str) -> Option<f64> {
    let captures = MINUTES_SECONDS.captures(text)?;
    let minutes: u64 = captures[1].parse().ok()?;
    let seconds: u64 = captures[2].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    Some((minutes * 60 + seconds) as f64)
}

/// Formats seconds since midnight as `HH:MM:SS`, truncating fractions.
///
/// Hours keep counting past 23 so a session running over midnight stays
/// monotonic.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.floor().max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Places an offset from midnight on a calendar day, for renderers that want
/// real datetime axes. The date itself carries no meaning.
pub fn to_datetime(reference_date: Date, seconds: f64) -> PrimitiveDateTime {
    PrimitiveDateTime::new(reference_date, Time::MIDNIGHT)
        .saturating_add(Duration::seconds_f64(seconds))
}

pub fn format_datetime(datetime: PrimitiveDateTime) -> Result<String, time::error::Format> {
    datetime.format(DATETIME_FORMAT)
}
