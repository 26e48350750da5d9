//! Vertical placement of song and observation notes under the timeline.
//!
//! Notes are stacked on a small fixed set of levels. Walking the notes in row
//! order, a note that lands within the collision window of the previous one
//! moves down a level (wrapping back to the top after the last), and a note
//! after a quiet stretch starts again at the top. This is a greedy single
//! pass, not a proper interval colouring: with three levels, four notes packed
//! inside one window put the first and the fourth on the same level. Renderers
//! were tuned against this cycling, so it is kept as is.

use serde::Serialize;
use tracing::{instrument, trace};

use crate::record::ObservationRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Vertical offset of each level as a fraction of the axis height below
    /// the baseline, top level first.
    pub level_offsets: Vec<f64>,
    /// Notes closer than this many seconds to the previous one step down a level.
    pub collision_window_secs: f64,
    /// Column at which observation text is wrapped.
    pub wrap_width: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            level_offsets: vec![-0.15, -0.30, -0.45],
            collision_window_secs: 120.0,
            wrap_width: 30,
        }
    }
}

impl LayoutConfig {
    pub fn levels(&self) -> usize {
        self.level_offsets.len().max(1)
    }

    pub fn offset(&self, level: usize) -> f64 {
        self.level_offsets.get(level).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationEvent {
    pub time: f64,
    pub text: String,
    pub has_song: bool,
    pub assigned_level: usize,
}

/// One event per record carrying a song or an observation, in row order,
/// with levels assigned.
#[instrument(skip_all, fields(records = records.len()), level = "debug")]
pub fn layout(records: &[ObservationRecord], config: &LayoutConfig) -> Vec<AnnotationEvent> {
    let mut events = records
        .iter()
        .filter(|record| record.has_annotation())
        .map(|record| AnnotationEvent {
            time: record.time_of_day,
            text: render_text(
                record.song_label.as_deref(),
                record.free_text.as_deref(),
                config.wrap_width,
            ),
            has_song: record.song_label.is_some(),
            assigned_level: 0,
        })
        .collect::<Vec<_>>();

    assign_levels(&mut events, config);
    events
}

pub fn assign_levels(events: &mut [AnnotationEvent], config: &LayoutConfig) {
    let levels = config.levels();
    let mut level = 0;
    let mut previous_time: Option<f64> = None;

    for event in events.iter_mut() {
        if let Some(previous_time) = previous_time {
            let gap = event.time - previous_time;
            level = if gap < config.collision_window_secs {
                (level + 1) % levels
            } else {
                0
            };
        }
        trace!(time = event.time, level, "placed annotation");
        event.assigned_level = level;
        previous_time = Some(event.time);
    }
}

fn render_text(song: Option<&str>, free_text: Option<&str>, wrap_width: usize) -> String {
    let mut lines = Vec::new();
    if let Some(song) = song {
        lines.push(format!("♪ {song}"));
    }
    if let Some(free_text) = free_text {
        lines.extend(wrap(free_text, wrap_width));
    }
    lines.join("\n")
}

/// Greedy word wrap; words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines
}
