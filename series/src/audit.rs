//! Finds songs that were logged during a session but never rated.
//!
//! Raters sometimes note which song was playing and move on without filling
//! in the four scale columns. The audit walks the observation sheets, groups
//! unrated songs by recording session (taken from the folder name, e.g.
//! `August 5 Morning AN 000133`) and reports how complete each session is.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::Result,
    source::{cell, Sheet},
    RATING_COLUMNS,
};

pub const REPORT_FILE_NAME: &str = "song_score_analysis_by_session.txt";

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const PERIODS: [&str; 4] = ["morning", "afternoon", "evening", "night"];

const DASHES: [char; 4] = ['-', '—', '–', '−'];

static SESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d+\s+(?:Morning|Afternoon|Evening|Night))",
    )
    .expect("static pattern")
});

static PATIENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]{1,2}\s+\d{6})").expect("static pattern"));

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static pattern"));

/// Dash-only placeholders (`—`, `--`, ...) mean "no song".
pub fn is_valid_song(entry: &str) -> bool {
    entry
        .chars()
        .any(|c| !c.is_whitespace() && !DASHES.contains(&c))
}

/// Collapses spelling variants of the same song: quotes and repeated spaces
/// go, and so does any artist after ` - ` or ` by `.
pub fn normalize_song(entry: &str) -> String {
    let unquoted = entry.replace(['"', '“', '”'], "");
    let mut normalized = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some((title, _)) = normalized.split_once(" - ") {
        normalized = title.trim().to_string();
    }
    if let Some(index) = normalized.to_ascii_lowercase().find(" by ") {
        normalized = normalized[..index].trim().to_string();
    }

    normalized
}

/// `Month day Period` out of a folder name, or the whole name.
pub fn session_of(folder: &str) -> String {
    SESSION
        .captures(folder)
        .map(|captures| captures[1].to_string())
        .unwrap_or_else(|| folder.to_string())
}

/// Participant code like `AN 000133`, falling back to the last two words.
pub fn patient_of(folder: &str) -> String {
    if let Some(captures) = PATIENT.captures(folder) {
        return captures[1].to_string();
    }
    let words = folder.split_whitespace().collect::<Vec<_>>();
    match words.len() {
        0 | 1 => folder.to_string(),
        len => words[len - 2..].join(" "),
    }
}

/// Chronological order: month, day, then morning before night. Sessions that
/// don't name a month sort last.
fn session_order(session: &str) -> (usize, u32, usize) {
    let lower = session.to_lowercase();
    let Some(month) = MONTHS.iter().position(|month| lower.contains(month)) else {
        return (MONTHS.len(), 0, 0);
    };
    let day = FIRST_NUMBER
        .find(&lower)
        .and_then(|day| day.as_str().parse().ok())
        .unwrap_or(0);
    let period = PERIODS
        .iter()
        .position(|period| lower.contains(period))
        .unwrap_or(0);
    (month, day, period)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingScore {
    /// Raw content of the time column, when the sheet has one.
    pub time: Option<String>,
    pub song: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAudit {
    pub session: String,
    pub patient: String,
    pub scored: usize,
    pub missing: Vec<MissingScore>,
    /// Song cells holding only a placeholder.
    pub skipped_entries: usize,
}

/// `None` when the sheet has no song column or no real song entries.
pub fn audit_sheet(sheet: &Sheet, folder: &str) -> Option<FileAudit> {
    let Some(song_column) = sheet.column_containing(&["song", "music"]) else {
        warn!(folder, "no song column");
        return None;
    };
    let time_column = sheet.column_containing(&["date", "day", "time"]);
    let rating_columns = RATING_COLUMNS.map(|name| sheet.column(name));
    if rating_columns.iter().all(Option::is_none) {
        warn!(folder, "no rating columns, every song counts as unrated");
    }

    let mut scored = 0;
    let mut missing = Vec::new();
    let mut skipped_entries = 0;

    for row in sheet.rows() {
        let Some(song) = cell(row, Some(song_column)) else {
            continue;
        };
        if !is_valid_song(song) {
            skipped_entries += 1;
            continue;
        }

        let rated = rating_columns
            .iter()
            .all(|&column| column.is_some() && cell(row, column).is_some());
        if rated {
            scored += 1;
        } else {
            missing.push(MissingScore {
                time: cell(row, time_column).map(str::to_string),
                song: normalize_song(song),
            });
        }
    }

    if scored == 0 && missing.is_empty() {
        info!(folder, "no valid song entries");
        return None;
    }

    Some(FileAudit {
        session: session_of(folder),
        patient: patient_of(folder),
        scored,
        missing,
        skipped_entries,
    })
}

#[instrument(level = "debug")]
pub fn audit_file(path: &Path) -> Result<Option<FileAudit>> {
    let sheet = Sheet::open(path)?;
    let folder = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let audit = audit_sheet(&sheet, &folder);
    if let Some(audit) = &audit {
        debug!(
            scored = audit.scored,
            missing = audit.missing.len(),
            skipped = audit.skipped_entries,
            "audited"
        );
    }
    Ok(audit)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAudit {
    pub patients: BTreeSet<String>,
    pub missing_by_time: BTreeMap<String, BTreeSet<String>>,
    pub all_missing: BTreeSet<String>,
    pub scored: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub sessions: BTreeMap<String, SessionAudit>,
    pub skipped_entries: usize,
}

impl AuditReport {
    pub fn add(&mut self, audit: FileAudit) {
        self.skipped_entries += audit.skipped_entries;

        let session = self.sessions.entry(audit.session).or_default();
        session.patients.insert(audit.patient);
        session.scored += audit.scored;
        session.missing += audit.missing.len();
        for MissingScore { time, song } in audit.missing {
            if let Some(time) = time {
                session
                    .missing_by_time
                    .entry(time)
                    .or_default()
                    .insert(song.clone());
            }
            session.all_missing.insert(song);
        }
    }

    /// Sessions in calendar order.
    pub fn ordered(&self) -> Vec<(&str, &SessionAudit)> {
        let mut sessions = self
            .sessions
            .iter()
            .map(|(name, session)| (name.as_str(), session))
            .collect::<Vec<_>>();
        sessions.sort_by_key(|(name, _)| session_order(name));
        sessions
    }

    pub fn scored(&self) -> usize {
        self.sessions.values().map(|session| session.scored).sum()
    }

    pub fn missing(&self) -> usize {
        self.sessions.values().map(|session| session.missing).sum()
    }

    pub fn render(&self, generated_at: &str) -> String {
        Rendered {
            report: self,
            generated_at,
        }
        .to_string()
    }
}

fn completion(scored: usize, missing: usize) -> Option<f64> {
    let total = scored + missing;
    (total > 0).then(|| scored as f64 / total as f64 * 100.0)
}

struct Rendered<'a> {
    report: &'a AuditReport,
    generated_at: &'a str,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(40);
        let sessions = self.report.ordered();

        writeln!(f, "SONG SCORE ANALYSIS RESULTS (BY SESSION)")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Analysis Date: {}", self.generated_at)?;
        writeln!(f, "Note: Results aggregated by session (date/time)")?;
        writeln!(f, "Note: Entries with '—' or dashes were skipped")?;
        writeln!(f)?;
        writeln!(f, "SONGS WITH MISSING SCORES BY SESSION")?;
        writeln!(f, "{rule}")?;

        for (name, session) in &sessions {
            if session.all_missing.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "Session: {name}")?;
            writeln!(f, "Participants: {}", join(&session.patients))?;
            if session.missing_by_time.is_empty() {
                writeln!(f, "  Songs missing scores:")?;
                for song in &session.all_missing {
                    writeln!(f, "    • {song}")?;
                }
            } else {
                for (time, songs) in &session.missing_by_time {
                    writeln!(f, "  Time: {time}")?;
                    for song in songs {
                        writeln!(f, "    • {song}")?;
                    }
                }
            }
        }

        writeln!(f)?;
        writeln!(f)?;
        writeln!(f, "SESSION SUMMARY")?;
        writeln!(f, "{rule}")?;
        for (name, session) in &sessions {
            writeln!(f)?;
            writeln!(f, "{name}")?;
            writeln!(
                f,
                "  Participants: {} ({})",
                session.patients.len(),
                join(&session.patients)
            )?;
            writeln!(f, "  Songs with scores: {}", session.scored)?;
            writeln!(f, "  Songs without scores: {}", session.missing)?;
            writeln!(
                f,
                "  Unique songs missing scores: {}",
                session.all_missing.len()
            )?;
            if let Some(rate) = completion(session.scored, session.missing) {
                writeln!(f, "  Completion rate: {rate:.1}%")?;
            }
        }

        let (scored, missing) = (self.report.scored(), self.report.missing());
        writeln!(f)?;
        writeln!(f)?;
        writeln!(f, "TOTAL SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total sessions analyzed: {}", sessions.len())?;
        writeln!(f, "Total valid songs with scores: {scored}")?;
        writeln!(f, "Total valid songs without scores: {missing}")?;
        writeln!(
            f,
            "Total non-song entries skipped: {}",
            self.report.skipped_entries
        )?;
        if let Some(rate) = completion(scored, missing) {
            writeln!(f, "Overall completion rate: {rate:.1}%")?;
        }
        Ok(())
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Audits every file; unreadable ones are logged and left out.
pub fn run(files: &[PathBuf]) -> AuditReport {
    let mut report = AuditReport::default();
    for path in files {
        match audit_file(path) {
            Ok(Some(audit)) => report.add(audit),
            Ok(None) => {}
            Err(error) => warn!(path = %path.display(), %error, "skipping file"),
        }
    }
    info!(
        sessions = report.sessions.len(),
        scored = report.scored(),
        missing = report.missing(),
        skipped_entries = report.skipped_entries,
        "audit complete"
    );
    report
}
