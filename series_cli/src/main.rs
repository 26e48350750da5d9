use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::Parser;
use futures::StreamExt;
use series::{
    audit,
    batch::{self, BatchConfig, BatchSummary},
    expand::{ExpandConfig, DEFAULT_DURATION_SECS, DEFAULT_MAX_SAMPLES},
    layout::LayoutConfig,
    time_codec,
};
use tracing::{debug, info, warn};

#[derive(Debug, clap::Parser)]
#[command(version, about = "Dense 1-second agitation series from observation sheets")]
enum Command {
    /// Build time series (and annotation layouts) for observation sheets
    Build {
        /// Folders to search recursively, or individual sheets
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Seconds assumed for rows without a usable Duration_Seconds
        #[arg(long, env = "SERIES_DEFAULT_DURATION", default_value_t = DEFAULT_DURATION_SECS)]
        default_duration: f64,
        /// Files whose observations span more seconds than this are skipped
        #[arg(long, env = "SERIES_MAX_SAMPLES", default_value_t = DEFAULT_MAX_SAMPLES)]
        max_samples: usize,
        /// Day the Datetime column is anchored to, as YYYY-MM-DD
        #[arg(long, env = "SERIES_REFERENCE_DATE", value_parser = parse_date, default_value = "1900-01-01")]
        reference_date: time::Date,
        /// Notes closer than this many seconds step down a level
        #[arg(long, default_value_t = 120.0)]
        collision_window: f64,
        /// Column at which observation notes are wrapped
        #[arg(long, default_value_t = 30)]
        wrap_width: usize,
        /// Files processed at once
        #[arg(short, long, env = "SERIES_JOBS", default_value_t = 1)]
        jobs: usize,
        /// Skip the JSON annotation export
        #[arg(long)]
        no_annotations: bool,
    },
    /// Report songs that were logged without ratings, by session
    Audit {
        folder: PathBuf,
        /// Where to write the report (defaults to the folder)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn parse_date(text: &str) -> Result<time::Date, time::error::Parse> {
    time::Date::parse(
        text,
        time::macros::format_description!("[year]-[month]-[day]"),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::prelude::*;

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init()
    }

    match Command::parse() {
        Command::Build {
            paths,
            default_duration,
            max_samples,
            reference_date,
            collision_window,
            wrap_width,
            jobs,
            no_annotations,
        } => {
            if !(default_duration.is_finite() && default_duration > 0.0) {
                bail!("--default-duration must be a positive number of seconds");
            }
            let config = BatchConfig {
                expand: ExpandConfig {
                    default_duration_secs: default_duration,
                    max_samples,
                },
                layout: LayoutConfig {
                    collision_window_secs: collision_window,
                    wrap_width,
                    ..Default::default()
                },
                reference_date,
                write_annotations: !no_annotations,
            };
            build(&paths, config, jobs).await
        }
        Command::Audit { folder, report } => audit_folder(&folder, report),
    }
}

fn collect_inputs(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = batch::discover(path)
                .with_context(|| format!("failed to search {}", path.display()))?;
            debug!(path = %path.display(), found = found.len(), "discovered");
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            warn!(path = %path.display(), "no such file or folder");
        }
    }
    Ok(files)
}

async fn build(paths: &[PathBuf], config: BatchConfig, jobs: usize) -> anyhow::Result<()> {
    let files = collect_inputs(paths)?;
    if files.is_empty() {
        bail!(
            "no files ending with '{}' found",
            series::output::INPUT_MARKER
        );
    }
    info!(files = files.len(), jobs, "found observation files");

    let start = std::time::Instant::now();
    let summary = if jobs <= 1 {
        batch::run(&files, &config)
    } else {
        run_parallel(files, Arc::new(config), jobs).await
    };
    let elapsed = start.elapsed();
    info!(?elapsed, "completed batch");

    print_summary(&summary);
    Ok(())
}

/// One blocking worker per file, at most `jobs` at a time. Outcomes are
/// gathered in input order so the summary matches a sequential run.
async fn run_parallel(files: Vec<PathBuf>, config: Arc<BatchConfig>, jobs: usize) -> BatchSummary {
    let outcomes = futures::stream::iter(files)
        .map(|path| {
            let config = config.clone();
            async move {
                let worker_path = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    batch::process_file(&worker_path, &config)
                })
                .await;
                (path, outcome)
            }
        })
        .buffered(jobs)
        .collect::<Vec<_>>()
        .await;

    let mut summary = BatchSummary::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(outcome) => summary.record(&path, outcome),
            Err(error) => summary.skip(&path, format!("worker failed: {error}")),
        }
    }
    summary
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("{}", "=".repeat(50));
    for processed in &summary.processed {
        println!(
            "ok      {} -> {} ({} s, {} annotations, {} rows skipped)",
            processed.input.display(),
            processed.series_path.display(),
            processed.samples,
            processed.annotations,
            processed.skipped_rows,
        );
    }
    for skipped in &summary.skipped {
        println!("skipped {}: {}", skipped.input.display(), skipped.reason);
    }
    println!(
        "Processed {} file(s), skipped {}",
        summary.processed.len(),
        summary.skipped.len()
    );
}

fn audit_folder(folder: &Path, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    if !folder.is_dir() {
        bail!("{} is not a folder", folder.display());
    }
    let files = batch::discover(folder)
        .with_context(|| format!("failed to search {}", folder.display()))?;
    if files.is_empty() {
        bail!(
            "no files ending with '{}' found",
            series::output::INPUT_MARKER
        );
    }
    info!(files = files.len(), "auditing");

    let report = audit::run(&files);
    let now = time::OffsetDateTime::now_utc();
    let generated_at = time_codec::format_datetime(time::PrimitiveDateTime::new(
        now.date(),
        now.time(),
    ))?;
    let text = report.render(&format!("{generated_at} UTC"));

    let report_path = report_path.unwrap_or_else(|| folder.join(audit::REPORT_FILE_NAME));
    std::fs::write(&report_path, &text)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    println!("{text}");
    println!("Results saved to: {}", report_path.display());
    Ok(())
}
