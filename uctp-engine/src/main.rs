/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

use uctp_engine::config::{ConstraintMode, EngineConfig};
use uctp_engine::dataset::Dataset;
use uctp_engine::problem::Problem;
use uctp_engine::scheduler::{ScheduleOutcome, Statistics, TimetableScheduler};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Weekly course timetabling engine.
///
/// Example:
///   uctp-engine --dataset data/week.yaml --config engine.yaml \
///               --parallel --workers 4 --report out/report.yaml
#[derive(Debug, Parser)]
#[command(
    name = "uctp-engine",
    about = "Course timetabling – greedy construction with simulated-annealing refinement",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML dataset (sessions, rooms, preferences).
    #[arg(short = 'd', long = "dataset")]
    dataset: PathBuf,

    /// Path to the YAML engine configuration.  Defaults apply when absent.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Run the constructive pass on a worker pool.
    #[arg(short = 'p', long = "parallel", default_value_t = false)]
    parallel: bool,

    /// Worker count for --parallel (defaults to the hardware parallelism).
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Start directly in hard-constraint mode.
    #[arg(long = "hard", default_value_t = false)]
    hard: bool,

    /// Seed of the annealing RNG.
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Skip the annealing post-pass.
    #[arg(long = "no-anneal", default_value_t = false)]
    no_anneal: bool,

    /// Write the timetable and statistics to this YAML file.
    #[arg(short = 'r', long = "report")]
    report: Option<PathBuf>,
}

impl Cli {
    /// Flags given on the command line win over the configuration file.
    fn apply_overrides(&self, config: &mut EngineConfig) {
        if self.parallel {
            config.search.parallel = true;
        }
        if self.workers.is_some() {
            config.search.workers = self.workers;
        }
        if self.hard {
            config.search.mode = ConstraintMode::Hard;
        }
        if let Some(seed) = self.seed {
            config.annealing.seed = seed;
        }
        if self.no_anneal {
            config.annealing.enabled = false;
        }
    }
}

// ── Report file ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    session: &'a str,
    course: &'a str,
    class_group: &'a str,
    professor: &'a str,
    day: &'a str,
    periods: String,
    room: &'a str,
}

#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    timetable: Vec<ReportEntry<'a>>,
    statistics: &'a Statistics,
}

fn write_report(
    path: &Path,
    scheduler: &TimetableScheduler,
    problem: &Problem,
    outcome: &ScheduleOutcome,
) -> Result<()> {
    let periods = scheduler.periods();
    let mut bookings: Vec<_> = outcome.timetable.bookings().collect();
    bookings.sort_by_key(|b| (b.day, b.window.start, b.room));

    let timetable = bookings
        .into_iter()
        .map(|b| {
            let s = problem.session(b.session);
            ReportEntry {
                session: &s.id,
                course: &s.course_name,
                class_group: &s.class_group,
                professor: &s.professor_id,
                day: periods.day_name(b.day),
                periods: b.window.to_string(),
                room: &problem.room(b.room).id,
            }
        })
        .collect();
    let file = ReportFile {
        timetable,
        statistics: &outcome.statistics,
    };

    let yaml = serde_yaml::to_string(&file).context("Failed to serialise report")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Cannot write report file: {}", path.display()))?;
    info!("Report written to: {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => {
            warn!("No engine configuration file provided, using default settings");
            EngineConfig::default()
        }
    };
    cli.apply_overrides(&mut config);

    let scheduler = TimetableScheduler::new(config).context("Cannot start the engine")?;
    let effective = scheduler.config();
    info!(
        mode = %effective.search.mode,
        parallel = effective.search.parallel,
        annealing = effective.annealing.enabled,
        seed = effective.annealing.seed,
        "Effective engine settings"
    );

    // ── Input ─────────────────────────────────────────────────────────────────
    let dataset = Dataset::load_from_file(&cli.dataset)?;
    let problem = dataset
        .into_problem(scheduler.periods())
        .with_context(|| format!("Invalid dataset: {}", cli.dataset.display()))?;

    // ── Build ─────────────────────────────────────────────────────────────────
    let outcome = scheduler.build(&problem).context("Timetable build aborted")?;
    let stats = &outcome.statistics;

    info!(
        assigned = stats.assigned,
        unassigned = stats.unassigned,
        occupied_slots = stats.occupied_slots,
        mode = %stats.mode,
        fallback = stats.fallback_used,
        "Timetable summary"
    );
    for u in &stats.unassigned_sessions {
        warn!("  unassigned [{}] {} ({}): {}", u.session_id, u.course_name, u.class_group, u.reason);
    }
    if let Some(a) = &stats.annealing {
        info!(
            iterations = a.iterations,
            accepted = a.accepted,
            initial_score = a.initial_score,
            best_score = a.best_score,
            "Annealing summary"
        );
    }

    if let Some(path) = &cli.report {
        write_report(path, &scheduler, &problem, &outcome)?;
    }
    Ok(())
}

fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        dataset = %cli.dataset.display(),
        config = ?cli.config,
        parallel = cli.parallel,
        workers = ?cli.workers,
        seed = ?cli.seed,
        no_anneal = cli.no_anneal,
        "Configuration"
    );

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}
