//! PlanLab CLI — config validation, one-shot planning, and the foreground
//! scheduler.
//!
//! Commands:
//! - `validate` — gate-check a TOML config file and report every violation
//! - `plan` — run one planning pass and print the beam
//! - `run` — run the incremental scheduler in the foreground

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use planlab_core::config::{PlannerConfig, RawPlannerConfig};
use planlab_core::domain::PortfolioState;
use planlab_runner::{
    export_csv, run_pass, spawn_scheduler, BeamEntry, JsonFileStore, MemoryStore, PassOutcome,
    PlannerSnapshot, RecommendationHistory, SequenceStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "planlab", about = "PlanLab CLI — trade-sequence planning engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gate-check a TOML config file and report every violation.
    Validate {
        /// Path to the TOML config file.
        config: PathBuf,
    },
    /// Run one planning pass and print the resulting beam.
    Plan {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the portfolio snapshot (JSON).
        #[arg(long)]
        portfolio: PathBuf,

        /// Store directory for sequences and evaluations. In-memory when omitted.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Write the beam as CSV to this path.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run the incremental scheduler in the foreground, printing each cycle.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the portfolio snapshot (JSON).
        #[arg(long)]
        portfolio: PathBuf,

        /// Store directory for sequences and evaluations.
        #[arg(long, default_value = "planlab-store")]
        store_dir: PathBuf,

        /// Recommendation history log. Defaults to <store_dir>/history.jsonl.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Stop after this many cycles (runs until interrupted when omitted).
        #[arg(long)]
        cycles: Option<u64>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => run_validate(&config),
        Commands::Plan {
            config,
            portfolio,
            store_dir,
            export,
        } => run_plan(config, &portfolio, store_dir, export),
        Commands::Run {
            config,
            portfolio,
            store_dir,
            history,
            cycles,
        } => run_scheduler_cmd(config, &portfolio, store_dir, history, cycles),
    }
}

fn run_validate(path: &Path) -> Result<()> {
    let raw = load_raw_config(path)?;
    let errors = raw.full_validate();

    if errors.is_empty() {
        println!("OK: {}", path.display());
        return Ok(());
    }

    eprintln!("{} validation error(s) in {}:", errors.len(), path.display());
    for error in errors.iter() {
        eprintln!("  {}: {}", error.field, error.message);
    }
    std::process::exit(1);
}

fn run_plan(
    config_path: Option<PathBuf>,
    portfolio_path: &Path,
    store_dir: Option<PathBuf>,
    export: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let portfolio = load_portfolio(portfolio_path)?;

    let store: Box<dyn SequenceStore> = match &store_dir {
        Some(dir) => Box::new(JsonFileStore::new(dir)?),
        None => Box::new(MemoryStore::new()),
    };

    let outcome = run_pass(store.as_ref(), &portfolio, &config, None, None)?;
    print_outcome(&outcome);

    if let Some(path) = export {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        export_csv(&outcome.beam, file)?;
        println!("Beam exported to: {}", path.display());
    }

    Ok(())
}

fn run_scheduler_cmd(
    config_path: Option<PathBuf>,
    portfolio_path: &Path,
    store_dir: PathBuf,
    history_path: Option<PathBuf>,
    cycles: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    if !config.incremental_planner_enabled {
        bail!("incremental_planner_enabled is false; use `planlab plan` for a one-shot pass");
    }
    let portfolio = load_portfolio(portfolio_path)?;

    let store = Arc::new(JsonFileStore::new(&store_dir)?);
    let history_path = history_path.unwrap_or_else(|| store_dir.join("history.jsonl"));
    let history = RecommendationHistory::new(&history_path);

    println!("Store:    {}", store_dir.display());
    println!("History:  {}", history_path.display());
    println!("Interval: {}s", config.scheduler_interval_secs);

    let handle = spawn_scheduler(store, portfolio, config, Some(history));
    handle.run_cycle()?;

    let mut seen = 0u64;
    loop {
        std::thread::sleep(Duration::from_millis(500));
        let snapshot = handle.snapshot();
        if snapshot.cycle > seen {
            seen = snapshot.cycle;
            print_cycle(&snapshot);
            match cycles {
                Some(limit) if seen >= limit => break,
                // Drive the next cycle immediately when a limit is set.
                Some(_) => handle.run_cycle()?,
                None => {}
            }
        }
    }

    handle.shutdown();
    Ok(())
}

// ─── Loading ────────────────────────────────────────────────────────

fn load_raw_config(path: &Path) -> Result<RawPlannerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    RawPlannerConfig::from_toml_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<PlannerConfig> {
    let raw = match path {
        Some(path) => load_raw_config(path)?,
        None => RawPlannerConfig::default(),
    };
    raw.validate().context("configuration rejected by the gate")
}

fn load_portfolio(path: &Path) -> Result<PortfolioState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read portfolio file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse portfolio file {}", path.display()))
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_outcome(outcome: &PassOutcome) {
    println!();
    println!("=== Planning Pass ===");
    println!("Generated:      {}", outcome.generated);
    println!("Reused:         {}", outcome.reused);
    println!("Evaluated:      {}", outcome.evaluated);
    println!("Infeasible:     {}", outcome.dropped_infeasible);
    println!("Elapsed:        {:.2}s", outcome.elapsed_secs);
    println!();
    print_beam(&outcome.beam);
}

fn print_cycle(snapshot: &PlannerSnapshot) {
    println!();
    println!("=== Cycle {} ===", snapshot.cycle);
    if let Some(stats) = &snapshot.last_cycle {
        println!(
            "Generated: {}  Reused: {}  Evaluated: {}  Infeasible: {}  ({:.2}s)",
            stats.generated, stats.reused, stats.evaluated, stats.dropped_infeasible,
            stats.elapsed_secs
        );
    }
    print_beam(&snapshot.beam);
}

fn print_beam(beam: &[BeamEntry]) {
    if beam.is_empty() {
        println!("No feasible sequences.");
        return;
    }
    println!("--- Beam ---");
    for entry in beam {
        println!(
            "#{:<3} {:>9.4}  depth {}  [{}]",
            entry.rank,
            entry.composite,
            entry.depth,
            entry.fingerprint.short()
        );
        for step in &entry.steps {
            println!("      {step}");
        }
    }
    println!();
}
