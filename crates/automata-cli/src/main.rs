//! Benchmark/demo entrypoint for the parallel cellular-automata engine.
//!
//! Deliberately thin: the engine crates own every correctness-relevant
//! behavior described in the specification. This binary only parses
//! arguments, wires up logging, builds an [`automata_core::Engine`], drives
//! `run` `num_runs` times, and reports timing (min/mean/max and, relative to
//! a single-worker baseline, speed-up/efficiency) plus, unless `--quiet`,
//! the final grid. It is the "external collaborator" the core explicitly
//! treats as out of scope.

use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use automata_core::config::{load_from, EngineConfig};
use automata_core::{Engine, EngineKind};
use automata_rule::{Identity, Life, Parity, Rule, Seeds};

/// `height width num_workers num_steps [num_runs]`, plus flags for the
/// knobs the specification leaves to the CLI: which rule, which engine,
/// whether to print the final grid, and a reproducible seed.
#[derive(Parser, Debug)]
#[command(name = "automata", version, about = "Parallel cellular-automata benchmark driver")]
struct Args {
    /// Grid height (rows).
    height: usize,
    /// Grid width (columns).
    width: usize,
    /// Number of worker threads. `1` always takes the sequential fast path.
    num_workers: usize,
    /// Number of synchronous steps to evolve.
    num_steps: usize,
    /// Number of times to repeat the run, each against a fresh grid. Timings
    /// are aggregated across runs; defaults to a single run.
    num_runs: Option<usize>,

    /// Local transition rule to evolve under.
    #[arg(long, value_enum, default_value_t = RuleArg::Life)]
    rule: RuleArg,

    /// Which parallel step engine to use. Defaults to the config file's
    /// choice, or the halo engine if neither a flag nor a config file says
    /// otherwise. Degenerates to the shared engine automatically when there
    /// is no useful halo to exchange (see `Engine::build`).
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,

    /// Seed the initial grid for reproducible runs; omit for OS entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the final-grid dump after each run; timing is always printed.
    #[arg(long)]
    quiet: bool,

    /// Path to a config file overriding discovery of `oxidized-automata.toml`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuleArg {
    Life,
    Identity,
    Seeds,
    Parity,
}

impl RuleArg {
    fn build(self) -> Box<dyn Rule> {
        match self {
            RuleArg::Life => Box::new(Life),
            RuleArg::Identity => Box::new(Identity),
            RuleArg::Seeds => Box::new(Seeds),
            RuleArg::Parity => Box::new(Parity),
        }
    }
}

/// Mirrors [`EngineKind`] as a `clap`-facing enum; `automata-core` has no
/// reason to depend on `clap` just so its config enum doubles as a CLI flag.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Shared,
    Halo,
}

impl From<EngineArg> for EngineKind {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Shared => EngineKind::Shared,
            EngineArg::Halo => EngineKind::Halo,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    if args.height == 0 || args.width == 0 || args.num_workers == 0 {
        bail!("height, width, and num_workers must all be positive");
    }
    let runs = args.num_runs.unwrap_or(1);
    if runs == 0 {
        bail!("num_runs must be positive when given");
    }

    info!(
        target: "cli",
        height = args.height,
        width = args.width,
        workers = args.num_workers,
        steps = args.num_steps,
        runs,
        rule = ?args.rule,
        "run_start"
    );

    let config_file = load_from(args.config.clone());
    let resolved = EngineConfig::resolve(
        &config_file,
        args.num_workers,
        Some(args.num_workers),
        args.seed,
        args.engine.map(EngineKind::from),
    );

    let mut timings = Vec::with_capacity(runs);
    let mut last_engine_kind = resolved.kind;
    for run_idx in 0..runs {
        let rule = args.rule.build();
        let mut engine = match resolved.seed {
            Some(seed) => Engine::new_seeded(
                args.height,
                args.width,
                resolved.workers,
                seed.wrapping_add(run_idx as u64),
                rule,
                resolved.kind,
            )?,
            None => Engine::new(args.height, args.width, resolved.workers, rule, resolved.kind)?,
        };

        let elapsed_ms = engine.run(args.num_steps)?;
        last_engine_kind = engine.kind();
        timings.push(elapsed_ms);
        info!(
            target: "cli",
            run = run_idx,
            engine = ?engine.kind(),
            elapsed_ms,
            "run_complete"
        );

        if !args.quiet {
            engine.print();
        }
    }

    report_timings(&timings, last_engine_kind, resolved.workers);

    if resolved.workers > 1 {
        if let Some(baseline) = sequential_baseline(&args, &resolved)? {
            report_speedup(&timings, baseline, resolved.workers);
        }
    }

    Ok(())
}

/// One single-worker run of the same shape/steps/rule/seed, used as the
/// denominator for speed-up and parallel efficiency. `None` when no seed was
/// given, since an unseeded baseline would compare against a different
/// initial grid and the ratio would be meaningless.
fn sequential_baseline(args: &Args, resolved: &EngineConfig) -> Result<Option<f64>> {
    let Some(seed) = resolved.seed else {
        return Ok(None);
    };
    let rule = args.rule.build();
    let mut baseline = Engine::new_seeded(
        args.height,
        args.width,
        1,
        seed,
        rule,
        EngineKind::Shared,
    )?;
    Ok(Some(baseline.run(args.num_steps)?))
}

fn report_timings(timings: &[f64], kind: EngineKind, workers: usize) {
    let min = timings.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = timings.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = timings.iter().sum::<f64>() / timings.len() as f64;
    println!(
        "engine={kind:?} workers={workers} runs={} elapsed_ms(min/mean/max)={min:.3}/{mean:.3}/{max:.3}",
        timings.len()
    );
}

fn report_speedup(timings: &[f64], baseline_ms: f64, workers: usize) {
    let mean = timings.iter().sum::<f64>() / timings.len() as f64;
    if mean <= 0.0 {
        return;
    }
    let speedup = baseline_ms / mean;
    let efficiency = speedup / workers as f64;
    println!("speedup={speedup:.3}x efficiency={:.1}%", efficiency * 100.0);
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("automata.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "automata.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => {
            warn!(target: "cli", "tracing_subscriber_already_installed");
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "cli.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}
