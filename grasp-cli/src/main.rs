//! CLI for two-contact planar grasps on bumped circular objects.
//!
//! Provides:
//! - Solving one sampled (or JSON-specified) problem, with a plottable trace file
//! - Parallel batch scoring over seeded problems of each shape family

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use grasp_core::{
    fmt::Fmt, parse_log_level, GraspConfig, GraspOptimizer, ProblemSampler, ProblemSpec, ShapeFamily, SolverConfig,
};
use log::{info, LevelFilter};

mod bench;
mod report;
mod trace;

const VERSION: &str = env!("GRASP_BUILD_SHA");

#[derive(Parser)]
#[command(name = "grasp", version = VERSION)]
#[command(about = "Two-contact grasp force optimizer", long_about = None)]
struct Cli {
    /// Log level (RUST_LOG overrides it)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SolverArgs {
    /// Convergence tolerance
    #[arg(long, default_value = "1e-6")]
    tol: f64,

    /// Maximum outer solver iterations
    #[arg(long, default_value = "1000")]
    max_iter: usize,

    /// Lower bound on each contact's normal force
    #[arg(long, default_value = "1e-3")]
    fn_min: f64,
}

impl SolverArgs {
    fn config(&self, derivative_test: bool) -> GraspConfig {
        GraspConfig {
            fn_min: self.fn_min,
            derivative_test,
            solver: SolverConfig { tol: self.tol, max_iter: self.max_iter, ..SolverConfig::default() },
            ..GraspConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one grasp problem and write its trace file
    Solve {
        /// Shape family: circle or patch
        #[arg(short, long)]
        shape: ShapeFamily,

        /// Seed for the problem sampler (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Problem to solve (JSON `ProblemSpec`) instead of a sampled one
        #[arg(short, long)]
        problem: Option<PathBuf>,

        /// Trace file
        #[arg(short, long, default_value = "problem.out")]
        output: PathBuf,

        /// Perimeter samples in the trace file
        #[arg(long, default_value = "1000")]
        samples: usize,

        /// Print a JSON report instead of the residual lines
        #[arg(long)]
        json: bool,

        /// Check the analytic derivatives before solving, and log at least at info level
        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Score the solver over seeded problems of every shape family
    ///
    /// Failures are counted separately for each family: patch points are graded on patch runs
    /// alone, not on circle and patch failures combined.
    Bench {
        /// Problems per family
        #[arg(short = 'n', long, default_value = "100")]
        trials: usize,

        /// Base seed; trial `n` uses `seed + n`
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Print a JSON report instead of per-run lines
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        solver: SolverArgs,
    },
}

fn load_problem(path: &Path) -> Result<ProblemSpec> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse problem {}", path.display()))
}

fn solve(
    family: ShapeFamily,
    seed: Option<u64>,
    problem: Option<PathBuf>,
    output: PathBuf,
    samples: usize,
    json: bool,
    config: GraspConfig,
) -> Result<()> {
    let spec = match problem {
        Some(path) => load_problem(&path)?,
        None => {
            let mut sampler = match seed {
                Some(seed) => ProblemSampler::new(seed),
                None => ProblemSampler::from_entropy(),
            };
            sampler.sample_spec()
        }
    };
    let spec = family.apply(spec);
    info!("Problem ({}): {}", family, serde_json::to_string(&spec)?);

    let shape = spec.build().context("Invalid problem")?;
    let solution = GraspOptimizer::new(config).solve(&shape).context("Solve failed")?;

    if json {
        let report = report::SolveReport {
            version: VERSION,
            family,
            problem: &spec,
            configuration: shape.configuration(),
            solution: &solution,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("F = {}", solution.equilibrium.force.s(5));
        println!("M = {:.5}", solution.equilibrium.moment);
    }
    if !solution.friction_satisfied {
        eprintln!("Solved forces are causing slippage!");
    }
    trace::write(&output, &shape, &solution, samples)?;
    info!("Wrote {}", output.display());
    Ok(())
}

fn bench(trials: usize, seed: u64, json: bool, config: GraspConfig) -> Result<()> {
    let families: Vec<bench::FamilyScore> = ShapeFamily::ALL
        .iter()
        .map(|&family| bench::score_family(&config, family, trials, seed))
        .collect();
    let total = families.iter().map(|f| f.points()).sum();
    if json {
        let report = report::BenchReport { version: VERSION, seed, families: &families, total };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for family in &families {
        for trial in &family.trials {
            println!("{}", trial);
        }
        for line in family.summary() {
            println!("{}", line);
        }
        println!();
    }
    println!("Total score = {}", total);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut level = parse_log_level(Some(&cli.log_level));
    if matches!(cli.command, Commands::Solve { verbose: true, .. }) {
        level = level.max(LevelFilter::Info);
    }
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Solve { shape, seed, problem, output, samples, json, verbose, solver } => {
            solve(shape, seed, problem, output, samples, json, solver.config(verbose))
        }
        Commands::Bench { trials, seed, json, solver } => bench(trials, seed, json, solver.config(false)),
    }
}
