//! pbgmres CLI tool.
//!
//! Solves a convection-diffusion system for a block of random right-hand
//! sides, then augments the block with more right-hand sides while keeping the
//! solved ones as a fixed prefix. The prefix must deflate without iterating.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pbgmres_core::{LinearOperator, MultiVector, gallery};
use pbgmres_solver::{
    LinearProblem, PseudoBlockGmresSolver, ResidualScaling, SolveReport, SolverConfig, Verbosity,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "pbgmres")]
#[command(about = "Pseudo-block GMRES with deflation of converged right-hand sides")]
#[command(version)]
struct Cli {
    /// Log solver progress and summaries
    #[arg(short, long)]
    verbose: bool,

    /// Log residual status every this many iterations (with --verbose)
    #[arg(long)]
    frequency: Option<usize>,

    /// Grid points per side of the test operator
    #[arg(long, default_value_t = 32)]
    grid: usize,

    /// Convection coefficient of the test operator
    #[arg(long, default_value_t = 10.0)]
    convection: f64,

    /// Relative residual tolerance of the initial solve
    #[arg(long, default_value_t = 1e-5)]
    tol: f64,

    /// Relative residual tolerance of the augmented solve
    #[arg(long, default_value_t = 1e-5)]
    aug_tol: f64,

    /// Number of right-hand sides in the initial solve
    #[arg(long, default_value_t = 5)]
    init_num_rhs: usize,

    /// Number of right-hand sides added for the augmented solve
    #[arg(long, default_value_t = 10)]
    aug_num_rhs: usize,

    /// Maximum restarts per block
    #[arg(long, default_value_t = 15)]
    max_restarts: usize,

    /// Block size of the initial solve
    #[arg(long, default_value_t = 5)]
    block_size: usize,

    /// Block size of the augmented solve
    #[arg(long, default_value_t = 3)]
    aug_block_size: usize,

    /// Maximum iterations per block (defaults to problem size - 1)
    #[arg(long)]
    max_iters: Option<usize>,

    /// Maximum Krylov basis length before a restart
    #[arg(long, default_value_t = 100)]
    subspace_size: usize,

    /// Seed for the random solutions
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SolveOutcome {
    report: SolveReport,
    actual_residuals: Vec<f64>,
    passed: bool,
}

#[derive(Serialize)]
struct RunSummary {
    dimension: usize,
    initial: SolveOutcome,
    augmented: SolveOutcome,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(true) => {
            if !cli.json {
                println!("End Result: TEST PASSED");
            }
            ExitCode::SUCCESS
        }
        Ok(false) => {
            if !cli.json {
                println!("End Result: TEST FAILED");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let op = gallery::convection_diffusion_2d(cli.grid, cli.grid, cli.convection)
        .context("building test operator")?;
    let n = op.dim();
    let mut rng = fastrand::Rng::with_seed(cli.seed);

    let verbosity = match (cli.verbose, cli.frequency) {
        (false, _) => Verbosity::Quiet,
        (true, None) => Verbosity::Summary,
        (true, Some(_)) => Verbosity::Details,
    };
    let mut base = SolverConfig::default()
        .with_num_blocks(cli.subspace_size)
        .with_max_restarts(cli.max_restarts)
        .with_verbosity(verbosity);
    base.max_iters = cli.max_iters;
    base.output_frequency = cli.frequency;

    if !cli.json {
        println!("Dimension of matrix: {}", n);
        println!("Number of right-hand sides: {}", cli.init_num_rhs);
        println!("Block size used by solver: {}", cli.block_size);
        println!("Max number of restarts allowed: {}", cli.max_restarts);
        println!(
            "Max number of iterations per restart cycle: {}",
            cli.subspace_size
        );
        println!("Relative residual tolerance: {}", cli.tol);
        println!();
    }

    // Initial solve
    let b_init = random_rhs(&op, cli.init_num_rhs, &mut rng);
    let x_init = MultiVector::zeros(n, cli.init_num_rhs);
    let mut initial = LinearProblem::new(&op, x_init, b_init.clone());
    let config = base
        .clone()
        .with_block_size(cli.block_size)
        .with_deflation_quorum(cli.block_size)
        .with_tolerance(cli.tol);
    let initial_outcome = solve(&mut initial, config, cli.tol).context("initial solve")?;
    if !cli.json {
        print_outcome("Initial", &initial_outcome);
    }

    // Augmented solve with the solved columns as prefix
    let total = cli.init_num_rhs + cli.aug_num_rhs;
    let b_new = random_rhs(&op, cli.aug_num_rhs, &mut rng);
    let mut b_aug = MultiVector::zeros(n, total);
    b_aug.set_columns(0, &b_init)?;
    b_aug.set_columns(cli.init_num_rhs, &b_new)?;
    let mut x_aug = MultiVector::zeros(n, total);
    x_aug.set_columns(0, initial.lhs())?;

    let mut augmented = LinearProblem::new(&op, x_aug, b_aug);
    let config = base
        .with_block_size(cli.aug_block_size)
        .with_deflation_quorum(cli.aug_block_size)
        .with_tolerance(cli.aug_tol)
        .with_scaling(ResidualScaling::NormOfRhs);
    let augmented_outcome =
        solve(&mut augmented, config, cli.aug_tol).context("augmented solve")?;
    if !cli.json {
        print_outcome("Augmented", &augmented_outcome);
    }

    let passed = initial_outcome.passed && augmented_outcome.passed;
    if cli.json {
        let summary = RunSummary {
            dimension: n,
            initial: initial_outcome,
            augmented: augmented_outcome,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(passed)
}

/// `B = A X` for random `X` with entries in [-1, 1].
fn random_rhs(op: &dyn LinearOperator, num_rhs: usize, rng: &mut fastrand::Rng) -> MultiVector {
    let x = MultiVector::random(op.dim(), num_rhs, rng);
    let mut b = MultiVector::zeros(op.dim(), num_rhs);
    op.apply_block(&x, &mut b);
    b
}

fn solve(problem: &mut LinearProblem<'_>, config: SolverConfig, tol: f64) -> Result<SolveOutcome> {
    let report = PseudoBlockGmresSolver::new(problem, config)?.solve()?;

    let rhs_norms = problem.space().norms(problem.rhs());
    let actual_residuals: Vec<f64> = problem
        .residual_norms()?
        .into_iter()
        .zip(rhs_norms)
        .map(|(r, b)| if b > 0.0 { r / b } else { r })
        .collect();
    let passed = report.converged() && actual_residuals.iter().all(|&r| r <= tol);

    Ok(SolveOutcome {
        report,
        actual_residuals,
        passed,
    })
}

fn print_outcome(label: &str, outcome: &SolveOutcome) {
    println!("{} solve: {}", label, outcome.report);
    println!("---------- Actual Residuals (normalized) ----------");
    for (i, r) in outcome.actual_residuals.iter().enumerate() {
        let iterations = outcome.report.column_iterations[i];
        println!("Problem {:>3} : {:.6e}  ({} iterations)", i, r, iterations);
    }
    println!();
}
