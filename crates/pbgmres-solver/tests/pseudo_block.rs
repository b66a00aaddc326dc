//! End-to-end tests for the pseudo-block GMRES solver.

use pbgmres_core::{LinearOperator, MultiVector, SparseOperator, gallery};
use pbgmres_solver::{
    DeflationEvent, IterationInfo, LinearProblem, PseudoBlockGmresSolver, ResidualScaling,
    ReturnType, SolveObserver, SolveReport, SolverConfig, SolverError, Termination, Verbosity,
};

/// `B = A X` for a seeded random `X`.
fn random_rhs(op: &dyn LinearOperator, num_rhs: usize, seed: u64) -> MultiVector {
    let mut rng = fastrand::Rng::with_seed(seed);
    let x = MultiVector::random(op.dim(), num_rhs, &mut rng);
    let mut b = MultiVector::zeros(op.dim(), num_rhs);
    op.apply_block(&x, &mut b);
    b
}

/// `‖b_j - A x_j‖ / ‖b_j‖` computed without the solver.
fn relative_residuals(op: &dyn LinearOperator, x: &MultiVector, b: &MultiVector) -> Vec<f64> {
    let norm = |v: &[f64]| v.iter().map(|a| a * a).sum::<f64>().sqrt();
    let mut ax = vec![0.0; op.dim()];
    (0..b.num_vectors())
        .map(|j| {
            op.apply(x.column(j), &mut ax);
            let r: Vec<f64> = b.column(j).iter().zip(&ax).map(|(bi, ai)| bi - ai).collect();
            norm(&r) / norm(b.column(j))
        })
        .collect()
}

/// `diag(1..=n)` with `b_j = e_0 + ... + e_j`, so column `j` converges at
/// iteration `j + 1`.
fn staggered_problem(n: usize) -> (SparseOperator, MultiVector) {
    let diag: Vec<f64> = (1..=n).map(|i| i as f64).collect();
    let op = gallery::diagonal(&diag).unwrap();
    let cols: Vec<Vec<f64>> = (0..n)
        .map(|j| (0..n).map(|i| if i <= j { 1.0 } else { 0.0 }).collect())
        .collect();
    let b = MultiVector::from_columns(n, &cols).unwrap();
    (op, b)
}

#[derive(Default)]
struct Recorder {
    iterations: Vec<IterationInfo>,
    converged: Vec<(usize, Vec<f64>)>,
    deflations: Vec<DeflationEvent>,
    restarts: usize,
    non_monotone: usize,
    last_implicit: std::collections::HashMap<usize, f64>,
}

impl SolveObserver for Recorder {
    fn on_iteration(&mut self, info: &IterationInfo) {
        for &(column, residual) in &info.implicit_residuals {
            if let Some(&previous) = self.last_implicit.get(&column) {
                if residual > previous * (1.0 + 1e-12) {
                    self.non_monotone += 1;
                }
            }
            self.last_implicit.insert(column, residual);
        }
        self.iterations.push(info.clone());
    }

    fn on_converged(&mut self, column: usize, solution: &[f64]) {
        self.converged.push((column, solution.to_vec()));
    }

    fn on_deflation(&mut self, event: &DeflationEvent) {
        self.deflations.push(event.clone());
    }

    fn on_restart(&mut self, _restart: usize) {
        self.restarts += 1;
        self.last_implicit.clear();
    }
}

#[test]
fn initial_then_augmented_solve() {
    let op = gallery::convection_diffusion_2d(16, 16, 10.0).unwrap();
    let n = op.dim();
    let tol = 1e-5;

    // Initial solve: 5 right-hand sides in one block
    let b_init = random_rhs(&op, 5, 42);
    let mut initial = LinearProblem::new(&op, MultiVector::zeros(n, 5), b_init.clone());
    let config = SolverConfig::default()
        .with_num_blocks(100)
        .with_block_size(5)
        .with_deflation_quorum(5)
        .with_max_restarts(15)
        .with_tolerance(tol);
    let report = PseudoBlockGmresSolver::new(&mut initial, config.clone())
        .unwrap()
        .solve()
        .unwrap();

    assert_eq!(report.status, ReturnType::Converged, "{report}");
    let x_init = initial.lhs().clone();
    for r in relative_residuals(&op, &x_init, &b_init) {
        assert!(r <= tol * (1.0 + 1e-10), "initial residual {r}");
    }
    assert_eq!(report.deflations.len(), 1);

    // Augmented solve: the solved columns become a fixed prefix
    let b_new = random_rhs(&op, 10, 7);
    let mut b_aug = MultiVector::zeros(n, 15);
    b_aug.set_columns(0, &b_init).unwrap();
    b_aug.set_columns(5, &b_new).unwrap();
    let mut x_aug = MultiVector::zeros(n, 15);
    x_aug.set_columns(0, &x_init).unwrap();

    let mut augmented = LinearProblem::new(&op, x_aug, b_aug.clone());
    let aug_config = config
        .with_block_size(3)
        .with_deflation_quorum(3)
        .with_scaling(ResidualScaling::NormOfRhs);
    let report = PseudoBlockGmresSolver::new(&mut augmented, aug_config)
        .unwrap()
        .solve()
        .unwrap();

    assert_eq!(report.status, ReturnType::Converged, "{report}");
    assert_eq!(report.blocks, 5);
    for r in relative_residuals(&op, augmented.lhs(), &b_aug) {
        assert!(r <= tol * (1.0 + 1e-10), "augmented residual {r}");
    }
    for j in 0..5 {
        assert_eq!(augmented.lhs().column(j), x_init.column(j));
        assert_eq!(report.column_iterations[j], 0);
    }
    assert!(report.column_iterations[5..].iter().all(|&k| k > 0));

    // The first block is entirely prefix and deflates before any iteration
    assert_eq!(
        report.deflations[0],
        DeflationEvent {
            iteration: 0,
            columns: vec![0, 1, 2]
        }
    );
}

#[test]
fn quorum_one_deflates_each_column_on_convergence() {
    let (op, b) = staggered_problem(4);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(4, 4), b);
    let config = SolverConfig::default()
        .with_block_size(4)
        .with_deflation_quorum(1)
        .with_max_iters(10)
        .with_tolerance(1e-10);

    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    assert!(report.converged());
    assert_eq!(report.column_iterations, vec![1, 2, 3, 4]);
    let expected: Vec<DeflationEvent> = (0..4)
        .map(|j| DeflationEvent {
            iteration: j + 1,
            columns: vec![j],
        })
        .collect();
    assert_eq!(report.deflations, expected);
}

#[test]
fn quorum_block_size_defers_deflation_to_last_convergence() {
    let (op, b) = staggered_problem(4);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(4, 4), b);
    let config = SolverConfig::default()
        .with_block_size(4)
        .with_deflation_quorum(4)
        .with_max_iters(10)
        .with_tolerance(1e-10);

    let mut recorder = Recorder::default();
    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve_with_observer(&mut recorder)
        .unwrap();

    assert!(report.converged());
    assert_eq!(
        report.deflations,
        vec![DeflationEvent {
            iteration: 4,
            columns: vec![0, 1, 2, 3]
        }]
    );
    assert_eq!(recorder.deflations, report.deflations);

    // Masked columns stay in the working block but stop iterating
    let widths: Vec<(usize, usize)> = recorder
        .iterations
        .iter()
        .map(|info| (info.block_width, info.working_width))
        .collect();
    assert_eq!(widths, vec![(3, 4), (2, 4), (1, 4), (0, 4)]);
}

#[test]
fn intermediate_quorum_batches_deflations() {
    let (op, b) = staggered_problem(4);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(4, 4), b);
    let config = SolverConfig::default()
        .with_block_size(4)
        .with_deflation_quorum(2)
        .with_max_iters(10)
        .with_tolerance(1e-10);

    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    let batches: Vec<(usize, Vec<usize>)> = report
        .deflations
        .iter()
        .map(|e| (e.iteration, e.columns.clone()))
        .collect();
    assert_eq!(batches, vec![(2, vec![0, 1]), (4, vec![2, 3])]);
}

#[test]
fn converged_columns_stay_frozen() {
    let op = gallery::convection_diffusion_2d(12, 12, 25.0).unwrap();
    let n = op.dim();
    let b = random_rhs(&op, 4, 3);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(n, 4), b);
    let config = SolverConfig::default()
        .with_block_size(4)
        .with_deflation_quorum(4)
        .with_num_blocks(30)
        .with_max_restarts(50)
        .with_max_iters(1000)
        .with_tolerance(1e-7);

    let mut recorder = Recorder::default();
    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve_with_observer(&mut recorder)
        .unwrap();

    assert!(report.converged(), "{report}");
    assert_eq!(recorder.converged.len(), 4);
    for (column, snapshot) in &recorder.converged {
        assert_eq!(problem.lhs().column(*column), snapshot.as_slice());
    }
}

#[test]
fn subspace_never_exceeds_bound() {
    let op = gallery::convection_diffusion_2d(10, 10, 5.0).unwrap();
    let n = op.dim();
    let num_blocks = 10;
    let b = random_rhs(&op, 3, 11);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(n, 3), b);
    let config = SolverConfig::default()
        .with_block_size(3)
        .with_num_blocks(num_blocks)
        .with_max_restarts(1000)
        .with_max_iters(3000)
        .with_tolerance(1e-6);

    let mut recorder = Recorder::default();
    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve_with_observer(&mut recorder)
        .unwrap();

    assert!(report.converged(), "{report}");
    assert!(recorder.restarts > 0);
    assert_eq!(recorder.restarts, report.restarts);
    for info in &recorder.iterations {
        assert!(info.subspace_dimension <= info.max_subspace_dimension);
        assert!(info.subspace_dimension <= num_blocks * info.block_width);
    }
}

#[test]
fn implicit_residual_is_monotone_within_a_cycle() {
    let op = gallery::convection_diffusion_2d(8, 8, 30.0).unwrap();
    let n = op.dim();
    let b = random_rhs(&op, 2, 5);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(n, 2), b);
    let config = SolverConfig::default()
        .with_block_size(2)
        .with_num_blocks(10)
        .with_max_restarts(100)
        .with_max_iters(1000)
        .with_tolerance(1e-9);

    let mut recorder = Recorder::default();
    PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve_with_observer(&mut recorder)
        .unwrap();

    assert!(!recorder.iterations.is_empty());
    assert_eq!(recorder.non_monotone, 0);
}

#[test]
fn detailed_status_output_leaves_results_unchanged() {
    let op = gallery::convection_diffusion_2d(10, 10, 15.0).unwrap();
    let n = op.dim();
    let b = random_rhs(&op, 3, 21);
    let config = SolverConfig::default()
        .with_block_size(3)
        .with_num_blocks(10)
        .with_max_restarts(200)
        .with_max_iters(2000)
        .with_tolerance(1e-8);

    let run = |config: SolverConfig| -> (SolveReport, MultiVector) {
        let mut problem = LinearProblem::new(&op, MultiVector::zeros(n, 3), b.clone());
        let report = PseudoBlockGmresSolver::new(&mut problem, config)
            .unwrap()
            .solve()
            .unwrap();
        (report, problem.into_parts().0)
    };

    let (quiet, x_quiet) = run(config.clone().with_verbosity(Verbosity::Quiet));
    let (detailed, x_detailed) = run(
        config
            .with_verbosity(Verbosity::Details)
            .with_output_frequency(1),
    );

    assert!(quiet.converged(), "{quiet}");
    assert!(quiet.restarts > 0);
    assert_eq!(detailed.status, quiet.status);
    assert_eq!(detailed.iterations, quiet.iterations);
    assert_eq!(detailed.restarts, quiet.restarts);
    assert_eq!(detailed.column_iterations, quiet.column_iterations);
    assert_eq!(detailed.deflations, quiet.deflations);
    assert_eq!(x_detailed, x_quiet);
}

#[test]
fn exhausted_block_does_not_stop_later_blocks() {
    let op = gallery::convection_diffusion_2d(6, 6, 5.0).unwrap();
    let mut b = random_rhs(&op, 2, 9);
    b.set_column(1, &[0.0; 36]).unwrap();
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(36, 2), b);
    let config = SolverConfig::default()
        .with_block_size(1)
        .with_max_iters(2)
        .with_tolerance(1e-12);

    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    assert_eq!(report.status, ReturnType::Unconverged);
    assert_eq!(report.termination, Termination::MaxItersExceeded);
    assert_eq!(report.blocks, 2);
    assert_eq!(report.column_iterations, vec![2, 0]);
    assert_eq!(report.residuals[1], 0.0);
}

#[test]
fn max_restarts_is_soft_failure() {
    let op = gallery::convection_diffusion_2d(12, 12, 40.0).unwrap();
    let n = op.dim();
    let b = random_rhs(&op, 2, 1);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(n, 2), b.clone());
    let config = SolverConfig::default()
        .with_block_size(2)
        .with_num_blocks(3)
        .with_max_restarts(2)
        .with_tolerance(1e-12);

    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    assert_eq!(report.status, ReturnType::Unconverged);
    assert_eq!(report.termination, Termination::MaxRestartsExceeded);
    assert_eq!(report.restarts, 2);
    assert_eq!(report.iterations, 9);

    // The partial solution is kept and is better than the zero guess
    for r in relative_residuals(&op, problem.lhs(), &b) {
        assert!(r < 1.0);
    }
}

#[test]
fn breakdown_is_distinguishable() {
    let op = gallery::diagonal(&[0.0, 1.0]).unwrap();
    let b = MultiVector::from_columns(2, &[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(2, 2), b);
    let config = SolverConfig::default().with_block_size(2);

    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    assert_eq!(report.termination, Termination::Breakdown { column: 1 });
    assert_eq!(report.status, ReturnType::Unconverged);
    // Column 0 is solvable and still converges in the same step
    assert!(report.residuals[0] <= 1e-8);
    assert_eq!(problem.lhs().column(0), &[0.0, 1.0]);
}

#[test]
fn setup_and_config_errors() {
    let op = gallery::diagonal(&[1.0, 2.0, 3.0]).unwrap();

    let mut bad_rows = LinearProblem::new(&op, MultiVector::zeros(3, 1), MultiVector::zeros(2, 1));
    let err = PseudoBlockGmresSolver::new(&mut bad_rows, SolverConfig::default())
        .unwrap()
        .solve()
        .unwrap_err();
    assert!(matches!(err, SolverError::SetupInvalid(_)));

    let mut ok = LinearProblem::new(&op, MultiVector::zeros(3, 1), MultiVector::zeros(3, 1));
    let err = PseudoBlockGmresSolver::new(&mut ok, SolverConfig::default().with_tolerance(-1.0))
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::InvalidConfig(_)));
}

#[test]
fn report_serializes_to_json() {
    let (op, b) = staggered_problem(3);
    let mut problem = LinearProblem::new(&op, MultiVector::zeros(3, 3), b);
    let config = SolverConfig::default().with_block_size(3).with_max_iters(5);
    let report = PseudoBlockGmresSolver::new(&mut problem, config)
        .unwrap()
        .solve()
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "Converged");
    assert_eq!(json["column_iterations"], serde_json::json!([1, 2, 3]));
}
