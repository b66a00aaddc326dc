//! Pseudo-block GMRES solver manager.
//!
//! Right-hand sides are solved in consecutive blocks of `block_size` columns.
//! Inside a block every column runs its own restarted GMRES, with the operator
//! applied to all active columns at once. Each cycle begins with an explicit
//! residual check, so columns that already meet the tolerance (for example a
//! previously solved prefix of an augmented system) converge without any work.
//!
//! A column whose implicit residual meets the tolerance has its candidate
//! solution verified against the true residual. On success the column is
//! frozen and masked; masked columns are compacted out of the working block
//! once `deflation_quorum` of them have accumulated.

use std::fmt;
use std::ops::Range;
use std::time::Instant;

use nalgebra::DVector;
use pbgmres_core::MultiVector;

use crate::config::{SolverConfig, Verbosity};
use crate::deflation::DeflationTracker;
use crate::error::Result;
use crate::gmres::KrylovColumn;
use crate::problem::LinearProblem;
use crate::report::{
    IterationInfo, NoopObserver, ReturnType, SolveObserver, SolveReport, Termination,
};
use crate::status::ResidualTest;

/// Phase of the solver manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Validating the problem and allocating Krylov state.
    Initializing,
    /// Extending bases and testing convergence.
    Iterating,
    /// Compacting converged columns out of the working block.
    Deflating,
    /// Folding corrections into the solution and restarting the bases.
    Restarting,
    /// All columns converged.
    Converged,
    /// Iteration budget exhausted.
    MaxItersExceeded,
    /// Restart budget exhausted.
    MaxRestartsExceeded,
    /// An unconverged column's basis broke down.
    Breakdown,
}

impl SolverState {
    /// Returns true for states that end a solve.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SolverState::Converged
                | SolverState::MaxItersExceeded
                | SolverState::MaxRestartsExceeded
                | SolverState::Breakdown
        )
    }
}

impl From<Termination> for SolverState {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Converged => SolverState::Converged,
            Termination::MaxItersExceeded => SolverState::MaxItersExceeded,
            Termination::MaxRestartsExceeded => SolverState::MaxRestartsExceeded,
            Termination::Breakdown { .. } => SolverState::Breakdown,
        }
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverState::Initializing => "INITIALIZING",
            SolverState::Iterating => "ITERATING",
            SolverState::Deflating => "DEFLATING",
            SolverState::Restarting => "RESTARTING",
            SolverState::Converged => "CONVERGED",
            SolverState::MaxItersExceeded => "MAX-ITERS-EXCEEDED",
            SolverState::MaxRestartsExceeded => "MAX-RESTARTS-EXCEEDED",
            SolverState::Breakdown => "BREAKDOWN",
        };
        f.write_str(name)
    }
}

/// Bookkeeping shared by all blocks of one solve.
struct SolveRun<'t> {
    test: &'t ResidualTest,
    tracker: DeflationTracker,
    capacity: usize,
    max_iters: usize,
    iterations: usize,
    restarts: usize,
    block_restarts: usize,
}

/// Restarted pseudo-block GMRES with deflation.
///
/// The solver borrows the linear problem exclusively for its lifetime and
/// writes solutions into the problem's solution block.
///
/// ```
/// use pbgmres_core::{MultiVector, gallery};
/// use pbgmres_solver::{LinearProblem, PseudoBlockGmresSolver, SolverConfig};
///
/// let op = gallery::tridiagonal(10, -1.0, 4.0, -1.0).unwrap();
/// let b = MultiVector::from_columns(10, &[vec![1.0; 10], vec![2.0; 10]]).unwrap();
/// let mut problem = LinearProblem::new(&op, MultiVector::zeros(10, 2), b);
///
/// let config = SolverConfig::default().with_block_size(2).with_max_iters(50);
/// let report = PseudoBlockGmresSolver::new(&mut problem, config)
///     .unwrap()
///     .solve()
///     .unwrap();
/// assert!(report.converged());
/// ```
pub struct PseudoBlockGmresSolver<'p, 'a> {
    problem: &'p mut LinearProblem<'a>,
    config: SolverConfig,
    state: SolverState,
}

impl<'p, 'a> PseudoBlockGmresSolver<'p, 'a> {
    /// Create a solver, rejecting invalid configurations.
    pub fn new(problem: &'p mut LinearProblem<'a>, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            problem,
            config,
            state: SolverState::Initializing,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Current phase; terminal after a solve.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// The problem being solved.
    pub fn problem(&self) -> &LinearProblem<'a> {
        &*self.problem
    }

    /// Solve every right-hand side.
    pub fn solve(&mut self) -> Result<SolveReport> {
        self.solve_with_observer(&mut NoopObserver)
    }

    /// Solve every right-hand side, reporting progress to `observer`.
    ///
    /// Errors are returned only for an invalid problem. Running out of
    /// iterations or restarts, or a breakdown, produce an unconverged report
    /// with the best solution found left in the solution block.
    pub fn solve_with_observer(
        &mut self,
        observer: &mut dyn SolveObserver,
    ) -> Result<SolveReport> {
        let start = Instant::now();
        self.transition(SolverState::Initializing);
        if !self.problem.is_set() {
            self.problem.set_problem()?;
        }

        let num_rhs = self.problem.num_rhs();
        let global = self.problem.map().global_num_elements();
        let test = ResidualTest::for_problem(&self.config, &*self.problem)?;
        let mut run = SolveRun {
            test: &test,
            tracker: DeflationTracker::new(num_rhs, self.config.deflation_quorum),
            capacity: self.config.num_blocks.min(global).max(1),
            max_iters: self.config.effective_max_iters(global),
            iterations: 0,
            restarts: 0,
            block_restarts: 0,
        };

        log::debug!(
            "Pseudo-block GMRES: {} right-hand sides, {} global rows, block size {}, basis length {}, max iters {}",
            num_rhs,
            global,
            self.config.block_size,
            run.capacity,
            run.max_iters
        );

        let mut termination = Termination::Converged;
        let mut blocks = 0;
        let mut first = 0;
        while first < num_rhs {
            let last = (first + self.config.block_size).min(num_rhs);
            blocks += 1;
            let outcome = self.solve_block(first..last, &mut run, observer)?;
            if termination.is_converged() && !outcome.is_converged() {
                termination = outcome;
            }
            if matches!(outcome, Termination::Breakdown { .. }) {
                break;
            }
            first = last;
        }

        let residuals: Vec<f64> = self
            .problem
            .residual_norms()?
            .into_iter()
            .enumerate()
            .map(|(j, norm)| test.scaled_explicit(j, norm))
            .collect();

        let status = if run.tracker.all_converged() {
            ReturnType::Converged
        } else {
            ReturnType::Unconverged
        };
        if status == ReturnType::Converged {
            termination = Termination::Converged;
        }
        self.transition(termination.into());

        let report = SolveReport {
            status,
            termination,
            iterations: run.iterations,
            restarts: run.restarts,
            residuals,
            column_iterations: run.tracker.all_iterations().to_vec(),
            deflations: run.tracker.events().to_vec(),
            blocks,
            elapsed: start.elapsed(),
        };

        if self.config.verbosity >= Verbosity::Summary {
            log::info!("Pseudo-block GMRES: {}", report);
            log::info!("{}", run.tracker.summary());
        } else {
            log::debug!("Pseudo-block GMRES: {}", report);
        }

        Ok(report)
    }

    fn transition(&mut self, next: SolverState) {
        if self.state != next {
            log::debug!("Solver state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Run restarted GMRES on the right-hand sides in `columns`.
    fn solve_block(
        &mut self,
        columns: Range<usize>,
        run: &mut SolveRun<'_>,
        observer: &mut dyn SolveObserver,
    ) -> Result<Termination> {
        log::debug!("Starting block of columns {:?}", columns);
        let mut work: Vec<KrylovColumn> = columns
            .map(|j| KrylovColumn::new(j, self.problem.lhs().column(j), run.capacity))
            .collect();
        let mut block_iterations = 0;
        run.block_restarts = 0;
        self.transition(SolverState::Iterating);

        let termination = 'cycles: loop {
            // Explicit status check; also the starting residual of the cycle
            let active = active_positions(&work);
            let (r, norms) = self.explicit_residuals(&work, &active)?;
            for (i, &w) in active.iter().enumerate() {
                let col = &mut work[w];
                if run.test.explicit_passes(col.column(), norms[i]) {
                    self.converge(col, run, observer)?;
                } else {
                    col.start_cycle(r.column(i), norms[i]);
                }
            }
            self.deflate(&mut work, run, observer, false);

            loop {
                if work.iter().all(|c| c.is_masked()) {
                    break 'cycles Termination::Converged;
                }
                if block_iterations >= run.max_iters {
                    break 'cycles Termination::MaxItersExceeded;
                }
                if work.iter().any(|c| c.is_active() && c.basis().is_full()) {
                    break;
                }

                block_iterations += 1;
                if let Some(column) = self.iterate(&mut work, run, observer)? {
                    log::warn!(
                        "Orthogonalization breakdown in column {} at iteration {}",
                        column,
                        run.iterations
                    );
                    break 'cycles Termination::Breakdown { column };
                }
            }

            if run.block_restarts >= self.config.max_restarts {
                break 'cycles Termination::MaxRestartsExceeded;
            }

            self.transition(SolverState::Restarting);
            for col in work.iter_mut().filter(|c| c.is_active()) {
                col.absorb_correction();
            }
            run.block_restarts += 1;
            run.restarts += 1;
            log::debug!(
                "Restart {} at iteration {} with {} active columns",
                run.block_restarts,
                run.iterations,
                work.iter().filter(|c| c.is_active()).count()
            );
            observer.on_restart(run.block_restarts);
            self.transition(SolverState::Iterating);
        };

        for col in work.iter_mut().filter(|c| c.is_active()) {
            col.absorb_correction();
            self.problem.lhs_mut().set_column(col.column(), col.solution())?;
        }
        self.deflate(&mut work, run, observer, true);

        log::debug!(
            "Block finished after {} iterations and {} restarts: {}",
            block_iterations,
            run.block_restarts,
            termination
        );
        Ok(termination)
    }

    /// One batched Arnoldi step over the active columns.
    ///
    /// Returns the column of a breakdown that left an unconverged column with
    /// nothing further to extend.
    fn iterate(
        &mut self,
        work: &mut Vec<KrylovColumn>,
        run: &mut SolveRun<'_>,
        observer: &mut dyn SolveObserver,
    ) -> Result<Option<usize>> {
        let space = self.problem.space();
        let n = self.problem.operator().dim();
        let active = active_positions(work);

        let mut v = MultiVector::zeros(n, active.len());
        for (i, &w) in active.iter().enumerate() {
            v.set_column(i, work[w].basis().current())?;
        }
        let mut av = MultiVector::zeros(n, active.len());
        self.problem.operator().apply_block(&v, &mut av);
        run.iterations += 1;

        let mut candidates = Vec::new();
        let mut broken = Vec::new();
        for (i, &w) in active.iter().enumerate() {
            let col = &mut work[w];
            let (step, residual) = col.extend(av.column(i), &space);
            run.tracker.increment_iteration(col.column());
            if step.breakdown {
                log::debug!(
                    "Column {} basis is invariant at dimension {}",
                    col.column(),
                    col.dim()
                );
                broken.push(w);
            }
            if run.test.implicit_passes(col.column(), residual) {
                candidates.push(w);
            }
        }

        if !candidates.is_empty() {
            self.confirm(work, &candidates, run, observer)?;
        }

        let breakdown = broken
            .into_iter()
            .find(|&w| work[w].is_active())
            .map(|w| work[w].column());

        let info = self.iteration_info(work, run);
        observer.on_iteration(&info);
        self.print_status(work, run, &info)?;

        if breakdown.is_none() {
            self.deflate(work, run, observer, false);
        }
        Ok(breakdown)
    }

    /// Verify implicitly converged columns against their true residual.
    fn confirm(
        &mut self,
        work: &mut [KrylovColumn],
        candidates: &[usize],
        run: &mut SolveRun<'_>,
        observer: &mut dyn SolveObserver,
    ) -> Result<()> {
        let n = self.problem.operator().dim();
        let solutions: Vec<DVector<f64>> =
            candidates.iter().map(|&w| work[w].candidate()).collect();
        let columns: Vec<usize> = candidates.iter().map(|&w| work[w].column()).collect();

        let mut x = MultiVector::zeros(n, candidates.len());
        for (i, s) in solutions.iter().enumerate() {
            x.set_column(i, s.as_slice())?;
        }
        let r = self.problem.residual(&x, &columns)?;
        let norms = self.problem.space().norms(&r);

        for ((&w, solution), norm) in candidates.iter().zip(solutions).zip(norms) {
            let col = &mut work[w];
            if run.test.explicit_passes(col.column(), norm) {
                col.set_solution(solution);
                self.converge(col, run, observer)?;
            } else if col.warn_once() {
                log::warn!(
                    "Loss of accuracy in column {}: implicit residual {:.3e} meets the tolerance, explicit residual is {:.3e}",
                    col.column(),
                    run.test.scaled_implicit(col.column(), col.implicit_residual()),
                    run.test.scaled_explicit(col.column(), norm)
                );
            }
        }
        Ok(())
    }

    /// Freeze `col` at its current solution.
    fn converge(
        &mut self,
        col: &mut KrylovColumn,
        run: &mut SolveRun<'_>,
        observer: &mut dyn SolveObserver,
    ) -> Result<()> {
        col.mask();
        run.tracker.mark_converged(col.column(), run.iterations);
        self.problem.lhs_mut().set_column(col.column(), col.solution())?;
        log::debug!(
            "Column {} converged after {} iterations",
            col.column(),
            run.tracker.iterations(col.column())
        );
        observer.on_converged(col.column(), col.solution());
        Ok(())
    }

    /// Compact masked columns out of the working block when the quorum is met,
    /// or unconditionally with `flush`.
    fn deflate(
        &mut self,
        work: &mut Vec<KrylovColumn>,
        run: &mut SolveRun<'_>,
        observer: &mut dyn SolveObserver,
        flush: bool,
    ) {
        if !flush && !run.tracker.deflation_due(work.len()) {
            return;
        }
        let resume = self.state;
        self.transition(SolverState::Deflating);
        work.retain(|c| c.is_active());
        if let Some(event) = run.tracker.take_pending(run.iterations) {
            log::debug!(
                "Deflated columns {:?} at iteration {}, {} left in block",
                event.columns,
                event.iteration,
                work.len()
            );
            observer.on_deflation(&event);
        }
        self.transition(resume);
    }

    /// `B - A X` for the active columns at `positions`, and its norms.
    fn explicit_residuals(
        &self,
        work: &[KrylovColumn],
        positions: &[usize],
    ) -> Result<(MultiVector, Vec<f64>)> {
        let n = self.problem.operator().dim();
        let mut x = MultiVector::zeros(n, positions.len());
        for (i, &w) in positions.iter().enumerate() {
            x.set_column(i, work[w].solution())?;
        }
        let columns: Vec<usize> = positions.iter().map(|&w| work[w].column()).collect();
        let r = self.problem.residual(&x, &columns)?;
        let norms = self.problem.space().norms(&r);
        Ok((r, norms))
    }

    fn iteration_info(&self, work: &[KrylovColumn], run: &SolveRun<'_>) -> IterationInfo {
        let active: Vec<&KrylovColumn> = work.iter().filter(|c| c.is_active()).collect();
        IterationInfo {
            iteration: run.iterations,
            restarts: run.block_restarts,
            block_width: active.len(),
            working_width: work.len(),
            subspace_dimension: active.iter().map(|c| c.dim()).sum(),
            max_subspace_dimension: self.config.num_blocks * active.len(),
            implicit_residuals: active
                .iter()
                .map(|c| {
                    let scaled = run.test.scaled_implicit(c.column(), c.implicit_residual());
                    (c.column(), scaled)
                })
                .collect(),
        }
    }

    /// Periodic residual report at the output frequency.
    fn print_status(
        &self,
        work: &[KrylovColumn],
        run: &SolveRun<'_>,
        info: &IterationInfo,
    ) -> Result<()> {
        let Some(frequency) = self.config.output_frequency else {
            return Ok(());
        };
        if self.config.verbosity < Verbosity::Details || run.iterations % frequency != 0 {
            return Ok(());
        }

        let positions = active_positions(work);
        let n = self.problem.operator().dim();
        let mut x = MultiVector::zeros(n, positions.len());
        for (i, &w) in positions.iter().enumerate() {
            x.set_column(i, work[w].candidate().as_slice())?;
        }
        let columns: Vec<usize> = positions.iter().map(|&w| work[w].column()).collect();
        let r = self.problem.residual(&x, &columns)?;
        let norms = self.problem.space().norms(&r);

        log::info!(
            "Iter {:>5}, restart {:>3}: {} active, subspace {}/{}",
            info.iteration,
            info.restarts,
            info.block_width,
            info.subspace_dimension,
            info.max_subspace_dimension
        );
        for ((column, implicit), norm) in info.implicit_residuals.iter().zip(norms) {
            log::info!(
                "  column {:>4}: implicit {:.6e}  explicit {:.6e}",
                column,
                implicit,
                run.test.scaled_explicit(*column, norm)
            );
        }
        Ok(())
    }
}

fn active_positions(work: &[KrylovColumn]) -> Vec<usize> {
    work.iter()
        .enumerate()
        .filter(|(_, c)| c.is_active())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResidualScaling;
    use crate::error::SolverError;
    use approx::assert_abs_diff_eq;
    use pbgmres_core::{DenseOperator, LinearOperator, gallery};

    fn single_rhs(b: &[f64]) -> MultiVector {
        MultiVector::from_columns(b.len(), &[b.to_vec()]).unwrap()
    }

    fn solve(
        op: &dyn LinearOperator,
        b: MultiVector,
        config: SolverConfig,
    ) -> (SolveReport, MultiVector) {
        let x0 = MultiVector::zeros(b.local_length(), b.num_vectors());
        let mut problem = LinearProblem::new(op, x0, b);
        let report = PseudoBlockGmresSolver::new(&mut problem, config)
            .unwrap()
            .solve()
            .unwrap();
        (report, problem.into_parts().0)
    }

    #[test]
    fn gmres_diagonal_system() {
        let diag: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let op = gallery::diagonal(&diag).unwrap();

        let config = SolverConfig::default().with_max_iters(100);
        let (report, x) = solve(&op, single_rhs(&diag), config);

        assert!(report.converged(), "GMRES did not converge: {report}");
        assert!(report.residuals[0] <= 1e-8);
        for xi in x.column(0) {
            assert!((xi - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn gmres_zero_rhs() {
        let op = gallery::diagonal(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let (report, x) = solve(&op, single_rhs(&[0.0; 5]), SolverConfig::default());

        assert!(report.converged());
        assert_eq!(report.iterations, 0);
        assert_eq!(report.column_iterations, vec![0]);
        assert!(x.column(0).iter().all(|xi| xi.abs() < 1e-15));
    }

    #[test]
    fn gmres_identity_operator() {
        let op = gallery::diagonal(&[1.0; 5]).unwrap();
        let b = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (report, x) = solve(&op, single_rhs(&b), SolverConfig::default());

        assert!(report.converged());
        assert_eq!(report.iterations, 1);
        for (xi, bi) in x.column(0).iter().zip(b.iter()) {
            assert_abs_diff_eq!(xi, bi, epsilon = 1e-10);
        }
    }

    #[test]
    fn gmres_spd_system() {
        let op = DenseOperator::from_rows(&[vec![4.0, 1.0], vec![1.0, 3.0]]).unwrap();
        let config = SolverConfig::default().with_max_iters(10);
        let (report, x) = solve(&op, single_rhs(&[5.0, 4.0]), config);

        assert!(report.converged());
        assert_abs_diff_eq!(x.column(0)[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(x.column(0)[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn gmres_tridiagonal() {
        let op = DenseOperator::from_rows(&[
            vec![2.0, -1.0, 0.0],
            vec![-1.0, 2.0, -1.0],
            vec![0.0, -1.0, 2.0],
        ])
        .unwrap();
        let config = SolverConfig::default().with_max_iters(10);
        let (report, x) = solve(&op, single_rhs(&[0.0, 0.0, 4.0]), config);

        assert!(report.converged());
        assert_abs_diff_eq!(x.column(0)[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(x.column(0)[1], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(x.column(0)[2], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn gmres_restart_behavior() {
        let diag: Vec<f64> = (1..=50).map(|i| i as f64 + 0.5).collect();
        let op = gallery::diagonal(&diag).unwrap();

        let config = SolverConfig::default()
            .with_num_blocks(5)
            .with_max_iters(400)
            .with_max_restarts(80)
            .with_tolerance(1e-10);
        let (report, x) = solve(&op, single_rhs(&diag), config);

        assert!(report.converged(), "restarted GMRES did not converge: {report}");
        assert!(report.restarts > 0);
        assert!(report.residuals[0] <= 1e-10);
        // ‖x - x*‖ ≤ tol · ‖r0‖ / λ_min ≈ 1.4e-8
        for xi in x.column(0) {
            assert!((xi - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn block_of_right_hand_sides() {
        let op = gallery::tridiagonal(20, -1.0, 4.0, -1.5).unwrap();
        let cols: Vec<Vec<f64>> = (0..3)
            .map(|k| (0..20).map(|i| ((i + k) % 5) as f64 - 2.0).collect())
            .collect();
        let b = MultiVector::from_columns(20, &cols).unwrap();

        let config = SolverConfig::default()
            .with_block_size(3)
            .with_max_iters(60)
            .with_scaling(ResidualScaling::NormOfRhs);
        let (report, _) = solve(&op, b, config);

        assert!(report.converged());
        assert_eq!(report.blocks, 1);
        assert!(report.residuals.iter().all(|&r| r <= 1e-8));
    }

    #[test]
    fn right_hand_sides_split_into_blocks() {
        let op = gallery::tridiagonal(12, -1.0, 3.0, -1.0).unwrap();
        let cols: Vec<Vec<f64>> = (0..5).map(|k| vec![1.0 + k as f64; 12]).collect();
        let b = MultiVector::from_columns(12, &cols).unwrap();

        let config = SolverConfig::default().with_block_size(2).with_max_iters(40);
        let (report, _) = solve(&op, b, config);

        assert!(report.converged());
        assert_eq!(report.blocks, 3);
        assert_eq!(report.residuals.len(), 5);
    }

    #[test]
    fn max_restarts_leaves_best_solution() {
        let op = gallery::convection_diffusion_2d(10, 10, 20.0).unwrap();
        let b = single_rhs(&[1.0; 100]);

        let config = SolverConfig::default()
            .with_num_blocks(2)
            .with_max_restarts(1)
            .with_tolerance(1e-12);
        let (report, _) = solve(&op, b, config);

        assert_eq!(report.status, ReturnType::Unconverged);
        assert_eq!(report.termination, Termination::MaxRestartsExceeded);
        assert_eq!(report.restarts, 1);
        assert_eq!(report.iterations, 4);
        assert!(report.residuals[0] < 1.0);
    }

    #[test]
    fn max_iters_reported() {
        let op = gallery::convection_diffusion_2d(8, 8, 5.0).unwrap();
        let config = SolverConfig::default()
            .with_max_iters(3)
            .with_tolerance(1e-12);
        let (report, _) = solve(&op, single_rhs(&[1.0; 64]), config);

        assert!(!report.converged());
        assert_eq!(report.termination, Termination::MaxItersExceeded);
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn iteration_budget_applies_per_block() {
        let op = gallery::convection_diffusion_2d(6, 6, 5.0).unwrap();
        let cols: Vec<Vec<f64>> = (0..3).map(|k| vec![1.0 + k as f64; 36]).collect();
        let b = MultiVector::from_columns(36, &cols).unwrap();

        let config = SolverConfig::default()
            .with_max_iters(2)
            .with_tolerance(1e-12);
        let (report, _) = solve(&op, b, config);

        assert_eq!(report.termination, Termination::MaxItersExceeded);
        assert_eq!(report.blocks, 3);
        assert_eq!(report.iterations, 6);
        assert_eq!(report.column_iterations, vec![2, 2, 2]);
    }

    #[test]
    fn singular_operator_breaks_down() {
        let op = gallery::diagonal(&[0.0, 1.0]).unwrap();
        let (report, x) = solve(&op, single_rhs(&[1.0, 0.0]), SolverConfig::default());

        assert_eq!(report.termination, Termination::Breakdown { column: 0 });
        assert_eq!(report.status, ReturnType::Unconverged);
        assert_eq!(x.column(0), &[0.0, 0.0]);
    }

    #[test]
    fn state_is_terminal_after_solve() {
        let op = gallery::diagonal(&[2.0, 3.0]).unwrap();
        let mut problem =
            LinearProblem::new(&op, MultiVector::zeros(2, 1), single_rhs(&[1.0, 1.0]));
        let config = SolverConfig::default().with_max_iters(10);
        let mut solver = PseudoBlockGmresSolver::new(&mut problem, config).unwrap();
        assert_eq!(solver.state(), SolverState::Initializing);

        solver.solve().unwrap();
        assert_eq!(solver.state(), SolverState::Converged);
        assert!(solver.state().is_terminal());
        assert!(solver.problem().is_set());
    }

    #[test]
    fn invalid_config_rejected() {
        let op = gallery::diagonal(&[1.0]).unwrap();
        let mut problem = LinearProblem::new(&op, MultiVector::zeros(1, 1), single_rhs(&[1.0]));
        let config = SolverConfig::default().with_block_size(0);
        let result = PseudoBlockGmresSolver::new(&mut problem, config);
        assert!(matches!(result, Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn malformed_problem_rejected() {
        let op = gallery::diagonal(&[1.0, 2.0]).unwrap();
        let mut problem =
            LinearProblem::new(&op, MultiVector::zeros(2, 2), single_rhs(&[1.0, 2.0]));
        let mut solver =
            PseudoBlockGmresSolver::new(&mut problem, SolverConfig::default()).unwrap();

        assert!(matches!(solver.solve(), Err(SolverError::SetupInvalid(_))));
    }
}
