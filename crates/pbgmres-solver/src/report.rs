//! Solve outcomes and progress observation.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::deflation::DeflationEvent;

/// Overall outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnType {
    /// Every right-hand side met the tolerance.
    Converged,
    /// At least one right-hand side did not.
    Unconverged,
}

/// Why the solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// All right-hand sides converged.
    Converged,
    /// A block used up its iteration budget.
    MaxItersExceeded,
    /// A block used up its restart budget.
    MaxRestartsExceeded,
    /// The Krylov space of an unconverged column became invariant.
    Breakdown {
        /// Right-hand side whose basis broke down.
        column: usize,
    },
}

impl Termination {
    /// Returns true for [`Termination::Converged`].
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::MaxItersExceeded => write!(f, "maximum iterations exceeded"),
            Termination::MaxRestartsExceeded => write!(f, "maximum restarts exceeded"),
            Termination::Breakdown { column } => {
                write!(f, "orthogonalization breakdown in column {column}")
            }
        }
    }
}

/// Result of [`solve`](crate::PseudoBlockGmresSolver::solve).
///
/// The solution itself is left in the linear problem's solution block.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    /// Converged or not.
    pub status: ReturnType,
    /// First reason the solve fell short, or `Converged`.
    pub termination: Termination,
    /// Total batched iterations over all blocks.
    pub iterations: usize,
    /// Total restarts over all blocks.
    pub restarts: usize,
    /// Final explicit residual norm of each column, scaled.
    pub residuals: Vec<f64>,
    /// Arnoldi steps taken by each column.
    pub column_iterations: Vec<usize>,
    /// Compaction passes in order.
    pub deflations: Vec<DeflationEvent>,
    /// Number of right-hand-side blocks processed.
    pub blocks: usize,
    /// Wall time of the solve.
    pub elapsed: Duration,
}

impl SolveReport {
    /// Returns true if every column converged.
    pub fn converged(&self) -> bool {
        self.status == ReturnType::Converged
    }

    /// Largest final scaled residual.
    pub fn max_residual(&self) -> f64 {
        self.residuals.iter().copied().fold(0.0, f64::max)
    }
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({}): {} iterations, {} restarts, {} blocks, {} deflation passes, max residual {:.3e}, {:.3}s",
            self.status,
            self.termination,
            self.iterations,
            self.restarts,
            self.blocks,
            self.deflations.len(),
            self.max_residual(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Snapshot passed to [`SolveObserver::on_iteration`].
#[derive(Debug, Clone)]
pub struct IterationInfo {
    /// Total iterations so far.
    pub iteration: usize,
    /// Restarts of the current block.
    pub restarts: usize,
    /// Active columns in the working block.
    pub block_width: usize,
    /// Columns physically present in the working block, masked ones included.
    pub working_width: usize,
    /// Sum of the basis dimensions of the active columns.
    pub subspace_dimension: usize,
    /// Bound on `subspace_dimension`: `num_blocks × block_width`.
    pub max_subspace_dimension: usize,
    /// Scaled implicit residual of each active column, by column index.
    pub implicit_residuals: Vec<(usize, f64)>,
}

/// Hooks into the progress of a solve. All methods default to doing nothing.
pub trait SolveObserver {
    /// After every batched iteration.
    fn on_iteration(&mut self, _info: &IterationInfo) {}

    /// When `column` converges; `solution` is its frozen value.
    fn on_converged(&mut self, _column: usize, _solution: &[f64]) {}

    /// After converged columns are compacted out of the working block.
    fn on_deflation(&mut self, _event: &DeflationEvent) {}

    /// After the current block restarts for the `restart`-th time.
    fn on_restart(&mut self, _restart: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SolveObserver for NoopObserver {}
