//! Solver configuration.
//!
//! A [`SolverConfig`] is fixed for the duration of one solve. To solve again with
//! different settings, build a new configuration (usually from the previous one
//! with the `with_*` methods) and construct a new solver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};

/// Denominator used when scaling a residual norm for the convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResidualScaling {
    /// Divide by the norm of the right-hand side.
    NormOfRhs,
    /// Divide by the norm of the residual of the initial guess.
    NormOfInitialResidual,
    /// Use the raw residual norm.
    None,
}

impl ResidualScaling {
    /// Textual name of the policy.
    pub fn name(&self) -> &'static str {
        match self {
            ResidualScaling::NormOfRhs => "Norm of RHS",
            ResidualScaling::NormOfInitialResidual => "Norm of Initial Residual",
            ResidualScaling::None => "None",
        }
    }
}

impl fmt::Display for ResidualScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResidualScaling {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "norm of rhs" | "rhs" => Ok(ResidualScaling::NormOfRhs),
            "norm of initial residual" | "initial" | "initial-residual" => {
                Ok(ResidualScaling::NormOfInitialResidual)
            }
            "none" => Ok(ResidualScaling::None),
            _ => Err(SolverError::UnknownScaling(s.to_string())),
        }
    }
}

/// How much the solver reports through the `log` facade.
///
/// Warnings (loss of accuracy, breakdown) are always logged. Verbosity has no
/// effect on the numerical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verbosity {
    /// Only warnings.
    Quiet,
    /// A final summary per solve.
    Summary,
    /// Periodic residual status at the output frequency, plus the summary.
    Details,
}

/// Pseudo-block GMRES configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum Krylov basis length per right-hand side before a restart.
    pub num_blocks: usize,
    /// Number of right-hand sides iterated together.
    pub block_size: usize,
    /// Iteration budget per block of right-hand sides. `None` uses the global
    /// problem size minus one.
    ///
    /// Every block of `block_size` columns starts with a fresh budget, so the
    /// total reported by a solve over several blocks can exceed this value.
    pub max_iters: Option<usize>,
    /// Restart budget per block of right-hand sides.
    pub max_restarts: usize,
    /// Convergence tolerance on the scaled residual.
    pub tolerance: f64,
    /// Converged columns required before the working block is compacted.
    pub deflation_quorum: usize,
    /// Scaling of the implicit (recurrence) residual.
    pub implicit_scaling: ResidualScaling,
    /// Scaling of the explicit (recomputed) residual.
    pub explicit_scaling: ResidualScaling,
    /// Log residual status every this many iterations.
    pub output_frequency: Option<usize>,
    /// Diagnostic output level.
    pub verbosity: Verbosity,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            num_blocks: 300,
            block_size: 1,
            max_iters: None,
            max_restarts: 20,
            tolerance: 1e-8,
            deflation_quorum: 1,
            implicit_scaling: ResidualScaling::NormOfInitialResidual,
            explicit_scaling: ResidualScaling::NormOfInitialResidual,
            output_frequency: None,
            verbosity: Verbosity::Quiet,
        }
    }
}

impl SolverConfig {
    /// Set the maximum basis length per right-hand side.
    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = num_blocks;
        self
    }

    /// Set the number of right-hand sides iterated together.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the iteration budget of each block of right-hand sides.
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = Some(max_iters);
        self
    }

    /// Set the restart budget.
    pub fn with_max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the deflation quorum.
    pub fn with_deflation_quorum(mut self, quorum: usize) -> Self {
        self.deflation_quorum = quorum;
        self
    }

    /// Set both implicit and explicit residual scaling.
    pub fn with_scaling(mut self, scaling: ResidualScaling) -> Self {
        self.implicit_scaling = scaling;
        self.explicit_scaling = scaling;
        self
    }

    /// Set the implicit residual scaling.
    pub fn with_implicit_scaling(mut self, scaling: ResidualScaling) -> Self {
        self.implicit_scaling = scaling;
        self
    }

    /// Set the explicit residual scaling.
    pub fn with_explicit_scaling(mut self, scaling: ResidualScaling) -> Self {
        self.explicit_scaling = scaling;
        self
    }

    /// Set the status output frequency.
    pub fn with_output_frequency(mut self, frequency: usize) -> Self {
        self.output_frequency = Some(frequency);
        self
    }

    /// Set the verbosity.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.num_blocks == 0 {
            return Err(SolverError::InvalidConfig(
                "num_blocks must be at least 1".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(SolverError::InvalidConfig(
                "block_size must be at least 1".into(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.deflation_quorum == 0 {
            return Err(SolverError::InvalidConfig(
                "deflation_quorum must be at least 1".into(),
            ));
        }
        if self.max_iters == Some(0) {
            return Err(SolverError::InvalidConfig(
                "max_iters must be at least 1".into(),
            ));
        }
        if self.output_frequency == Some(0) {
            return Err(SolverError::InvalidConfig(
                "output_frequency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Iteration budget for a problem with `global_size` rows.
    pub fn effective_max_iters(&self, global_size: usize) -> usize {
        self.max_iters
            .unwrap_or_else(|| global_size.saturating_sub(1).max(1))
    }
}
