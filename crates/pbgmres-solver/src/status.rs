//! Residual-based convergence test.
//!
//! A column passes when its residual norm, divided by the column's scale
//! factor, is at or below the tolerance. Implicit (recurrence) and explicit
//! (recomputed) residuals may use different scale factors. A scale factor of
//! zero (zero right-hand side, or an exact initial guess) falls back to the
//! unscaled norm.

use crate::config::{ResidualScaling, SolverConfig};
use crate::error::Result;
use crate::problem::LinearProblem;

/// Per-column residual test against a fixed tolerance.
#[derive(Debug, Clone)]
pub struct ResidualTest {
    tolerance: f64,
    implicit_scaling: ResidualScaling,
    explicit_scaling: ResidualScaling,
    rhs_norms: Vec<f64>,
    initial_residual_norms: Vec<f64>,
}

impl ResidualTest {
    /// Build a test from precomputed right-hand-side and initial residual norms.
    ///
    /// # Panics
    ///
    /// Panics if `rhs_norms` and `initial_residual_norms` differ in length.
    pub fn new(
        tolerance: f64,
        implicit_scaling: ResidualScaling,
        explicit_scaling: ResidualScaling,
        rhs_norms: Vec<f64>,
        initial_residual_norms: Vec<f64>,
    ) -> Self {
        assert_eq!(rhs_norms.len(), initial_residual_norms.len());
        Self {
            tolerance,
            implicit_scaling,
            explicit_scaling,
            rhs_norms,
            initial_residual_norms,
        }
    }

    /// Build a test for `problem`, measuring the norms of its current blocks.
    pub fn for_problem(config: &SolverConfig, problem: &LinearProblem<'_>) -> Result<Self> {
        let rhs_norms = problem.space().norms(problem.rhs());
        let initial_residual_norms = problem.residual_norms()?;
        Ok(Self::new(
            config.tolerance,
            config.implicit_scaling,
            config.explicit_scaling,
            rhs_norms,
            initial_residual_norms,
        ))
    }

    /// Convergence tolerance.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Norm of the initial residual of `column`.
    pub fn initial_residual_norm(&self, column: usize) -> f64 {
        self.initial_residual_norms[column]
    }

    /// Scale factor for `column` under `scaling`.
    pub fn scale(&self, column: usize, scaling: ResidualScaling) -> f64 {
        let scale = match scaling {
            ResidualScaling::NormOfRhs => self.rhs_norms[column],
            ResidualScaling::NormOfInitialResidual => self.initial_residual_norms[column],
            ResidualScaling::None => 1.0,
        };
        if scale > 0.0 { scale } else { 1.0 }
    }

    /// Scaled implicit residual.
    #[inline]
    pub fn scaled_implicit(&self, column: usize, norm: f64) -> f64 {
        norm / self.scale(column, self.implicit_scaling)
    }

    /// Scaled explicit residual.
    #[inline]
    pub fn scaled_explicit(&self, column: usize, norm: f64) -> f64 {
        norm / self.scale(column, self.explicit_scaling)
    }

    /// Whether the implicit residual norm of `column` meets the tolerance.
    pub fn implicit_passes(&self, column: usize, norm: f64) -> bool {
        self.scaled_implicit(column, norm) <= self.tolerance
    }

    /// Whether the explicit residual norm of `column` meets the tolerance.
    pub fn explicit_passes(&self, column: usize, norm: f64) -> bool {
        self.scaled_explicit(column, norm) <= self.tolerance
    }
}
