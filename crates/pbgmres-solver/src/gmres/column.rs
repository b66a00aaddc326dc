//! Per-right-hand-side Krylov state of the pseudo-block iteration.

use nalgebra::DVector;
use pbgmres_core::VectorSpace;

use super::arnoldi::{ArnoldiBasis, ArnoldiStep};
use super::lsq::GivensLeastSquares;

/// One right-hand side in the working block.
///
/// Owns its current solution, Arnoldi basis and least-squares factorization.
/// The solution is only updated at restarts and at the end of a block; in
/// between, the best approximation is `x + V y`.
#[derive(Debug, Clone)]
pub struct KrylovColumn {
    column: usize,
    x: DVector<f64>,
    basis: ArnoldiBasis,
    lsq: GivensLeastSquares,
    masked: bool,
    accuracy_warned: bool,
}

impl KrylovColumn {
    /// State for right-hand side `column` starting from solution `x`, with
    /// room for `capacity` Arnoldi steps per cycle.
    pub fn new(column: usize, x: &[f64], capacity: usize) -> Self {
        Self {
            column,
            x: DVector::from_column_slice(x),
            basis: ArnoldiBasis::new(x.len(), capacity),
            lsq: GivensLeastSquares::new(capacity, 0.0),
            masked: false,
            accuracy_warned: false,
        }
    }

    /// Index of the right-hand side in the problem.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Current solution (without the pending Krylov correction).
    pub fn solution(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// Basis of the current cycle.
    #[inline]
    pub fn basis(&self) -> &ArnoldiBasis {
        &self.basis
    }

    /// Steps taken in the current cycle.
    #[inline]
    pub fn dim(&self) -> usize {
        self.basis.dim()
    }

    /// Converged and waiting to be compacted out of the working block.
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// Still taking part in the iteration.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.masked
    }

    /// Stop iterating this column.
    pub fn mask(&mut self) {
        self.masked = true;
    }

    /// Returns true the first time it is called.
    pub fn warn_once(&mut self) -> bool {
        !std::mem::replace(&mut self.accuracy_warned, true)
    }

    /// Begin a cycle from residual `r` with norm `norm`.
    pub fn start_cycle(&mut self, r: &[f64], norm: f64) {
        self.basis.start(r, norm);
        self.lsq.reset(norm);
    }

    /// Absorb `w = A v_k`; returns the step and the new implicit residual norm.
    ///
    /// # Panics
    ///
    /// Panics if the basis of the current cycle cannot be extended.
    pub fn extend(&mut self, w: &[f64], space: &VectorSpace<'_>) -> (ArnoldiStep, f64) {
        let step = self.basis.extend(w, space);
        let residual = self.lsq.push_column(&step.coefficients);
        (step, residual)
    }

    /// Current implicit residual norm.
    #[inline]
    pub fn implicit_residual(&self) -> f64 {
        self.lsq.residual_norm()
    }

    /// Best approximation of the current cycle, `x + V y`.
    pub fn candidate(&self) -> DVector<f64> {
        if self.lsq.dim() == 0 {
            return self.x.clone();
        }
        &self.x + self.basis.combine(&self.lsq.solve())
    }

    /// Fold the Krylov correction into the solution and empty the cycle.
    pub fn absorb_correction(&mut self) {
        if self.lsq.dim() > 0 {
            self.x = self.candidate();
        }
        self.lsq.reset(0.0);
    }

    /// Replace the solution, e.g. with a verified candidate.
    pub fn set_solution(&mut self, x: DVector<f64>) {
        self.x = x;
        self.lsq.reset(0.0);
    }
}
