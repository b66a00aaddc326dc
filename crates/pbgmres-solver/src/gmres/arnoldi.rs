//! Arnoldi basis construction for one right-hand side.
//!
//! Each new direction is orthogonalized against the whole basis with classical
//! Gram-Schmidt, computing all coefficients with one collective reduction. If
//! the norm drops by more than a factor of `1/√2` a second pass is made (DGKS
//! criterion). A direction that is still numerically zero afterwards means the
//! Krylov space is invariant; the step is flagged as a breakdown and the basis
//! is not extended.

use nalgebra::{DMatrix, DVector};
use pbgmres_core::VectorSpace;

/// Norm ratio below which a second orthogonalization pass is made.
const REORTH_THRESHOLD: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Relative norm below which a new direction counts as linearly dependent.
const BREAKDOWN_TOL: f64 = 10.0 * f64::EPSILON;

/// Result of extending the basis by one vector.
#[derive(Debug, Clone)]
pub struct ArnoldiStep {
    /// New Hessenberg column `h[0..=k+1, k]`.
    pub coefficients: Vec<f64>,
    /// The new direction was dependent on the basis.
    pub breakdown: bool,
}

/// Orthonormal Krylov basis `v_0 .. v_k` of one column.
#[derive(Debug, Clone)]
pub struct ArnoldiBasis {
    vectors: DMatrix<f64>,
    dim: usize,
    capacity: usize,
    invariant: bool,
}

impl ArnoldiBasis {
    /// Storage for up to `capacity` Arnoldi steps (`capacity + 1` vectors).
    pub fn new(local_length: usize, capacity: usize) -> Self {
        Self {
            vectors: DMatrix::zeros(local_length, capacity + 1),
            dim: 0,
            capacity,
            invariant: false,
        }
    }

    /// Discard the basis and start again from `residual`, whose norm is `norm`.
    pub fn start(&mut self, residual: &[f64], norm: f64) {
        self.dim = 0;
        self.vectors.fill(0.0);
        if norm > 0.0 {
            let mut v0 = self.vectors.column_mut(0);
            for (vi, &ri) in v0.iter_mut().zip(residual.iter()) {
                *vi = ri / norm;
            }
            self.invariant = false;
        } else {
            self.invariant = true;
        }
    }

    /// Number of completed Arnoldi steps.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Maximum number of steps before a restart is required.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// No more steps fit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.dim >= self.capacity
    }

    /// The last step found an invariant subspace.
    #[inline]
    pub fn is_invariant(&self) -> bool {
        self.invariant
    }

    /// Whether another step can be taken.
    #[inline]
    pub fn can_extend(&self) -> bool {
        !self.invariant && !self.is_full()
    }

    /// The newest basis vector `v_k`, to which the operator is applied next.
    pub fn current(&self) -> &[f64] {
        let n = self.vectors.nrows();
        &self.vectors.as_slice()[self.dim * n..(self.dim + 1) * n]
    }

    /// Orthogonalize `w = A v_k` against the basis and append the result.
    ///
    /// # Panics
    ///
    /// Panics if the basis is full or invariant; check [`can_extend`](Self::can_extend)
    /// first.
    pub fn extend(&mut self, w: &[f64], space: &VectorSpace<'_>) -> ArnoldiStep {
        assert!(self.can_extend(), "Arnoldi basis cannot be extended");
        let k = self.dim;

        let mut w = DVector::from_column_slice(w);
        let norm_before = space.norm(w.as_slice());

        let mut h = space.project(&self.vectors, k + 1, &w);
        w -= self.vectors.columns(0, k + 1) * &h;
        let mut norm = space.norm(w.as_slice());

        if norm < REORTH_THRESHOLD * norm_before {
            let correction = space.project(&self.vectors, k + 1, &w);
            w -= self.vectors.columns(0, k + 1) * &correction;
            h += correction;
            norm = space.norm(w.as_slice());
        }

        let breakdown = norm == 0.0 || norm <= BREAKDOWN_TOL * norm_before;
        let mut coefficients: Vec<f64> = h.iter().copied().collect();
        if breakdown {
            coefficients.push(0.0);
            self.invariant = true;
        } else {
            coefficients.push(norm);
            self.vectors.column_mut(k + 1).copy_from(&(w / norm));
        }
        self.dim = k + 1;

        ArnoldiStep {
            coefficients,
            breakdown,
        }
    }

    /// `V_k y` for the first `y.len()` basis vectors.
    pub fn combine(&self, y: &DVector<f64>) -> DVector<f64> {
        self.vectors.columns(0, y.len()) * y
    }

    /// Gram matrix `V^T V` of the vectors built so far (for diagnostics).
    pub fn gram(&self, space: &VectorSpace<'_>) -> DMatrix<f64> {
        let count = self.basis_len();
        let v = self.vectors.columns(0, count);
        let mut g = v.tr_mul(&v);
        space.comm().sum_all(g.as_mut_slice());
        g
    }

    /// Number of stored orthonormal vectors.
    pub fn basis_len(&self) -> usize {
        if self.invariant { self.dim } else { self.dim + 1 }
    }
}
