//! Incremental least-squares solve for one GMRES column.
//!
//! The Hessenberg matrix is reduced to upper triangular form by Givens
//! rotations as columns arrive. Only the newest column is rotated at each
//! step, so the residual estimate `|g[k+1]|` is available after every step
//! without re-solving, and it never increases.

use nalgebra::{DMatrix, DVector};

use super::helpers::{apply_rotation, givens_rotation};

/// Rotated Hessenberg factor and right-hand side `g = Q^T (β e_1)`.
#[derive(Debug, Clone)]
pub struct GivensLeastSquares {
    r: DMatrix<f64>,
    cs: Vec<f64>,
    sn: Vec<f64>,
    g: DVector<f64>,
    dim: usize,
}

impl GivensLeastSquares {
    /// Workspace for up to `capacity` columns with initial residual norm `beta`.
    pub fn new(capacity: usize, beta: f64) -> Self {
        let mut g = DVector::zeros(capacity + 1);
        g[0] = beta;
        Self {
            r: DMatrix::zeros(capacity + 1, capacity),
            cs: vec![0.0; capacity],
            sn: vec![0.0; capacity],
            g,
            dim: 0,
        }
    }

    /// Forget all columns and start from residual norm `beta`.
    pub fn reset(&mut self, beta: f64) {
        self.r.fill(0.0);
        self.g.fill(0.0);
        self.g[0] = beta;
        self.dim = 0;
    }

    /// Number of columns absorbed.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Current residual norm of the least-squares problem.
    #[inline]
    pub fn residual_norm(&self) -> f64 {
        self.g[self.dim].abs()
    }

    /// Absorb Hessenberg column `h[0..=k+1]` and return the new residual norm.
    ///
    /// # Panics
    ///
    /// Panics if `h` does not have `dim() + 2` entries or the workspace is full.
    pub fn push_column(&mut self, h: &[f64]) -> f64 {
        let k = self.dim;
        assert_eq!(h.len(), k + 2, "Hessenberg column length mismatch");
        assert!(k < self.cs.len(), "least-squares workspace is full");

        for (i, &hi) in h.iter().enumerate() {
            self.r[(i, k)] = hi;
        }

        // Apply previous Givens rotations to the new column
        for j in 0..k {
            let (mut top, mut bottom) = (self.r[(j, k)], self.r[(j + 1, k)]);
            apply_rotation(self.cs[j], self.sn[j], &mut top, &mut bottom);
            self.r[(j, k)] = top;
            self.r[(j + 1, k)] = bottom;
        }

        // Compute new Givens rotation. A zero column swaps rows so the
        // unreduced part of g stays in the residual.
        let (a, b) = (self.r[(k, k)], self.r[(k + 1, k)]);
        let (c, s) = if a.abs() < 1e-300 && b.abs() < 1e-300 {
            (0.0, 1.0)
        } else {
            givens_rotation(a, b)
        };
        self.cs[k] = c;
        self.sn[k] = s;

        let (mut diag, mut sub) = (self.r[(k, k)], self.r[(k + 1, k)]);
        apply_rotation(c, s, &mut diag, &mut sub);
        self.r[(k, k)] = diag;
        self.r[(k + 1, k)] = 0.0;

        let (mut gk, mut gk1) = (self.g[k], self.g[k + 1]);
        apply_rotation(c, s, &mut gk, &mut gk1);
        self.g[k] = gk;
        self.g[k + 1] = gk1;

        self.dim = k + 1;
        self.residual_norm()
    }

    /// Minimizing coefficients `y` (length `dim`) by back-substitution.
    ///
    /// A zero pivot leaves the corresponding coefficient at zero.
    pub fn solve(&self) -> DVector<f64> {
        let k = self.dim;
        let mut y = DVector::zeros(k);
        for i in (0..k).rev() {
            let mut sum = self.g[i];
            for j in (i + 1)..k {
                sum -= self.r[(i, j)] * y[j];
            }
            if self.r[(i, i)].abs() > 1e-300 {
                y[i] = sum / self.r[(i, i)];
            }
        }
        y
    }
}
