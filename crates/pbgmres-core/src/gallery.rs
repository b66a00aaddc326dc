//! Generated test operators.
//!
//! Small, reproducible matrices for exercising the solvers without reading
//! matrix files.

use crate::error::{CoreError, Result};
use crate::sparse_operator::SparseOperator;

/// Non-symmetric 5-point convection-diffusion operator on an `nx × ny` grid.
///
/// Discretizes `-Δu + c ∂u/∂x` with central differences on the unit square
/// (homogeneous Dirichlet boundary), scaled by `h²`. The diagonal is 4, the
/// vertical neighbours are -1 and the horizontal neighbours are `-1 ± c·h/2`.
pub fn convection_diffusion_2d(nx: usize, ny: usize, convection: f64) -> Result<SparseOperator> {
    if nx == 0 || ny == 0 {
        return Err(CoreError::InvalidOperator(format!(
            "grid must be non-empty, got {nx}x{ny}"
        )));
    }

    let n = nx * ny;
    let h = 1.0 / (nx as f64 + 1.0);
    let cell = 0.5 * convection * h;
    let idx = |i: usize, j: usize| j * nx + i;

    let mut triplets = Vec::with_capacity(5 * n);
    for j in 0..ny {
        for i in 0..nx {
            let row = idx(i, j);
            triplets.push((row, row, 4.0));
            if i > 0 {
                triplets.push((row, idx(i - 1, j), -1.0 - cell));
            }
            if i + 1 < nx {
                triplets.push((row, idx(i + 1, j), -1.0 + cell));
            }
            if j > 0 {
                triplets.push((row, idx(i, j - 1), -1.0));
            }
            if j + 1 < ny {
                triplets.push((row, idx(i, j + 1), -1.0));
            }
        }
    }

    SparseOperator::from_triplets(n, &triplets)
}

/// Constant-coefficient tridiagonal operator.
pub fn tridiagonal(n: usize, sub: f64, diag: f64, sup: f64) -> Result<SparseOperator> {
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            triplets.push((i, i - 1, sub));
        }
        triplets.push((i, i, diag));
        if i + 1 < n {
            triplets.push((i, i + 1, sup));
        }
    }
    SparseOperator::from_triplets(n, &triplets)
}

/// Diagonal operator with the given entries.
pub fn diagonal(values: &[f64]) -> Result<SparseOperator> {
    let triplets: Vec<_> = values.iter().enumerate().map(|(i, &v)| (i, i, v)).collect();
    SparseOperator::from_triplets(values.len(), &triplets)
}
