//! Linear operator abstraction for iterative solvers.

use nalgebra::{DMatrix, DVector};

use crate::error::{CoreError, Result};
use crate::map::{ContiguousMap, IndexMap};
use crate::multivec::MultiVector;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A square linear operator `y = A * x` over distributed vectors.
///
/// `x` and `y` hold the locally owned rows described by [`row_map`](Self::row_map).
/// In a distributed setting `apply` is a collective call.
///
/// With the `parallel` feature, [`apply_block`](Self::apply_block) applies the
/// columns concurrently only when the row map lives on a single process.
/// Distributed operators are always applied one column at a time, in column
/// order, so every process issues its collectives in the same sequence.
pub trait LinearOperator: Send + Sync {
    /// Number of locally owned rows.
    fn dim(&self) -> usize;

    /// Partition of the operator's rows (and of its domain and range vectors).
    fn row_map(&self) -> &dyn IndexMap;

    /// Apply the operator to one vector: `y = A * x`.
    fn apply(&self, x: &[f64], y: &mut [f64]);

    /// Apply the operator to every column of a block: `Y = A * X`.
    fn apply_block(&self, x: &MultiVector, y: &mut MultiVector) {
        let n = self.dim();
        assert_eq!(x.local_length(), n, "operator domain mismatch");
        assert_eq!(y.local_length(), n, "operator range mismatch");
        assert_eq!(x.num_vectors(), y.num_vectors(), "block width mismatch");
        if n == 0 {
            // A rank without rows still joins the collectives of each column
            if self.row_map().comm().size() > 1 {
                for _ in 0..x.num_vectors() {
                    self.apply(&[], &mut []);
                }
            }
            return;
        }

        #[cfg(feature = "parallel")]
        if self.row_map().comm().size() == 1 {
            y.as_mut_slice()
                .par_chunks_mut(n)
                .zip(x.as_slice().par_chunks(n))
                .for_each(|(yj, xj)| self.apply(xj, yj));
            return;
        }

        for (yj, xj) in y.as_mut_slice().chunks_mut(n).zip(x.as_slice().chunks(n)) {
            self.apply(xj, yj);
        }
    }
}

/// Dense operator backed by an nalgebra matrix on a single process.
#[derive(Debug, Clone)]
pub struct DenseOperator {
    matrix: DMatrix<f64>,
    map: ContiguousMap,
}

impl DenseOperator {
    /// Wrap a square matrix.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            return Err(CoreError::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }
        let map = ContiguousMap::serial(matrix.nrows());
        Ok(Self { matrix, map })
    }

    /// Build from row-major nested vectors.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(CoreError::DimensionMismatch {
                expected: n,
                actual: bad.len(),
            });
        }
        Self::new(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
    }

    /// The wrapped matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

impl LinearOperator for DenseOperator {
    fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    fn row_map(&self) -> &dyn IndexMap {
        &self.map
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.dim());
        assert_eq!(y.len(), self.dim());

        let ax = &self.matrix * DVector::from_column_slice(x);
        y.copy_from_slice(ax.as_slice());
    }
}
