//! Sparse matrix operator for iterative solvers.
//!
//! Wraps faer's compressed sparse column matrices so they can be handed to the
//! GMRES solvers as a [`LinearOperator`].

use faer::sparse::{SparseColMat, Triplet};

use crate::error::{CoreError, Result};
use crate::map::{ContiguousMap, IndexMap};
use crate::operator::LinearOperator;

/// Sparse real-valued operator stored in CSC form on a single process.
pub struct SparseOperator {
    matrix: SparseColMat<usize, f64>,
    map: ContiguousMap,
}

impl SparseOperator {
    /// Create from an existing square sparse matrix.
    pub fn from_matrix(matrix: SparseColMat<usize, f64>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(CoreError::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }
        let map = ContiguousMap::serial(matrix.nrows());
        Ok(Self { matrix, map })
    }

    /// Create from triplets (row, col, value).
    ///
    /// Duplicate entries at the same position are summed.
    pub fn from_triplets(size: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        if let Some(&(r, c, _)) = triplets.iter().find(|&&(r, c, _)| r >= size || c >= size) {
            return Err(CoreError::InvalidTriplets(format!(
                "entry ({r}, {c}) outside a {size}x{size} matrix"
            )));
        }

        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, v))
            .collect();

        let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(size, size, &faer_triplets)
            .map_err(|e| CoreError::InvalidTriplets(format!("{e:?}")))?;

        log::debug!(
            "assembled {size}x{size} sparse operator from {} triplets",
            triplets.len()
        );

        Self::from_matrix(matrix)
    }

    /// Get a reference to the underlying matrix.
    pub fn matrix(&self) -> &SparseColMat<usize, f64> {
        &self.matrix
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.matrix.as_ref().row_idx().len()
    }
}

impl LinearOperator for SparseOperator {
    fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    fn row_map(&self) -> &dyn IndexMap {
        &self.map
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        let n = self.matrix.nrows();
        assert_eq!(x.len(), n);
        assert_eq!(y.len(), n);

        y.iter_mut().for_each(|yi| *yi = 0.0);

        // CSC: scatter column j scaled by x[j] into y
        let mat_ref = self.matrix.as_ref();
        let col_ptrs = mat_ref.col_ptr();
        let row_indices = mat_ref.row_idx();
        let values = mat_ref.val();

        for (j, &xj) in x.iter().enumerate() {
            if xj == 0.0 {
                continue;
            }
            for idx in col_ptrs[j]..col_ptrs[j + 1] {
                y[row_indices[idx]] += values[idx] * xj;
            }
        }
    }
}
