//! Blocks of distributed vectors.
//!
//! A [`MultiVector`] owns the locally stored rows of a set of vectors in
//! column-major order. Views into a larger block are not handed out; callers
//! copy columns in and out explicitly with [`MultiVector::columns`],
//! [`MultiVector::subset`] and [`MultiVector::set_columns`].
//!
//! Purely local operations live on [`MultiVector`]. Anything that needs a
//! reduction across processes (dot products, norms) goes through a
//! [`VectorSpace`], which is bound to the communicator of an [`IndexMap`].

use std::ops::Range;

use nalgebra::{DMatrix, DVector};

use crate::error::{CoreError, Result};
use crate::map::{Communicator, IndexMap};

/// Owned block of `local_length × num_vectors` values.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiVector {
    data: DMatrix<f64>,
}

impl MultiVector {
    /// Block of zeros.
    pub fn zeros(local_length: usize, num_vectors: usize) -> Self {
        Self {
            data: DMatrix::zeros(local_length, num_vectors),
        }
    }

    /// Wrap an existing matrix; each matrix column is one vector.
    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        Self { data }
    }

    /// Build a block from equally sized columns.
    pub fn from_columns(local_length: usize, columns: &[Vec<f64>]) -> Result<Self> {
        for column in columns {
            if column.len() != local_length {
                return Err(CoreError::DimensionMismatch {
                    expected: local_length,
                    actual: column.len(),
                });
            }
        }
        let data = DMatrix::from_iterator(
            local_length,
            columns.len(),
            columns.iter().flat_map(|c| c.iter().copied()),
        );
        Ok(Self { data })
    }

    /// Block with entries drawn uniformly from [-1, 1].
    pub fn random(local_length: usize, num_vectors: usize, rng: &mut fastrand::Rng) -> Self {
        Self {
            data: DMatrix::from_fn(local_length, num_vectors, |_, _| 2.0 * rng.f64() - 1.0),
        }
    }

    /// Number of locally stored rows.
    #[inline]
    pub fn local_length(&self) -> usize {
        self.data.nrows()
    }

    /// Number of vectors in the block.
    #[inline]
    pub fn num_vectors(&self) -> usize {
        self.data.ncols()
    }

    /// Local entries of column `j`.
    #[inline]
    pub fn column(&self, j: usize) -> &[f64] {
        let n = self.local_length();
        &self.data.as_slice()[j * n..(j + 1) * n]
    }

    /// Mutable local entries of column `j`.
    #[inline]
    pub fn column_mut(&mut self, j: usize) -> &mut [f64] {
        let n = self.local_length();
        &mut self.data.as_mut_slice()[j * n..(j + 1) * n]
    }

    /// Underlying column-major storage.
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }

    /// Mutable column-major storage.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_slice()
    }

    /// Borrow as a matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Unwrap into the underlying matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.data
    }

    /// Set every entry to `value`.
    pub fn put_scalar(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Multiply every entry by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        self.data *= alpha;
    }

    /// `self = alpha * a + beta * self`.
    pub fn update(&mut self, alpha: f64, a: &MultiVector, beta: f64) -> Result<()> {
        self.check_shape(a)?;
        for (s, &ai) in self.data.iter_mut().zip(a.data.iter()) {
            *s = alpha * ai + beta * *s;
        }
        Ok(())
    }

    /// Copy of the listed columns, in the given order.
    pub fn subset(&self, columns: &[usize]) -> Result<MultiVector> {
        let mut out = MultiVector::zeros(self.local_length(), columns.len());
        for (dst, &src) in columns.iter().enumerate() {
            self.check_column(src)?;
            out.column_mut(dst).copy_from_slice(self.column(src));
        }
        Ok(out)
    }

    /// Copy of a contiguous range of columns.
    pub fn columns(&self, range: Range<usize>) -> Result<MultiVector> {
        if range.end > self.num_vectors() || range.start > range.end {
            return Err(CoreError::ColumnOutOfRange {
                index: range.end.saturating_sub(1).max(range.start),
                num_vectors: self.num_vectors(),
            });
        }
        Ok(MultiVector {
            data: self.data.columns(range.start, range.len()).into_owned(),
        })
    }

    /// Overwrite columns `start..start + src.num_vectors()` with a copy of `src`.
    pub fn set_columns(&mut self, start: usize, src: &MultiVector) -> Result<()> {
        if src.local_length() != self.local_length() {
            return Err(CoreError::DimensionMismatch {
                expected: self.local_length(),
                actual: src.local_length(),
            });
        }
        let end = start + src.num_vectors();
        if end > self.num_vectors() {
            return Err(CoreError::ColumnOutOfRange {
                index: end - 1,
                num_vectors: self.num_vectors(),
            });
        }
        self.data
            .columns_mut(start, src.num_vectors())
            .copy_from(&src.data);
        Ok(())
    }

    /// Overwrite column `j` with `values`.
    pub fn set_column(&mut self, j: usize, values: &[f64]) -> Result<()> {
        self.check_column(j)?;
        if values.len() != self.local_length() {
            return Err(CoreError::DimensionMismatch {
                expected: self.local_length(),
                actual: values.len(),
            });
        }
        self.column_mut(j).copy_from_slice(values);
        Ok(())
    }

    fn check_column(&self, j: usize) -> Result<()> {
        if j >= self.num_vectors() {
            return Err(CoreError::ColumnOutOfRange {
                index: j,
                num_vectors: self.num_vectors(),
            });
        }
        Ok(())
    }

    fn check_shape(&self, other: &MultiVector) -> Result<()> {
        if other.local_length() != self.local_length() {
            return Err(CoreError::DimensionMismatch {
                expected: self.local_length(),
                actual: other.local_length(),
            });
        }
        if other.num_vectors() != self.num_vectors() {
            return Err(CoreError::DimensionMismatch {
                expected: self.num_vectors(),
                actual: other.num_vectors(),
            });
        }
        Ok(())
    }
}

/// Inner products and norms over the processes of a map.
#[derive(Clone, Copy)]
pub struct VectorSpace<'a> {
    comm: &'a dyn Communicator,
}

impl<'a> VectorSpace<'a> {
    /// Reductions over the communicator of `map`.
    pub fn new(map: &'a dyn IndexMap) -> Self {
        Self { comm: map.comm() }
    }

    /// Global dot product of two local slices.
    pub fn dot(&self, x: &[f64], y: &[f64]) -> f64 {
        let mut value = [local_dot(x, y)];
        self.comm.sum_all(&mut value);
        value[0]
    }

    /// Global 2-norm of a local slice.
    pub fn norm(&self, x: &[f64]) -> f64 {
        self.dot(x, x).max(0.0).sqrt()
    }

    /// Column-wise dot products `a_j · b_j`.
    pub fn dots(&self, a: &MultiVector, b: &MultiVector) -> Result<Vec<f64>> {
        a.check_shape(b)?;
        let mut values: Vec<f64> = (0..a.num_vectors())
            .map(|j| local_dot(a.column(j), b.column(j)))
            .collect();
        self.comm.sum_all(&mut values);
        Ok(values)
    }

    /// Column-wise 2-norms.
    pub fn norms(&self, a: &MultiVector) -> Vec<f64> {
        let mut values: Vec<f64> = (0..a.num_vectors())
            .map(|j| a.as_matrix().column(j).norm_squared())
            .collect();
        self.comm.sum_all(&mut values);
        values.into_iter().map(|v| v.max(0.0).sqrt()).collect()
    }

    /// Coefficients of `w` against the first `count` columns of `basis`.
    pub fn project(&self, basis: &DMatrix<f64>, count: usize, w: &DVector<f64>) -> DVector<f64> {
        let mut coeffs = basis.columns(0, count).tr_mul(w);
        self.comm.sum_all(coeffs.as_mut_slice());
        coeffs
    }

    /// The underlying communicator.
    pub fn comm(&self) -> &'a dyn Communicator {
        self.comm
    }
}

fn local_dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(&a, &b)| a * b).sum()
}
