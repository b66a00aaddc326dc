//! Error types for index spaces, multivectors and operators.

use thiserror::Error;

/// Errors raised by the collaborator types in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Sizes of two objects that must agree do not.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A column index outside the multivector was requested.
    #[error("Column {index} out of range for {num_vectors} vectors")]
    ColumnOutOfRange { index: usize, num_vectors: usize },

    /// A sparse matrix could not be assembled from its triplets.
    #[error("Invalid triplets: {0}")]
    InvalidTriplets(String),

    /// Operator construction received an argument it cannot use.
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
