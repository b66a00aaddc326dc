//! Error types for the solver crate.

use thiserror::Error;

/// Errors that stop a solve before it starts.
///
/// Running out of iterations or restarts, and orthogonalization breakdown, are
/// not errors: they are reported through [`crate::SolveReport`] together with the
/// best solution found.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The linear problem is malformed or inconsistently partitioned.
    #[error("Linear problem is not set up correctly: {0}")]
    SetupInvalid(String),

    /// A configuration value is out of range.
    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// An option name was not recognised.
    #[error("Unknown residual scaling: {0:?}")]
    UnknownScaling(String),

    /// Error from the vector or operator layer.
    #[error("Core error: {0}")]
    Core(#[from] pbgmres_core::CoreError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
