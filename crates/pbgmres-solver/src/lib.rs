//! Restarted pseudo-block GMRES with deflation.
//!
//! This crate provides:
//! - A linear problem wrapper ([`LinearProblem`]) validating operator and block layout
//! - Solver configuration with `with_*` builders ([`SolverConfig`])
//! - The solver manager ([`PseudoBlockGmresSolver`]) solving many right-hand sides
//!   at once, deflating converged ones and restarting when the basis is full
//! - Progress hooks ([`SolveObserver`]) and a serializable [`SolveReport`]

pub mod config;
pub mod deflation;
pub mod error;
pub mod gmres;
pub mod manager;
pub mod problem;
pub mod report;
pub mod status;

pub use config::{ResidualScaling, SolverConfig, Verbosity};
pub use deflation::{ColumnStatus, DeflationEvent, DeflationSummary, DeflationTracker};
pub use error::{Result, SolverError};
pub use manager::{PseudoBlockGmresSolver, SolverState};
pub use problem::LinearProblem;
pub use report::{
    IterationInfo, NoopObserver, ReturnType, SolveObserver, SolveReport, Termination,
};
pub use status::ResidualTest;
