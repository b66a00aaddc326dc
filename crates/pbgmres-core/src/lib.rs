//! Collaborator abstractions consumed by the pbgmres solvers.
//!
//! This crate provides:
//! - A read-only distributed index space ([`IndexMap`]) and its communicator
//! - Owned column blocks of vectors ([`MultiVector`]) with collective reductions ([`VectorSpace`])
//! - Linear operators acting on vectors and blocks ([`LinearOperator`])
//! - A small gallery of test operators

pub mod error;
pub mod gallery;
pub mod map;
pub mod multivec;
pub mod operator;
pub mod sparse_operator;

pub use error::{CoreError, Result};
pub use map::{Communicator, ContiguousMap, IndexMap, SerialComm};
pub use multivec::{MultiVector, VectorSpace};
pub use operator::{DenseOperator, LinearOperator};
pub use sparse_operator::SparseOperator;
