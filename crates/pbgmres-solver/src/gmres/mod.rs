//! Building blocks of the pseudo-block GMRES iteration.
//!
//! Every right-hand side owns an independent Krylov space; the solver manager
//! batches the operator applications across the active columns and drives
//! these pieces column by column.
//!
//! # Module Structure
//!
//! - [`arnoldi`] - Orthonormal basis construction with reorthogonalization
//! - [`lsq`] - Incremental Givens least-squares solve
//! - [`column`] - Krylov state of one right-hand side
//! - [`helpers`] - Givens rotation utilities

pub mod arnoldi;
pub mod column;
pub mod helpers;
pub mod lsq;

pub use arnoldi::{ArnoldiBasis, ArnoldiStep};
pub use column::KrylovColumn;
pub use lsq::GivensLeastSquares;
