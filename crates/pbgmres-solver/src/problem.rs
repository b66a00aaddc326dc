//! The linear system `A X = B` handed to a solver.

use pbgmres_core::{IndexMap, LinearOperator, MultiVector, VectorSpace};

use crate::error::{Result, SolverError};

/// Operator, solution block and right-hand-side block of a linear system.
///
/// The operator is borrowed; the solution and right-hand-side blocks are owned.
/// A solver updates the solution block in place. Call [`set_problem`](Self::set_problem)
/// (or let the solver do it) before solving.
pub struct LinearProblem<'a> {
    op: &'a dyn LinearOperator,
    lhs: MultiVector,
    rhs: MultiVector,
    is_set: bool,
}

impl<'a> LinearProblem<'a> {
    /// Bundle an operator with an initial guess and right-hand sides.
    pub fn new(op: &'a dyn LinearOperator, lhs: MultiVector, rhs: MultiVector) -> Self {
        Self {
            op,
            lhs,
            rhs,
            is_set: false,
        }
    }

    /// Validate the partitioning of every piece.
    ///
    /// The solution and right-hand-side blocks must have the operator's local row
    /// count and the same, non-zero number of columns, and the operator must agree
    /// with its own row map.
    pub fn set_problem(&mut self) -> Result<()> {
        self.is_set = false;

        let n = self.op.dim();
        let map = self.op.row_map();
        if map.local_num_elements() != n {
            return Err(SolverError::SetupInvalid(format!(
                "operator has {} local rows but its row map owns {}",
                n,
                map.local_num_elements()
            )));
        }
        if self.lhs.local_length() != n {
            return Err(SolverError::SetupInvalid(format!(
                "solution block has {} rows, operator has {}",
                self.lhs.local_length(),
                n
            )));
        }
        if self.rhs.local_length() != n {
            return Err(SolverError::SetupInvalid(format!(
                "right-hand-side block has {} rows, operator has {}",
                self.rhs.local_length(),
                n
            )));
        }
        if self.lhs.num_vectors() != self.rhs.num_vectors() {
            return Err(SolverError::SetupInvalid(format!(
                "solution block has {} columns, right-hand-side block has {}",
                self.lhs.num_vectors(),
                self.rhs.num_vectors()
            )));
        }
        if self.rhs.num_vectors() == 0 {
            return Err(SolverError::SetupInvalid(
                "no right-hand sides to solve".into(),
            ));
        }

        self.is_set = true;
        Ok(())
    }

    /// Whether the last call to [`set_problem`](Self::set_problem) succeeded.
    pub fn is_set(&self) -> bool {
        self.is_set
    }

    /// The operator.
    pub fn operator(&self) -> &'a dyn LinearOperator {
        self.op
    }

    /// Row partition shared by the operator and both blocks.
    pub fn map(&self) -> &'a dyn IndexMap {
        self.op.row_map()
    }

    /// Reductions over the problem's communicator.
    pub fn space(&self) -> VectorSpace<'a> {
        VectorSpace::new(self.op.row_map())
    }

    /// Current solution block.
    pub fn lhs(&self) -> &MultiVector {
        &self.lhs
    }

    /// Right-hand-side block.
    pub fn rhs(&self) -> &MultiVector {
        &self.rhs
    }

    /// Number of right-hand sides.
    pub fn num_rhs(&self) -> usize {
        self.rhs.num_vectors()
    }

    pub(crate) fn lhs_mut(&mut self) -> &mut MultiVector {
        &mut self.lhs
    }

    /// Replace the initial guess. The problem must be set up again.
    pub fn set_lhs(&mut self, lhs: MultiVector) {
        self.lhs = lhs;
        self.is_set = false;
    }

    /// Replace the right-hand sides. The problem must be set up again.
    pub fn set_rhs(&mut self, rhs: MultiVector) {
        self.rhs = rhs;
        self.is_set = false;
    }

    /// `R = B - A X` for the selected columns.
    pub fn residual(&self, x: &MultiVector, columns: &[usize]) -> Result<MultiVector> {
        let b = self.rhs.subset(columns)?;
        let mut r = MultiVector::zeros(x.local_length(), x.num_vectors());
        self.op.apply_block(x, &mut r);
        r.update(1.0, &b, -1.0)?;
        Ok(r)
    }

    /// Norms of `B - A X` for every column of the current solution.
    pub fn residual_norms(&self) -> Result<Vec<f64>> {
        let all: Vec<usize> = (0..self.num_rhs()).collect();
        let r = self.residual(&self.lhs, &all)?;
        Ok(self.space().norms(&r))
    }

    /// Give back the solution and right-hand-side blocks.
    pub fn into_parts(self) -> (MultiVector, MultiVector) {
        (self.lhs, self.rhs)
    }
}
