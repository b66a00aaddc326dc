//! Deflation bookkeeping for a block of right-hand sides.
//!
//! Columns that converge are masked at once: the solver stops extending their
//! Krylov bases and their solution is frozen. Masked columns stay in the
//! working block until a deflation quorum has accumulated, then they are
//! compacted out together in one pass. The tracker records which columns were
//! removed in which pass.
//!
//! # Example
//!
//! ```
//! use pbgmres_solver::deflation::{ColumnStatus, DeflationTracker};
//!
//! let mut tracker = DeflationTracker::new(4, 2);
//!
//! tracker.mark_converged(1, 3);
//! assert_eq!(tracker.status(1), ColumnStatus::Converged);
//! assert!(!tracker.deflation_due(4));
//!
//! tracker.mark_converged(3, 5);
//! assert!(tracker.deflation_due(4));
//!
//! let event = tracker.take_pending(5).unwrap();
//! assert_eq!(event.columns, vec![1, 3]);
//! assert_eq!(tracker.active_indices(), vec![0, 2]);
//! ```

use serde::Serialize;

/// Status of one right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnStatus {
    /// Still iterating.
    Active,
    /// Converged; the solution column is frozen.
    Converged,
}

impl ColumnStatus {
    /// Returns true if the column needs more iterations.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, ColumnStatus::Active)
    }

    /// Returns true if the column has converged.
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, ColumnStatus::Converged)
    }
}

/// One compaction pass over the working block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeflationEvent {
    /// Total iteration count when the pass ran.
    pub iteration: usize,
    /// Right-hand-side columns removed, in ascending order.
    pub columns: Vec<usize>,
}

/// Tracks the active/converged partition of all right-hand sides.
#[derive(Debug, Clone)]
pub struct DeflationTracker {
    status: Vec<ColumnStatus>,
    iterations: Vec<usize>,
    converged_at: Vec<Option<usize>>,
    /// Masked columns still occupying the working block.
    pending: Vec<usize>,
    quorum: usize,
    active_count: usize,
    events: Vec<DeflationEvent>,
}

impl DeflationTracker {
    /// Tracker for `num_columns` right-hand sides, all active.
    pub fn new(num_columns: usize, quorum: usize) -> Self {
        Self {
            status: vec![ColumnStatus::Active; num_columns],
            iterations: vec![0; num_columns],
            converged_at: vec![None; num_columns],
            pending: Vec::new(),
            quorum: quorum.max(1),
            active_count: num_columns,
            events: Vec::new(),
        }
    }

    /// Total number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.status.len()
    }

    /// Number of columns still active.
    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Number of converged columns.
    pub fn converged_count(&self) -> usize {
        self.status.len() - self.active_count
    }

    /// Check if every column has converged.
    #[inline]
    pub fn all_converged(&self) -> bool {
        self.active_count == 0
    }

    /// Status of `column`.
    #[inline]
    pub fn status(&self, column: usize) -> ColumnStatus {
        self.status[column]
    }

    /// Arnoldi steps taken by `column`.
    #[inline]
    pub fn iterations(&self, column: usize) -> usize {
        self.iterations[column]
    }

    /// Arnoldi steps taken by every column.
    pub fn all_iterations(&self) -> &[usize] {
        &self.iterations
    }

    /// Total iteration count at which `column` converged.
    pub fn converged_at(&self, column: usize) -> Option<usize> {
        self.converged_at[column]
    }

    /// Count one Arnoldi step for an active column.
    pub fn increment_iteration(&mut self, column: usize) -> usize {
        debug_assert!(self.status[column].is_active());
        self.iterations[column] += 1;
        self.iterations[column]
    }

    /// Mark `column` as converged at total iteration `iteration` and queue it
    /// for compaction.
    ///
    /// Returns true if the column was previously active.
    pub fn mark_converged(&mut self, column: usize, iteration: usize) -> bool {
        if self.status[column].is_active() {
            self.status[column] = ColumnStatus::Converged;
            self.converged_at[column] = Some(iteration);
            self.active_count -= 1;
            self.pending.push(column);
            true
        } else {
            false
        }
    }

    /// Masked columns not yet compacted.
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    /// Whether enough masked columns have accumulated in a working block of
    /// `working_width` columns to compact it.
    ///
    /// A quorum larger than the block means the whole block.
    pub fn deflation_due(&self, working_width: usize) -> bool {
        !self.pending.is_empty() && self.pending.len() >= self.quorum.min(working_width)
    }

    /// Record a compaction pass for every pending column.
    pub fn take_pending(&mut self, iteration: usize) -> Option<DeflationEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let mut columns = std::mem::take(&mut self.pending);
        columns.sort_unstable();
        let event = DeflationEvent { iteration, columns };
        self.events.push(event.clone());
        Some(event)
    }

    /// Every compaction pass so far.
    pub fn events(&self) -> &[DeflationEvent] {
        &self.events
    }

    /// Get indices of all active columns.
    pub fn active_indices(&self) -> Vec<usize> {
        self.status
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active())
            .map(|(i, _)| i)
            .collect()
    }

    /// Get indices of all converged columns.
    pub fn converged_indices(&self) -> Vec<usize> {
        self.status
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_converged())
            .map(|(i, _)| i)
            .collect()
    }

    /// Summary statistics.
    pub fn summary(&self) -> DeflationSummary {
        let mut total_iterations = 0usize;
        let mut max_iterations = 0usize;
        for (i, &status) in self.status.iter().enumerate() {
            if status.is_converged() {
                total_iterations += self.iterations[i];
                max_iterations = max_iterations.max(self.iterations[i]);
            }
        }

        let converged = self.converged_count();
        let average_iterations = if converged > 0 {
            total_iterations as f64 / converged as f64
        } else {
            0.0
        };

        DeflationSummary {
            total_columns: self.num_columns(),
            converged_count: converged,
            active_count: self.active_count,
            deflation_passes: self.events.len(),
            average_iterations,
            max_iterations,
        }
    }
}

/// Summary statistics about deflation.
#[derive(Debug, Clone, Serialize)]
pub struct DeflationSummary {
    /// Number of right-hand sides.
    pub total_columns: usize,
    /// Number that converged.
    pub converged_count: usize,
    /// Number still active.
    pub active_count: usize,
    /// Number of compaction passes.
    pub deflation_passes: usize,
    /// Average Arnoldi steps of converged columns.
    pub average_iterations: f64,
    /// Maximum Arnoldi steps among converged columns.
    pub max_iterations: usize,
}

impl std::fmt::Display for DeflationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let percent = if self.total_columns > 0 {
            100.0 * self.converged_count as f64 / self.total_columns as f64
        } else {
            100.0
        };
        write!(
            f,
            "Converged: {}/{} ({:.1}%), Deflation passes: {}, Avg iterations: {:.1}",
            self.converged_count,
            self.total_columns,
            percent,
            self.deflation_passes,
            self.average_iterations
        )
    }
}
