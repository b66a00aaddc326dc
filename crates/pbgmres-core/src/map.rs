//! Distributed index spaces.
//!
//! An [`IndexMap`] describes how the rows of a distributed vector or matrix are
//! partitioned across processes. The solvers only ever query a map; they never
//! build or modify one.
//!
//! Every reduction on a [`Communicator`] is a blocking collective: all processes
//! sharing the communicator must make the same calls in the same order.

use std::fmt;
use std::sync::Arc;

/// Collective communication used by reductions over distributed vectors.
pub trait Communicator: Send + Sync {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of processes in the communicator.
    fn size(&self) -> usize;

    /// Block until every process reaches this point.
    fn barrier(&self);

    /// Replace each entry with its sum over all processes.
    fn sum_all(&self, values: &mut [f64]);

    /// Replace each entry with its maximum over all processes.
    fn max_all(&self, values: &mut [f64]);
}

/// Communicator for a single process. Reductions leave values untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn sum_all(&self, _values: &mut [f64]) {}

    fn max_all(&self, _values: &mut [f64]) {}
}

/// Read-only description of a distributed index space.
///
/// Global indices include the map's index base; local indices always start at 0.
pub trait IndexMap: Send + Sync {
    /// Number of elements across all processes.
    fn global_num_elements(&self) -> usize;

    /// Number of elements owned by the calling process.
    fn local_num_elements(&self) -> usize;

    /// Smallest global index that may appear in the map.
    fn index_base(&self) -> usize;

    /// Smallest global index owned by the calling process, if any.
    fn min_global_index(&self) -> Option<usize>;

    /// Largest global index owned by the calling process, if any.
    fn max_global_index(&self) -> Option<usize>;

    /// Smallest global index over all processes.
    fn min_all_global_index(&self) -> Option<usize>;

    /// Largest global index over all processes.
    fn max_all_global_index(&self) -> Option<usize>;

    /// Translate a global index to a local one, if it is owned here.
    fn local_index(&self, global: usize) -> Option<usize>;

    /// Translate a local index to its global index.
    fn global_index(&self, local: usize) -> Option<usize>;

    /// Whether the global index is owned by the calling process.
    fn is_local_global_index(&self, global: usize) -> bool {
        self.local_index(global).is_some()
    }

    /// Whether the local index is valid on the calling process.
    fn is_local_index(&self, local: usize) -> bool {
        local < self.local_num_elements()
    }

    /// Whether each process owns one contiguous range of global indices.
    fn is_contiguous(&self) -> bool;

    /// Whether the elements are spread over more than one process.
    fn is_distributed(&self) -> bool;

    /// Whether `other` describes exactly the same partition.
    fn is_same_as(&self, other: &dyn IndexMap) -> bool;

    /// Communicator over which this map is distributed.
    fn comm(&self) -> &dyn Communicator;
}

/// Uniform contiguous partition of `base..base + global` across processes.
///
/// The first `global % size` processes own one extra element.
#[derive(Clone)]
pub struct ContiguousMap {
    global: usize,
    base: usize,
    first: usize,
    local: usize,
    comm: Arc<dyn Communicator>,
}

impl ContiguousMap {
    /// Partition `global` elements over the processes of `comm`.
    pub fn new(global: usize, base: usize, comm: Arc<dyn Communicator>) -> Self {
        let size = comm.size().max(1);
        let rank = comm.rank();
        let chunk = global / size;
        let extra = global % size;
        let local = chunk + usize::from(rank < extra);
        let first = rank * chunk + rank.min(extra);

        Self {
            global,
            base,
            first,
            local,
            comm,
        }
    }

    /// Map with every element on a single process, based at 0.
    pub fn serial(global: usize) -> Self {
        Self::new(global, 0, Arc::new(SerialComm))
    }

    /// Shared handle to the communicator.
    pub fn comm_handle(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }
}

impl IndexMap for ContiguousMap {
    fn global_num_elements(&self) -> usize {
        self.global
    }

    fn local_num_elements(&self) -> usize {
        self.local
    }

    fn index_base(&self) -> usize {
        self.base
    }

    fn min_global_index(&self) -> Option<usize> {
        (self.local > 0).then(|| self.base + self.first)
    }

    fn max_global_index(&self) -> Option<usize> {
        (self.local > 0).then(|| self.base + self.first + self.local - 1)
    }

    fn min_all_global_index(&self) -> Option<usize> {
        (self.global > 0).then_some(self.base)
    }

    fn max_all_global_index(&self) -> Option<usize> {
        (self.global > 0).then(|| self.base + self.global - 1)
    }

    fn local_index(&self, global: usize) -> Option<usize> {
        let offset = global.checked_sub(self.base + self.first)?;
        (offset < self.local).then_some(offset)
    }

    fn global_index(&self, local: usize) -> Option<usize> {
        (local < self.local).then(|| self.base + self.first + local)
    }

    fn is_contiguous(&self) -> bool {
        true
    }

    fn is_distributed(&self) -> bool {
        self.comm.size() > 1 && self.local != self.global
    }

    fn is_same_as(&self, other: &dyn IndexMap) -> bool {
        self.global == other.global_num_elements()
            && self.local == other.local_num_elements()
            && self.base == other.index_base()
            && other.is_contiguous()
            && self.min_global_index() == other.min_global_index()
            && self.comm.size() == other.comm().size()
    }

    fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }
}

impl fmt::Debug for ContiguousMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContiguousMap")
            .field("global", &self.global)
            .field("base", &self.base)
            .field("first", &self.first)
            .field("local", &self.local)
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .finish()
    }
}

impl fmt::Display for ContiguousMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContiguousMap: {} global elements, {} local on rank {}/{}, index base {}",
            self.global,
            self.local,
            self.comm.rank(),
            self.comm.size(),
            self.base
        )
    }
}
