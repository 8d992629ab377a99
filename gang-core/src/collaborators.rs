//! Narrow interfaces onto everything this crate deliberately treats as an
//! external collaborator: the cluster-wide job database, the partition
//! registry, the node inventory, the allocation plugin that decided initial
//! placement, and the RPC transport that carries suspend/resume. None of
//! that is implemented here; `gang-cli` provides a small in-memory stand-in
//! for manual testing and as a worked example.

use bitvec::order::Lsb0;
use bitvec::vec::BitVec;

pub type Bits = BitVec<usize, Lsb0>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExternalJobState {
    Pending,
    Running,
    Suspended,
    Completing,
    Completed,
}

impl ExternalJobState {
    /// `Completing` and `Completed` both mean "on its way out"; a job
    /// observed in either state by `scan()` is dropped rather than kept
    /// seated.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExternalJobState::Completing | ExternalJobState::Completed)
    }

    /// Not yet started by the controller; `scan()` must not absorb these as
    /// new jobs into a partition.
    pub fn is_pending(self) -> bool {
        matches!(self, ExternalJobState::Pending)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobSnapshot {
    pub id: u32,
    pub partition: String,
    pub state: ExternalJobState,
    /// One bit per node, in the node order `node_inventory` enumerates.
    pub node_bitmap: Bits,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionSnapshot {
    pub name: String,
    pub priority: u16,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeInfo {
    pub sockets: u16,
    pub cores_per_socket: u16,
    pub cpus: u16,
    pub configured_sockets: u16,
    pub configured_cores_per_socket: u16,
    pub configured_cpus: u16,
}

/// Everything this crate needs from the rest of the controller. Implement
/// once against the real job database/RPC layer; `gang-cli` implements it
/// against an in-memory fake.
pub trait ClusterView: Send + Sync {
    fn partitions_snapshot(&self) -> Vec<PartitionSnapshot>;
    fn jobs_snapshot(&self) -> Vec<JobSnapshot>;

    /// Cores held by `job_id` on the `socket_index`-th socket of the node at
    /// position `alloc_index` among the nodes it holds (i.e. `alloc_index`
    /// counts only nodes set in the job's own node bitmap, in node order).
    /// For CPU granularity `socket_index` is always `0` and the return value
    /// is the job's total CPU count on that node.
    fn cores_on(&self, job_id: u32, alloc_index: usize, socket_index: u16) -> u16;

    /// Node inventory in the same order every node bitmap is indexed by.
    fn node_inventory(&self) -> Vec<NodeInfo>;

    /// Fire-and-forget; errors are logged by the caller, never fatal (§7).
    fn suspend(&self, job_id: u32) -> Result<(), String>;
    fn resume(&self, job_id: u32) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_covers_completing_and_completed_only() {
        assert!(!ExternalJobState::Pending.is_terminal());
        assert!(!ExternalJobState::Running.is_terminal());
        assert!(!ExternalJobState::Suspended.is_terminal());
        assert!(ExternalJobState::Completing.is_terminal());
        assert!(ExternalJobState::Completed.is_terminal());
    }

    #[test]
    fn pending_is_only_pending() {
        assert!(ExternalJobState::Pending.is_pending());
        assert!(!ExternalJobState::Running.is_pending());
        assert!(!ExternalJobState::Completing.is_pending());
    }
}
