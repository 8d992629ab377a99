//! An in-memory stand-in for the job database, partition registry, node
//! inventory, allocation plugin and RPC layer (spec §1's "external
//! collaborators"). `gang-core` never implements these itself; this is the
//! worked example a real controller binding would replace with its own
//! database/RPC client.

use std::collections::HashMap;

use gang_core::collaborators::{Bits, ExternalJobState, JobSnapshot, NodeInfo, PartitionSnapshot};
use gang_core::ClusterView;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub sockets: u16,
    pub cores_per_socket: u16,
    pub cpus: u16,
}

struct Inner {
    nodes: Vec<FakeNode>,
    partitions: Vec<PartitionSnapshot>,
    jobs: HashMap<u32, JobSnapshot>,
    /// `(job_id, alloc_index, socket_index) -> cores`, queried by `cores_on`.
    core_allocations: HashMap<(u32, usize, u16), u16>,
}

/// A single-process fake of `ClusterView`. All state lives behind one lock;
/// `suspend`/`resume` just flip the tracked external state, mirroring what a
/// real RPC client would eventually converge to once the remote job
/// actually stops or continues.
pub struct FakeCluster {
    inner: Mutex<Inner>,
}

impl FakeCluster {
    pub fn new(nodes: Vec<FakeNode>, partitions: Vec<PartitionSnapshot>) -> Self {
        FakeCluster {
            inner: Mutex::new(Inner { nodes, partitions, jobs: HashMap::new(), core_allocations: HashMap::new() }),
        }
    }

    /// Registers a job as `Running` in `partition`, holding `node_bitmap`,
    /// with `per_node_cores[i]` cores allocated on node `i` of the bitmap
    /// (only consulted for Core/CPU granularity).
    pub fn add_job(&self, id: u32, partition: &str, node_bitmap: Bits, per_node_cores: &[(usize, u16, u16)]) {
        let mut inner = self.inner.lock();
        inner.jobs.insert(
            id,
            JobSnapshot { id, partition: partition.to_string(), state: ExternalJobState::Running, node_bitmap },
        );
        for &(alloc_index, socket_index, cores) in per_node_cores {
            inner.core_allocations.insert((id, alloc_index, socket_index), cores);
        }
    }

    pub fn mark_completed(&self, id: u32) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.state = ExternalJobState::Completed;
        }
    }

    pub fn is_suspended(&self, id: u32) -> bool {
        self.inner.lock().jobs.get(&id).map(|j| j.state == ExternalJobState::Suspended).unwrap_or(false)
    }

    pub fn describe_jobs(&self) -> Vec<(u32, String, ExternalJobState)> {
        let inner = self.inner.lock();
        let mut out: Vec<_> = inner.jobs.values().map(|j| (j.id, j.partition.clone(), j.state)).collect();
        out.sort_by_key(|(id, ..)| *id);
        out
    }
}

impl ClusterView for FakeCluster {
    fn partitions_snapshot(&self) -> Vec<PartitionSnapshot> {
        self.inner.lock().partitions.clone()
    }

    fn jobs_snapshot(&self) -> Vec<JobSnapshot> {
        self.inner.lock().jobs.values().cloned().collect()
    }

    fn cores_on(&self, job_id: u32, alloc_index: usize, socket_index: u16) -> u16 {
        self.inner.lock().core_allocations.get(&(job_id, alloc_index, socket_index)).copied().unwrap_or(0)
    }

    fn node_inventory(&self) -> Vec<NodeInfo> {
        self.inner
            .lock()
            .nodes
            .iter()
            .map(|n| NodeInfo {
                sockets: n.sockets,
                cores_per_socket: n.cores_per_socket,
                cpus: n.cpus,
                configured_sockets: n.sockets,
                configured_cores_per_socket: n.cores_per_socket,
                configured_cpus: n.cpus,
            })
            .collect()
    }

    fn suspend(&self, job_id: u32) -> Result<(), String> {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.state = ExternalJobState::Suspended;
        }
        log::info!("[rpc] suspend job {job_id}");
        Ok(())
    }

    fn resume(&self, job_id: u32) -> Result<(), String> {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.state = ExternalJobState::Running;
        }
        log::info!("[rpc] resume job {job_id}");
        Ok(())
    }
}
