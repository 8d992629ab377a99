//! Shared in-memory `ClusterView` fake for integration tests. Mirrors
//! `gang-cli`'s `fake_cluster` module but lives here too since a dev/test
//! helper has no business depending on the binary crate.

use std::collections::HashMap;
use std::sync::Mutex;

use gang_core::collaborators::{Bits, ExternalJobState, JobSnapshot, NodeInfo, PartitionSnapshot};
use gang_core::ClusterView;

pub struct FakeNode {
    pub sockets: u16,
    pub cores_per_socket: u16,
    pub cpus: u16,
}

pub fn node(sockets: u16, cores_per_socket: u16, cpus: u16) -> FakeNode {
    FakeNode { sockets, cores_per_socket, cpus }
}

pub fn bits(set: &[usize], len: usize) -> Bits {
    let mut b = Bits::repeat(false, len);
    for &i in set {
        b.set(i, true);
    }
    b
}

struct Inner {
    nodes: Vec<FakeNode>,
    partitions: Vec<PartitionSnapshot>,
    jobs: HashMap<u32, JobSnapshot>,
    core_allocations: HashMap<(u32, usize, u16), u16>,
}

pub struct FakeCluster {
    inner: Mutex<Inner>,
}

impl FakeCluster {
    pub fn new(nodes: Vec<FakeNode>, partitions: Vec<PartitionSnapshot>) -> Self {
        FakeCluster {
            inner: Mutex::new(Inner { nodes, partitions, jobs: HashMap::new(), core_allocations: HashMap::new() }),
        }
    }

    pub fn add_job(&self, id: u32, partition: &str, node_bitmap: Bits) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(
            id,
            JobSnapshot { id, partition: partition.to_string(), state: ExternalJobState::Running, node_bitmap },
        );
    }

    pub fn set_core_allocation(&self, job_id: u32, alloc_index: usize, socket_index: u16, cores: u16) {
        self.inner.lock().unwrap().core_allocations.insert((job_id, alloc_index, socket_index), cores);
    }

    pub fn remove_job(&self, id: u32) {
        self.inner.lock().unwrap().jobs.remove(&id);
    }

    pub fn mark_completed(&self, id: u32) {
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(&id) {
            job.state = ExternalJobState::Completed;
        }
    }

    pub fn set_state(&self, id: u32, state: ExternalJobState) {
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(&id) {
            job.state = state;
        }
    }

    pub fn set_partitions(&self, partitions: Vec<PartitionSnapshot>) {
        self.inner.lock().unwrap().partitions = partitions;
    }

    pub fn is_running(&self, id: u32) -> bool {
        self.inner.lock().unwrap().jobs.get(&id).map(|j| j.state == ExternalJobState::Running).unwrap_or(false)
    }

    pub fn is_suspended(&self, id: u32) -> bool {
        self.inner.lock().unwrap().jobs.get(&id).map(|j| j.state == ExternalJobState::Suspended).unwrap_or(false)
    }
}

impl ClusterView for FakeCluster {
    fn partitions_snapshot(&self) -> Vec<PartitionSnapshot> {
        self.inner.lock().unwrap().partitions.clone()
    }

    fn jobs_snapshot(&self) -> Vec<JobSnapshot> {
        self.inner.lock().unwrap().jobs.values().cloned().collect()
    }

    fn cores_on(&self, job_id: u32, alloc_index: usize, socket_index: u16) -> u16 {
        self.inner.lock().unwrap().core_allocations.get(&(job_id, alloc_index, socket_index)).copied().unwrap_or(0)
    }

    fn node_inventory(&self) -> Vec<NodeInfo> {
        self.inner
            .lock()
            .unwrap()
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
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(&job_id) {
            job.state = ExternalJobState::Suspended;
        }
        Ok(())
    }

    fn resume(&self, job_id: u32) -> Result<(), String> {
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(&job_id) {
            job.state = ExternalJobState::Running;
        }
        Ok(())
    }
}
