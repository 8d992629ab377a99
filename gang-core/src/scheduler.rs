//! Lifecycle hooks (§4.H): the boundary between this crate and the
//! controller. `SchedulerState` holds everything protected by the single
//! data lock (§5) and is safe to drive directly in tests without a
//! background thread; `GangScheduler` additionally owns the slicer worker
//! and the separate worker-lifecycle lock that must never be held together
//! with the data lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::collaborators::{Bits, ClusterView, ExternalJobState, JobSnapshot};
use crate::config::Config;
use crate::error::GangError;
use crate::fit;
use crate::granularity::Granularity;
use crate::job::{Job, RowState, SigState};
use crate::partition::Partition;
use crate::phys::PhysResTable;
use crate::resmap;
use crate::row;
use crate::shadow;
use crate::slicer::Slicer;

fn compute_topology(granularity: Granularity, nodes: &[crate::collaborators::NodeInfo]) -> (usize, usize, Vec<u16>) {
    let node_count = nodes.len();
    let sockets_per_node: Vec<u16> = nodes.iter().map(|n| n.sockets).collect();
    let resmap_size = if granularity.bit_domain_is_per_node() {
        node_count
    } else {
        sockets_per_node.iter().map(|&s| s as usize).sum()
    };
    (node_count, resmap_size, sockets_per_node)
}

/// Evaluates the fit test for the job already appended at `job_idx`, seats
/// it (and flips a stale `Suspended` to `Running`) or suspends a stale
/// `Running` that no longer fits. Shared by `add_job_to_partition` and
/// `reconfig`'s job-transfer loop, which both need exactly this single-job
/// seat-or-suspend decision without running the full `rebuild` phase order.
fn seat_or_suspend(
    partitions: &mut [Partition],
    idx: usize,
    job_idx: usize,
    granularity: Granularity,
    phys: &PhysResTable,
    collab: &dyn ClusterView,
) -> bool {
    let p = &mut partitions[idx];
    let Partition { jobs, active, .. } = p;
    let fits = fit::fits(jobs[job_idx].view(), active, granularity, phys);

    if fits {
        fit::add_to_active(jobs[job_idx].view(), active, granularity, phys);
        jobs[job_idx].row_state = RowState::Filler;
        if jobs[job_idx].sig_state == SigState::Suspended {
            let id = jobs[job_idx].id;
            if let Err(reason) = collab.resume(id) {
                warn!("resume signal for job {id} failed: {reason} (state advanced as if it succeeded)");
            }
            jobs[job_idx].sig_state = SigState::Running;
        }
    } else if jobs[job_idx].sig_state == SigState::Running {
        let id = jobs[job_idx].id;
        if let Err(reason) = collab.suspend(id) {
            warn!("suspend signal for job {id} failed: {reason} (state advanced as if it succeeded)");
        }
        jobs[job_idx].sig_state = SigState::Suspended;
    }
    fits
}

/// Everything protected by the data lock (§5): the active granularity and
/// node topology, the physical-resource table, and the partition list.
/// `GangScheduler` is the only thing that wraps this in a `Mutex`; tests
/// drive it directly and synchronously.
#[derive(Debug)]
pub struct SchedulerState {
    granularity: Granularity,
    fast_schedule: bool,
    time_slice_seconds: u64,
    node_count: usize,
    resmap_size: usize,
    sockets_per_node: Vec<u16>,
    phys: PhysResTable,
    partitions: Vec<Partition>,
    sorted_partitions: Vec<usize>,
}

impl SchedulerState {
    /// Builds fresh state from the node inventory and partition registry
    /// (the non-`scan` half of `init`/the topology-rebuild half of
    /// `reconfig`).
    pub fn build(config: &Config, collab: &dyn ClusterView) -> Result<Self, GangError> {
        let nodes = collab.node_inventory();
        let (node_count, resmap_size, sockets_per_node) = compute_topology(config.granularity, &nodes);
        let phys = PhysResTable::load(config.granularity, &nodes, config.fast_schedule);
        let partitions: Vec<Partition> = collab
            .partitions_snapshot()
            .into_iter()
            .map(|p| Partition::new(p.name, p.priority))
            .collect();
        let sorted_partitions = row::sort_partitions(&partitions);

        Ok(SchedulerState {
            granularity: config.granularity,
            fast_schedule: config.fast_schedule,
            time_slice_seconds: config.time_slice_seconds,
            node_count,
            resmap_size,
            sockets_per_node,
            phys,
            partitions,
            sorted_partitions,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn time_slice(&self) -> Duration {
        Duration::from_secs(self.time_slice_seconds)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn find_partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|q| q.name == name)
    }

    /// `add_job_to_partition` (§4.H). Step 1's re-allocation branch reuses
    /// `remove_job_from_partition` verbatim: a job id already tracked is torn
    /// down exactly as `job_end` would tear it down, then re-seated fresh.
    fn add_job_to_partition(&mut self, idx: usize, id: u32, node_bitmap: Bits, collab: &dyn ClusterView) -> Result<(), GangError> {
        if self.partitions[idx].find_job_index(id).is_some() {
            debug!("add_job_to_partition: job {id} already tracked in '{}'; re-allocating", self.partitions[idx].name);
            Self::remove_job_from_partition(&mut self.partitions, idx, id, collab);
            row::rebuild(&mut self.partitions, idx, false, self.granularity, &self.phys, collab);
        }

        let cores_on = |alloc_index: usize, socket_index: u16| collab.cores_on(id, alloc_index, socket_index);
        let resmap = resmap::build(
            id,
            &node_bitmap,
            self.granularity,
            self.node_count,
            self.resmap_size,
            &self.sockets_per_node,
            &cores_on,
        )?;

        self.partitions[idx].jobs.push(Job::new(id, node_bitmap, resmap));
        let job_idx = self.partitions[idx].jobs.len() - 1;
        let priority = self.partitions[idx].priority;

        let fits = seat_or_suspend(&mut self.partitions, idx, job_idx, self.granularity, &self.phys, collab);
        if fits {
            shadow::cast(&mut self.partitions, idx, id, priority);
        }
        Ok(())
    }

    /// `remove_job_from_partition` (§4.H): find by id, clear its shadow
    /// references before it is released, shift the tail down, and resume it
    /// if it was suspended so no suspended job is ever leaked.
    fn remove_job_from_partition(partitions: &mut [Partition], idx: usize, id: u32, collab: &dyn ClusterView) {
        let Some(job_idx) = partitions[idx].find_job_index(id) else { return };
        shadow::clear(partitions, id);
        let job = partitions[idx].jobs.remove(job_idx);
        if job.sig_state == SigState::Suspended {
            if let Err(reason) = collab.resume(job.id) {
                warn!("resume signal for job {} (removed) failed: {reason} (state advanced as if it succeeded)", job.id);
            }
        }
    }

    /// `job_start(job)` (§4.H): best-effort degradation to unmanaged when the
    /// named partition does not exist (`PartitionNotFound`, §7).
    pub fn job_start(&mut self, id: u32, partition_name: &str, node_bitmap: Bits, collab: &dyn ClusterView) -> Result<(), GangError> {
        let Some(idx) = self.partitions.iter().position(|q| q.name == partition_name) else {
            warn!("job_start: partition '{partition_name}' not found for job {id}; running unmanaged");
            return Ok(());
        };

        self.add_job_to_partition(idx, id, node_bitmap, collab)?;

        let entered_running = self.partitions[idx]
            .find_job_index(id)
            .map(|ji| self.partitions[idx].jobs[ji].sig_state == SigState::Running)
            .unwrap_or(false);
        if entered_running {
            self.rebuild_all(collab);
        }
        debug!("job_start: job {id} in '{partition_name}': {:?}", self.partitions[idx]);
        Ok(())
    }

    /// `job_end(job)` (§4.H).
    pub fn job_end(&mut self, id: u32, partition_name: &str, collab: &dyn ClusterView) {
        let Some(idx) = self.partitions.iter().position(|q| q.name == partition_name) else {
            warn!("job_end: partition '{partition_name}' not found for job {id}");
            return;
        };
        Self::remove_job_from_partition(&mut self.partitions, idx, id, collab);
        self.rebuild_all(collab);
    }

    /// `scan()` (§4.H): absorb untracked jobs that are already `Running` or
    /// `Suspended` externally (resuming the latter, on the assumption that a
    /// prior controller failover lost the timeslicer's own state), skip
    /// anything still `Pending`, and drop internal jobs whose external state
    /// has gone terminal (`Completing` or `Completed`) or disappeared
    /// entirely, then `rebuild_all()`.
    pub fn scan(&mut self, collab: &dyn ClusterView) {
        let snapshot = collab.jobs_snapshot();
        let by_id: HashMap<u32, &JobSnapshot> = snapshot.iter().map(|s| (s.id, s)).collect();

        for idx in 0..self.partitions.len() {
            let stale: Vec<u32> = self.partitions[idx]
                .jobs
                .iter()
                .filter(|j| by_id.get(&j.id).map_or(true, |s| s.state.is_terminal()))
                .map(|j| j.id)
                .collect();
            for id in stale {
                debug!("scan: dropping terminated/unknown job {id} from '{}'", self.partitions[idx].name);
                Self::remove_job_from_partition(&mut self.partitions, idx, id, collab);
            }
        }

        for s in &snapshot {
            if s.state.is_terminal() || s.state.is_pending() {
                continue;
            }
            let Some(idx) = self.partitions.iter().position(|q| q.name == s.partition) else {
                continue;
            };
            if self.partitions[idx].find_job_index(s.id).is_some() {
                continue;
            }
            if s.state == ExternalJobState::Suspended {
                debug!("scan: absorbing previously-untracked suspended job {} (assuming a prior failover)", s.id);
                if let Err(reason) = collab.resume(s.id) {
                    warn!("resume signal for newly-absorbed job {} failed: {reason}", s.id);
                }
            }
            if let Err(e) = self.add_job_to_partition(idx, s.id, s.node_bitmap.clone(), collab) {
                error!("scan: failed to absorb job {}: {e}", s.id);
            }
        }

        self.rebuild_all(collab);
    }

    /// `reconfig()` (§4.H): rebuild topology and partition list from the
    /// registry, transfer surviving partitions' jobs in their existing order
    /// with resmaps reconstructed against the new `resmap_size`, resume
    /// everything in a partition that no longer exists, then `scan()` to
    /// pick up newly added partitions and stray jobs.
    pub fn reconfig(&mut self, config: Config, collab: &dyn ClusterView) -> Result<(), GangError> {
        let nodes = collab.node_inventory();
        let (node_count, resmap_size, sockets_per_node) = compute_topology(config.granularity, &nodes);
        let phys = PhysResTable::load(config.granularity, &nodes, config.fast_schedule);

        let old_partitions = std::mem::take(&mut self.partitions);
        let mut new_partitions: Vec<Partition> = collab
            .partitions_snapshot()
            .into_iter()
            .map(|p| Partition::new(p.name, p.priority))
            .collect();

        self.granularity = config.granularity;
        self.fast_schedule = config.fast_schedule;
        self.time_slice_seconds = config.time_slice_seconds;
        self.node_count = node_count;
        self.resmap_size = resmap_size;
        self.sockets_per_node = sockets_per_node;
        self.phys = phys;

        for old_q in old_partitions {
            if let Some(new_idx) = new_partitions.iter().position(|q| q.name == old_q.name) {
                for job in old_q.jobs {
                    let cores_on = |alloc_index: usize, socket_index: u16| collab.cores_on(job.id, alloc_index, socket_index);
                    match resmap::build(
                        job.id,
                        &job.node_bitmap,
                        self.granularity,
                        self.node_count,
                        self.resmap_size,
                        &self.sockets_per_node,
                        &cores_on,
                    ) {
                        Ok(resmap) => {
                            let mut new_job = Job::new(job.id, job.node_bitmap, resmap);
                            // Preserve Running/Suspended across the transfer; §8
                            // property 7 requires no spurious suspend for a job
                            // that is still in the new partition list.
                            new_job.sig_state = job.sig_state;
                            new_partitions[new_idx].jobs.push(new_job);
                        }
                        Err(e) => error!("reconfig: dropping job {} ('{}'): {e}", job.id, old_q.name),
                    }
                }
            } else {
                for job in old_q.jobs {
                    if job.sig_state == SigState::Suspended {
                        if let Err(reason) = collab.resume(job.id) {
                            warn!("resume signal for job {} (partition '{}' removed) failed: {reason}", job.id, old_q.name);
                        }
                    }
                }
            }
        }

        self.partitions = new_partitions;

        for idx in 0..self.partitions.len() {
            let priority = self.partitions[idx].priority;
            for job_idx in 0..self.partitions[idx].jobs.len() {
                let fits = seat_or_suspend(&mut self.partitions, idx, job_idx, self.granularity, &self.phys, collab);
                if fits {
                    let id = self.partitions[idx].jobs[job_idx].id;
                    shadow::cast(&mut self.partitions, idx, id, priority);
                }
            }
        }

        self.scan(collab);
        Ok(())
    }

    /// `rebuild_all()` (§4.F), keeping `sorted_partitions` current.
    pub fn rebuild_all(&mut self, collab: &dyn ClusterView) {
        self.sorted_partitions = row::rebuild_all(&mut self.partitions, self.granularity, &self.phys, collab);
    }

    /// One slicer tick (§4.G): sort partitions, then cycle any partition
    /// that cannot currently seat everything it holds.
    pub fn tick(&mut self, collab: &dyn ClusterView) {
        self.sorted_partitions = row::sort_partitions(&self.partitions);
        for idx in self.sorted_partitions.clone() {
            let everything_seated = {
                let q = &self.partitions[idx];
                (q.active.count as usize) >= q.jobs.len() + q.shadows.len()
            };
            if !everything_seated {
                row::cycle(&mut self.partitions, idx, self.granularity, &self.phys, collab);
            }
        }
    }
}

/// Owns the data lock and, separately, the worker-lifecycle lock (§5). This
/// is the handle a controller binding holds; `gang-cli` drives it directly,
/// and it is the type all six lifecycle hooks are exposed on in production
/// use. Tests that only need the state machine drive `SchedulerState`
/// directly instead, without a background thread.
pub struct GangScheduler {
    state: Arc<Mutex<SchedulerState>>,
    collab: Arc<dyn ClusterView>,
    worker: Mutex<Option<Slicer>>,
}

impl GangScheduler {
    /// `init` (§4.H): build state, absorb already-running jobs via `scan`,
    /// then spawn the slicer.
    pub fn init(config: Config, collab: Arc<dyn ClusterView>) -> Result<Self, GangError> {
        let time_slice = Duration::from_secs(config.time_slice_seconds);
        let state = SchedulerState::build(&config, collab.as_ref())?;
        let state = Arc::new(Mutex::new(state));
        {
            let mut guard = state.lock();
            guard.scan(collab.as_ref());
        }
        let slicer = Slicer::spawn(Arc::clone(&state), Arc::clone(&collab), time_slice);
        Ok(GangScheduler { state, collab, worker: Mutex::new(Some(slicer)) })
    }

    /// `fini` (§4.H): signal shutdown and cooperatively cancel the slicer
    /// (logged, not fatal, if it refuses), then destroy partition state.
    /// The worker-lifecycle lock and the data lock are never held together.
    pub fn fini(&self) {
        let slicer = self.worker.lock().take();
        if let Some(slicer) = slicer {
            if let Err(e) = slicer.shutdown() {
                error!("fini: {e}");
            }
        }
        let mut guard = self.state.lock();
        guard.partitions.clear();
        guard.sorted_partitions.clear();
    }

    pub fn job_start(&self, id: u32, partition_name: &str, node_bitmap: Bits) -> Result<(), GangError> {
        let mut guard = self.state.lock();
        guard.job_start(id, partition_name, node_bitmap, self.collab.as_ref())
    }

    pub fn job_end(&self, id: u32, partition_name: &str) {
        let mut guard = self.state.lock();
        guard.job_end(id, partition_name, self.collab.as_ref());
    }

    pub fn scan(&self) {
        let mut guard = self.state.lock();
        guard.scan(self.collab.as_ref());
    }

    pub fn reconfig(&self, config: Config) -> Result<(), GangError> {
        let mut guard = self.state.lock();
        guard.reconfig(config, self.collab.as_ref())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&SchedulerState) -> R) -> R {
        f(&self.state.lock())
    }
}
