//! The row updater (§4.F): rebuilds a partition's active row in a
//! deterministic phase order (shadows, then actives, then fillers, then new
//! jobs), and the rotation step that drives the round-robin gang schedule.
//!
//! Every phase here mutates only the partition at `idx`'s own jobs/active
//! fields first, then applies any resulting shadow cast/clear against the
//! full partition slice afterwards. This ordering exists because
//! `shadow::cast`/`shadow::clear` need `&mut [Partition]` (they touch every
//! other partition) while the per-job fit walk needs simultaneous
//! `&mut Vec<Job>` and `&mut ActiveRow` borrows of the *same* partition;
//! Rust cannot prove those borrows are disjoint from a further borrow of
//! the whole slice, so each phase collects (job_id, action) lists and only
//! touches `partitions` as a whole once that phase's own borrow has ended.
//! Deferring is semantically transparent: casts/clears from partition
//! `idx`'s own phase are never read back within the same `rebuild` call.

use log::debug;

use crate::collaborators::ClusterView;
use crate::error::SignalOp;
use crate::fit;
use crate::granularity::Granularity;
use crate::job::{RowState, SigState};
use crate::partition::Partition;
use crate::phys::PhysResTable;
use crate::resmap::ResourceView;
use crate::shadow;

fn emit_signals(collab: &dyn ClusterView, signals: &[(u32, SignalOp)]) {
    for (id, op) in signals {
        let result = match op {
            SignalOp::Suspend => collab.suspend(*id),
            SignalOp::Resume => collab.resume(*id),
        };
        if let Err(reason) = result {
            log::warn!("{op} signal for job {id} failed: {reason} (state advanced as if it succeeded)");
        }
    }
}

/// Phase 2: shadows never fail the fit test; they may overcommit the CPU
/// vector, absorbed by the clamp in `fit::add_to_active`.
fn apply_shadows(partitions: &mut [Partition], idx: usize, granularity: Granularity, phys: &PhysResTable) {
    let shadow_refs = partitions[idx].shadows.clone();
    let mut snapshots = Vec::with_capacity(shadow_refs.len());
    for s in &shadow_refs {
        if let Some(job) = partitions.get(s.owner_partition).and_then(|q| q.jobs.iter().find(|j| j.id == s.job_id)) {
            snapshots.push((job.resmap.bits().clone(), job.resmap.cpu_vector().map(|v| v.to_vec())));
        }
    }
    let active = &mut partitions[idx].active;
    for (bits, cpu) in &snapshots {
        let view = ResourceView { resmap: bits, cpu_vector: cpu.as_deref() };
        fit::add_to_active(view, active, granularity, phys);
    }
}

/// Phases 3/4: walk jobs already seated (`Active` then `Filler`), keeping
/// what still fits and suspending/unseating what no longer does.
fn process_seated_phase(
    partitions: &mut [Partition],
    idx: usize,
    granularity: Granularity,
    phys: &PhysResTable,
    filter_state: RowState,
) -> (Vec<(u32, SignalOp)>, Vec<u32>, Vec<u32>) {
    let p = &mut partitions[idx];
    let Partition { jobs, active, .. } = p;

    let mut signals = Vec::new();
    let mut to_cast = Vec::new();
    let mut to_clear = Vec::new();

    for job in jobs.iter_mut().filter(|j| j.row_state == filter_state) {
        if fit::fits(job.view(), active, granularity, phys) {
            fit::add_to_active(job.view(), active, granularity, phys);
            to_cast.push(job.id);
        } else {
            if job.sig_state == SigState::Running {
                signals.push((job.id, SignalOp::Suspend));
                job.sig_state = SigState::Suspended;
            }
            to_clear.push(job.id);
            job.row_state = RowState::NotActive;
        }
    }

    (signals, to_cast, to_clear)
}

/// Phase 5: admit `NotActive` jobs as fillers in list order.
fn process_admission_phase(
    partitions: &mut [Partition],
    idx: usize,
    granularity: Granularity,
    phys: &PhysResTable,
) -> (Vec<(u32, SignalOp)>, Vec<u32>) {
    let p = &mut partitions[idx];
    let Partition { jobs, active, .. } = p;

    let mut signals = Vec::new();
    let mut to_cast = Vec::new();

    for job in jobs.iter_mut().filter(|j| j.row_state == RowState::NotActive) {
        if fit::fits(job.view(), active, granularity, phys) {
            fit::add_to_active(job.view(), active, granularity, phys);
            job.row_state = RowState::Filler;
            to_cast.push(job.id);
            if job.sig_state == SigState::Suspended {
                signals.push((job.id, SignalOp::Resume));
                job.sig_state = SigState::Running;
            }
        }
    }

    (signals, to_cast)
}

/// `rebuild(q, admit_new)` (§4.F).
pub fn rebuild(
    partitions: &mut [Partition],
    idx: usize,
    admit_new: bool,
    granularity: Granularity,
    phys: &PhysResTable,
    collab: &dyn ClusterView,
) {
    partitions[idx].active.count = 0;
    apply_shadows(partitions, idx, granularity, phys);

    let priority = partitions[idx].priority;

    let (signals, to_cast, to_clear) = process_seated_phase(partitions, idx, granularity, phys, RowState::Active);
    emit_signals(collab, &signals);
    for id in &to_cast {
        shadow::cast(partitions, idx, *id, priority);
    }
    for id in &to_clear {
        shadow::clear(partitions, *id);
    }

    let (signals, to_cast, to_clear) = process_seated_phase(partitions, idx, granularity, phys, RowState::Filler);
    emit_signals(collab, &signals);
    for id in &to_cast {
        shadow::cast(partitions, idx, *id, priority);
    }
    for id in &to_clear {
        shadow::clear(partitions, *id);
    }

    if admit_new {
        let (signals, to_cast) = process_admission_phase(partitions, idx, granularity, phys);
        emit_signals(collab, &signals);
        for id in &to_cast {
            shadow::cast(partitions, idx, *id, priority);
        }
    }

    debug!("rebuilt partition '{}': {:?}", partitions[idx].name, partitions[idx]);
}

/// Stable-sort partitions by priority descending (`sort_partitions`).
pub fn sort_partitions(partitions: &[Partition]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..partitions.len()).collect();
    indices.sort_by(|&a, &b| partitions[b].priority.cmp(&partitions[a].priority));
    indices
}

/// `rebuild_all()`: higher-priority partitions are rebuilt first so their
/// jobs' shadows exist before lower partitions evaluate fit. Returns the
/// sorted index order so the caller can cache it as `sorted_partitions`.
pub fn rebuild_all(
    partitions: &mut Vec<Partition>,
    granularity: Granularity,
    phys: &PhysResTable,
    collab: &dyn ClusterView,
) -> Vec<usize> {
    let sorted = sort_partitions(partitions);
    for &idx in &sorted {
        rebuild(partitions, idx, true, granularity, phys, collab);
    }
    sorted
}

/// `cycle` steps 1-2: move active jobs to the tail, preserving the relative
/// order of both the moved actives and everything left behind. Fillers
/// revert to `NotActive` in place; they do not rotate.
fn rotate_jobs(partitions: &mut [Partition], idx: usize) {
    let jobs = &mut partitions[idx].jobs;
    let mut actives = Vec::with_capacity(jobs.len());
    let mut rest = Vec::with_capacity(jobs.len());
    for mut job in jobs.drain(..) {
        match job.row_state {
            RowState::Active => {
                job.row_state = RowState::NotActive;
                actives.push(job);
            }
            RowState::Filler => {
                job.row_state = RowState::NotActive;
                rest.push(job);
            }
            RowState::NotActive => rest.push(job),
        }
    }
    rest.extend(actives);
    *jobs = rest;
}

/// `cycle(q)` (§4.F): the gang rotation. Active jobs migrate to the tail
/// deterministically so newly enqueued jobs eventually reach the head.
pub fn cycle(partitions: &mut [Partition], idx: usize, granularity: Granularity, phys: &PhysResTable, collab: &dyn ClusterView) {
    rotate_jobs(partitions, idx);

    partitions[idx].active.count = 0;
    apply_shadows(partitions, idx, granularity, phys);

    {
        let p = &mut partitions[idx];
        let Partition { jobs, active, .. } = p;
        for job in jobs.iter_mut() {
            if fit::fits(job.view(), active, granularity, phys) {
                fit::add_to_active(job.view(), active, granularity, phys);
                job.row_state = RowState::Active;
            }
        }
    }

    let priority = partitions[idx].priority;
    let mut to_suspend = Vec::new();
    for job in partitions[idx].jobs.iter_mut() {
        if job.row_state == RowState::NotActive && job.sig_state == SigState::Running {
            to_suspend.push(job.id);
            job.sig_state = SigState::Suspended;
        }
    }
    for id in &to_suspend {
        shadow::clear(partitions, *id);
    }

    let mut to_resume = Vec::new();
    for job in partitions[idx].jobs.iter_mut() {
        if job.row_state == RowState::Active && job.sig_state == SigState::Suspended {
            to_resume.push(job.id);
            job.sig_state = SigState::Running;
        }
    }

    let signals: Vec<(u32, SignalOp)> = to_suspend
        .iter()
        .map(|id| (*id, SignalOp::Suspend))
        .chain(to_resume.iter().map(|id| (*id, SignalOp::Resume)))
        .collect();
    emit_signals(collab, &signals);
    for id in &to_resume {
        shadow::cast(partitions, idx, *id, priority);
    }

    debug!("cycled partition '{}': {:?}", partitions[idx].name, partitions[idx]);
}
