//! The fit engine (§4.D): decides whether a job can join a partition's
//! active row without overcommitting physical resources, and folds a job
//! into that row once it has been decided to seat it.

use crate::granularity::Granularity;
use crate::partition::ActiveRow;
use crate::phys::PhysResTable;
use crate::resmap::{bits_and, bits_copy_from, bits_or_assign, popcount, ResourceView};

/// `fits(j, q)`.
pub fn fits(job: ResourceView<'_>, active: &ActiveRow, granularity: Granularity, phys: &PhysResTable) -> bool {
    let Some(active_bits) = active.resmap.as_ref() else { return true };
    if active.count == 0 {
        return true;
    }

    let overlap = bits_and(job.resmap, active_bits);
    if popcount(&overlap) == 0 {
        return true;
    }

    if !granularity.carries_cpu_vector() {
        return false;
    }

    can_cpus_fit(job, active_bits, active, &overlap, phys)
}

fn can_cpus_fit(
    job: ResourceView<'_>,
    active_bits: &crate::collaborators::Bits,
    active: &ActiveRow,
    overlap: &crate::collaborators::Bits,
    phys: &PhysResTable,
) -> bool {
    let active_cpus = active.cpu_vector.as_deref();
    let job_cpus = job.cpu_vector.expect("carries_cpu_vector implies job.cpu_vector is Some");

    let mut a = 0usize;
    for i in 0..active_bits.len() {
        if overlap[i] {
            let active_count = active_cpus.map(|v| v[i]).unwrap_or(0);
            if active_count + job_cpus[a] > phys.cap(i) {
                return false;
            }
        }
        if job.resmap[i] {
            a += 1;
        }
    }
    true
}

/// `add_to_active(j, q)`.
pub fn add_to_active(job: ResourceView<'_>, active: &mut ActiveRow, granularity: Granularity, phys: &PhysResTable) {
    match active.resmap.as_mut() {
        None => {
            active.resmap = Some(job.resmap.clone());
        }
        Some(bits) if active.count == 0 => {
            bits_copy_from(bits, job.resmap);
        }
        Some(bits) => {
            bits_or_assign(bits, job.resmap);
        }
    }

    if granularity.carries_cpu_vector() {
        let sz = active.resmap.as_ref().unwrap().len();
        if active.cpu_vector.is_none() {
            active.cpu_vector = Some(vec![0u16; sz]);
        }
        let cpu_vector = active.cpu_vector.as_mut().unwrap();
        let job_cpus = job.cpu_vector.expect("carries_cpu_vector implies job.cpu_vector is Some");

        let mut a = 0usize;
        if active.count == 0 {
            for i in 0..sz {
                cpu_vector[i] = if job.resmap[i] {
                    let v = job_cpus[a];
                    a += 1;
                    v
                } else {
                    0
                };
            }
        } else {
            for i in 0..sz {
                if job.resmap[i] {
                    let cap = phys.cap(i);
                    cpu_vector[i] = cpu_vector[i].saturating_add(job_cpus[a]).min(cap);
                    a += 1;
                }
            }
        }
    }

    active.count += 1;
}
