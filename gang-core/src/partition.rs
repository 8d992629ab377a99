//! Partition state (§3 Partition): an ordered job list, the shadow set, and
//! the active row those jobs and shadows are currently seated in.

use crate::collaborators::Bits;
use crate::job::Job;

/// A reference to a job owned by a higher-priority partition. Deliberately
/// an index/id pair rather than a borrow or `Rc`: the owning partition can
/// freely remove the job (releasing it) and the only lifetime invariant
/// left to uphold is that `shadow::clear` runs before that removal, which
/// `remove_job_from_partition` guarantees (see DESIGN.md for the rejected
/// owning-reference alternative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowRef {
    pub owner_partition: usize,
    pub job_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ActiveRow {
    pub resmap: Option<Bits>,
    /// Dense, width equal to `resmap`'s (one entry per bit of the domain),
    /// unlike a job's own compact `cpu_vector` which is aligned to its set
    /// bits only.
    pub cpu_vector: Option<Vec<u16>>,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub priority: u16,
    pub jobs: Vec<Job>,
    pub shadows: Vec<ShadowRef>,
    pub active: ActiveRow,
}

impl Partition {
    pub fn new(name: String, priority: u16) -> Self {
        Partition { name, priority, jobs: Vec::new(), shadows: Vec::new(), active: ActiveRow::default() }
    }

    pub fn find_job_index(&self, id: u32) -> Option<usize> {
        self.jobs.iter().position(|j| j.id == id)
    }
}
