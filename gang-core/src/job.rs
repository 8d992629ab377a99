//! Per-job scheduler state (§3 Job). A `Job` is created by `job_start` and
//! destroyed by `job_end` or by `scan` observing external completion.

use crate::collaborators::Bits;
use crate::resmap::{Resmap, ResourceView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigState {
    Running,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    NotActive,
    Active,
    Filler,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: u32,
    /// The external per-node allocation bitmap this job's resmap was built
    /// from. Kept around (not just the derived resmap) so `reconfig` can
    /// rebuild the resmap against a new `resmap_size` without re-querying
    /// the job database.
    pub node_bitmap: Bits,
    pub resmap: Resmap,
    pub sig_state: SigState,
    pub row_state: RowState,
}

impl Job {
    pub fn new(id: u32, node_bitmap: Bits, resmap: Resmap) -> Self {
        Job { id, node_bitmap, resmap, sig_state: SigState::Running, row_state: RowState::NotActive }
    }

    pub fn view(&self) -> ResourceView<'_> {
        self.resmap.view()
    }
}
