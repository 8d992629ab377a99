//! Error kinds for the scheduler core. `BitmapSizeChanged` and
//! `AllocationFailure` are fatal in the sense that they indicate the caller
//! missed a reconfigure or is out of memory; the core itself never panics or
//! aborts on them, it only returns `Err` and leaves the decision of how to
//! treat a fatal condition (log and crash-restart the controller, most
//! likely) to the binary wiring the collaborators together. The remaining
//! kinds are recoverable by construction: the core logs them and converges
//! state on the next `scan()` or tick.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOp {
    Suspend,
    Resume,
}

impl std::fmt::Display for SignalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalOp::Suspend => f.write_str("suspend"),
            SignalOp::Resume => f.write_str("resume"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GangError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resmap length for job {job_id} disagrees with the current node count ({expected} bits expected, got {got})")]
    BitmapSizeChanged { job_id: u32, expected: usize, got: usize },

    #[error("allocation failure building the resmap for job {job_id}")]
    AllocationFailure { job_id: u32 },

    #[error("partition '{0}' not found")]
    PartitionNotFound(String),

    #[error("{op} signal for job {job_id} failed: {reason}")]
    SignalFailure { job_id: u32, op: SignalOp, reason: String },

    #[error("worker did not exit after the cooperative-cancellation retry budget")]
    WorkerRefusedCancel,
}

impl GangError {
    /// `BitmapSizeChanged` and `AllocationFailure` indicate the caller is
    /// out of sync with reality (missed reconfigure, OOM); every other kind
    /// is absorbed by design (§7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, GangError::BitmapSizeChanged { .. } | GangError::AllocationFailure { .. })
    }
}
