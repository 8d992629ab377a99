//! # gang-core
//!
//! Gang time-slicing scheduler core for a cluster resource manager.
//!
//! Multiple jobs may be admitted to the same partition even when their
//! resource requests overlap; this crate multiplexes them over time by
//! suspending and resuming jobs so that, at any instant, the set of running
//! jobs in a partition fits within its active row. It also implements
//! priority-based preemption across partitions: jobs in higher-priority
//! partitions "shadow" overlapping jobs in lower-priority partitions for as
//! long as they run.
//!
//! ## Module layout
//!
//! - `granularity`: the four resource-accounting granularities and the
//!   properties that follow from them.
//! - `resmap`: the bitset + CPU-vector resource map model.
//! - `phys`: the run-length-encoded physical-resource capacity table.
//! - `job`, `partition`: the per-job and per-partition state.
//! - `fit`: the fit test and active-row folding.
//! - `shadow`: the cross-partition shadow relation.
//! - `row`: the active-row rebuild and cyclic rotation state machine.
//! - `slicer`: the background time-slicer thread.
//! - `scheduler`: the lifecycle hooks (`init`, `fini`, `reconfig`,
//!   `job_start`, `job_end`, `scan`) that are this crate's boundary with
//!   the controller.
//! - `collaborators`: narrow traits onto everything treated as an external
//!   collaborator (job database, partition registry, node inventory,
//!   allocation plugin, RPC transport).
//! - `config`: recognised configuration options.
//! - `error`: the crate's error enum.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod fit;
pub mod granularity;
pub mod job;
pub mod partition;
pub mod phys;
pub mod resmap;
pub mod row;
pub mod scheduler;
pub mod shadow;
pub mod slicer;

pub use collaborators::{ClusterView, ExternalJobState, JobSnapshot, NodeInfo, PartitionSnapshot};
pub use config::Config;
pub use error::GangError;
pub use granularity::Granularity;
pub use scheduler::{GangScheduler, SchedulerState};
