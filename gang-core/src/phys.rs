//! The physical-resource table (§4.B): a run-length-encoded capacity lookup
//! built once from the node inventory. Preferred over a flat per-bit vector
//! because node classes cluster in practice; a flat vector would be a
//! conforming alternative for small clusters but is not what this crate
//! uses.

use crate::collaborators::NodeInfo;
use crate::granularity::Granularity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    cap: u16,
    reps: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PhysResTable {
    runs: Vec<Run>,
}

impl PhysResTable {
    /// Node/Socket granularity never consults capacity; the table stays
    /// empty.
    pub fn empty() -> Self {
        PhysResTable { runs: Vec::new() }
    }

    /// `load()` (§4.B). `fast_schedule` selects configured vs. live node
    /// readings.
    pub fn load(granularity: Granularity, nodes: &[NodeInfo], fast_schedule: bool) -> Self {
        match granularity {
            Granularity::Node | Granularity::Socket => PhysResTable::empty(),
            Granularity::Cpu => {
                let mut runs: Vec<Run> = Vec::new();
                for node in nodes {
                    let cap = if fast_schedule { node.configured_cpus } else { node.cpus };
                    push_rep(&mut runs, cap, 1);
                }
                PhysResTable { runs }
            }
            Granularity::Core => {
                let mut runs: Vec<Run> = Vec::new();
                for node in nodes {
                    let cap = if fast_schedule { node.configured_cores_per_socket } else { node.cores_per_socket };
                    let sockets = if fast_schedule { node.configured_sockets } else { node.sockets };
                    push_rep(&mut runs, cap, sockets as u32);
                }
                PhysResTable { runs }
            }
        }
    }

    /// `cap(i)`: sum `reps` until strictly exceeding `i`; O(k) in the number
    /// of distinct runs.
    pub fn cap(&self, i: usize) -> u16 {
        let mut seen = 0usize;
        for run in &self.runs {
            seen += run.reps as usize;
            if i < seen {
                return run.cap;
            }
        }
        0
    }

    pub fn width(&self) -> usize {
        self.runs.iter().map(|r| r.reps as usize).sum()
    }
}

fn push_rep(runs: &mut Vec<Run>, cap: u16, reps: u32) {
    if let Some(last) = runs.last_mut() {
        if last.cap == cap {
            last.reps += reps;
            return;
        }
    }
    runs.push(Run { cap, reps });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(sockets: u16, cores_per_socket: u16, cpus: u16) -> NodeInfo {
        NodeInfo {
            sockets,
            cores_per_socket,
            cpus,
            configured_sockets: sockets,
            configured_cores_per_socket: cores_per_socket,
            configured_cpus: cpus,
        }
    }

    #[test]
    fn node_and_socket_granularity_build_empty_table() {
        let nodes = vec![node(2, 4, 8)];
        assert_eq!(PhysResTable::load(Granularity::Node, &nodes, false).width(), 0);
        assert_eq!(PhysResTable::load(Granularity::Socket, &nodes, false).width(), 0);
    }

    #[test]
    fn cpu_granularity_encodes_one_rep_per_node() {
        let nodes = vec![node(1, 4, 8), node(1, 4, 8), node(1, 4, 16)];
        let table = PhysResTable::load(Granularity::Cpu, &nodes, false);
        assert_eq!(table.width(), 3);
        assert_eq!(table.cap(0), 8);
        assert_eq!(table.cap(1), 8);
        assert_eq!(table.cap(2), 16);
    }

    #[test]
    fn core_granularity_encodes_one_rep_per_socket() {
        let nodes = vec![node(2, 4, 8), node(3, 4, 8)];
        let table = PhysResTable::load(Granularity::Core, &nodes, false);
        // node0 contributes 2 reps of cap 4, node1 contributes 3 more of cap 4:
        // they merge into a single run of 5 reps.
        assert_eq!(table.width(), 5);
        for i in 0..5 {
            assert_eq!(table.cap(i), 4);
        }
    }

    #[test]
    fn fast_schedule_selects_configured_counts() {
        let mut n = node(2, 4, 8);
        n.cores_per_socket = 1; // live reading drifted, configured says 4
        let table = PhysResTable::load(Granularity::Core, &[n], true);
        assert_eq!(table.cap(0), 4);
    }
}
