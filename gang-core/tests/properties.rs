//! Property-based invariants (§8): these hold for any admission order or
//! topology, not just the literal scenarios in `scenarios.rs`.

mod common;

use std::collections::HashSet;

use proptest::prelude::*;

use common::{bits, node, FakeCluster};
use gang_core::collaborators::PartitionSnapshot;
use gang_core::job::SigState;
use gang_core::partition::{Partition, ShadowRef};
use gang_core::{shadow, Config, SchedulerState};

fn cfg(granularity: &str) -> Config {
    Config::new(granularity, 5, false).unwrap()
}

fn single_partition_cluster(nodes: usize) -> FakeCluster {
    FakeCluster::new(
        (0..nodes).map(|_| node(1, 4, 4)).collect(),
        vec![PartitionSnapshot { name: "batch".into(), priority: 10 }],
    )
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    /// Fit conservation: the active row never admits more CPU on a single
    /// socket than `cores_per_socket` allows, no matter how many
    /// conflicting jobs are thrown at it.
    #[test]
    fn fit_conservation_core_granularity(cores in prop::collection::vec(1u16..=4, 1..6)) {
        let cluster = single_partition_cluster(1);
        let mut state = SchedulerState::build(&cfg("core"), &cluster).unwrap();

        for (i, &c) in cores.iter().enumerate() {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[0], 1));
            cluster.set_core_allocation(id, 0, 0, c);
            state.job_start(id, "batch", bits(&[0], 1), &cluster).unwrap();
        }

        let running_total: u32 = cores
            .iter()
            .enumerate()
            .filter(|(i, _)| cluster.is_running((*i + 1) as u32))
            .map(|(_, &c)| c as u32)
            .sum();
        prop_assert!(running_total <= 4, "running core total {running_total} exceeds capacity 4");
    }

    /// Granularity exclusion: under Node granularity, no two jobs that share
    /// a node are ever both Running in the same partition at once.
    #[test]
    fn node_granularity_never_doubly_seats_a_node(node_choices in prop::collection::vec(0usize..2, 1..6)) {
        let cluster = single_partition_cluster(2);
        let mut state = SchedulerState::build(&cfg("node"), &cluster).unwrap();

        for (i, &n) in node_choices.iter().enumerate() {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[n], 2));
            state.job_start(id, "batch", bits(&[n], 2), &cluster).unwrap();
        }

        for a in 0..node_choices.len() {
            for b in (a + 1)..node_choices.len() {
                if node_choices[a] == node_choices[b] {
                    let id_a = (a + 1) as u32;
                    let id_b = (b + 1) as u32;
                    prop_assert!(
                        !(cluster.is_running(id_a) && cluster.is_running(id_b)),
                        "jobs {id_a} and {id_b} share node {} but are both running",
                        node_choices[a]
                    );
                }
            }
        }
    }

    /// Signal consistency: the external sig_state FakeCluster observes
    /// always agrees with the scheduler's own bookkeeping; no job is ever
    /// tracked as Running/Suspended internally while the collaborator was
    /// told the opposite.
    #[test]
    fn signal_state_matches_internal_sig_state(node_choices in prop::collection::vec(0usize..3, 1..6)) {
        let cluster = single_partition_cluster(3);
        let mut state = SchedulerState::build(&cfg("node"), &cluster).unwrap();

        for (i, &n) in node_choices.iter().enumerate() {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[n], 3));
            state.job_start(id, "batch", bits(&[n], 3), &cluster).unwrap();
        }

        let batch = state.find_partition("batch").unwrap();
        for job in &batch.jobs {
            let external_running = cluster.is_running(job.id);
            let internal_running = job.sig_state == SigState::Running;
            prop_assert_eq!(external_running, internal_running, "job {} desynced", job.id);
        }
    }

    /// Priority monotonicity: `shadow::cast` never reaches a partition whose
    /// priority is greater than or equal to the owner's.
    #[test]
    fn shadow_cast_never_reaches_equal_or_higher_priority(
        priorities in prop::collection::vec(0u16..200, 2..6),
        owner_idx in 0usize..6,
    ) {
        let owner_idx = owner_idx % priorities.len();
        let mut parts: Vec<Partition> = priorities.iter().map(|&p| Partition::new("q".into(), p)).collect();
        let owner_priority = parts[owner_idx].priority;

        shadow::cast(&mut parts, owner_idx, 99, owner_priority);

        for (idx, q) in parts.iter().enumerate() {
            let shadowed = q.shadows.iter().any(|s: &ShadowRef| s.owner_partition == owner_idx && s.job_id == 99);
            if shadowed {
                prop_assert!(idx != owner_idx);
                prop_assert!(q.priority < owner_priority, "partition {idx} (priority {}) should never be shadowed by priority {owner_priority}", q.priority);
            }
        }
    }

    /// Round-robin fairness: under full mutual conflict (every job wants the
    /// same single node), every job gets at least one turn running within a
    /// bounded number of ticks.
    #[test]
    fn round_robin_eventually_runs_every_conflicting_job(job_count in 2usize..5) {
        let cluster = single_partition_cluster(1);
        let mut state = SchedulerState::build(&cfg("node"), &cluster).unwrap();

        for i in 0..job_count {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[0], 1));
            state.job_start(id, "batch", bits(&[0], 1), &cluster).unwrap();
        }

        let mut ever_ran: HashSet<u32> = (1..=job_count as u32).filter(|&id| cluster.is_running(id)).collect();
        for _ in 0..(job_count + 2) {
            state.tick(&cluster);
            ever_ran.extend((1..=job_count as u32).filter(|&id| cluster.is_running(id)));
        }

        prop_assert_eq!(ever_ran.len(), job_count, "not every job got a turn: {ever_ran:?}");
    }

    /// Idempotence: calling `rebuild_all` again with no intervening change
    /// leaves every job's running/suspended state exactly as it was.
    #[test]
    fn rebuild_all_is_idempotent_without_intervening_change(node_choices in prop::collection::vec(0usize..2, 1..5)) {
        let cluster = single_partition_cluster(2);
        let mut state = SchedulerState::build(&cfg("node"), &cluster).unwrap();

        for (i, &n) in node_choices.iter().enumerate() {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[n], 2));
            state.job_start(id, "batch", bits(&[n], 2), &cluster).unwrap();
        }

        let before: Vec<bool> = (1..=node_choices.len() as u32).map(|id| cluster.is_running(id)).collect();
        state.rebuild_all(&cluster);
        let after: Vec<bool> = (1..=node_choices.len() as u32).map(|id| cluster.is_running(id)).collect();

        prop_assert_eq!(before, after);
    }

    /// Reconfigure continuity: reconfiguring with an unchanged partition
    /// list and topology must not suspend a job that still fits.
    #[test]
    fn reconfigure_with_unchanged_topology_suspends_nobody(job_count in 1usize..4) {
        let cluster = single_partition_cluster(job_count);
        let mut state = SchedulerState::build(&cfg("node"), &cluster).unwrap();

        for i in 0..job_count {
            let id = (i + 1) as u32;
            cluster.add_job(id, "batch", bits(&[i], job_count));
            state.job_start(id, "batch", bits(&[i], job_count), &cluster).unwrap();
        }
        for i in 0..job_count {
            prop_assert!(cluster.is_running((i + 1) as u32), "jobs on distinct nodes should all fit");
        }

        cluster.set_partitions(vec![PartitionSnapshot { name: "batch".into(), priority: 10 }]);
        state.reconfig(cfg("node"), &cluster).unwrap();

        for i in 0..job_count {
            prop_assert!(cluster.is_running((i + 1) as u32), "job {} spuriously suspended by a no-op reconfigure", i + 1);
        }
    }
}
