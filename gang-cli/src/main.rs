//! Manual smoke-test harness for `gang-core`: wires the scheduler to an
//! in-memory fake of the job database / partition registry / node inventory
//! / RPC layer (`fake_cluster`) and drives one of the literal end-to-end
//! scenarios from spec.md §8 so the gang/shadow behavior can be watched from
//! a terminal instead of a unit test assertion.

mod fake_cluster;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gang_core::collaborators::{Bits, PartitionSnapshot};
use gang_core::{Config, GangScheduler};

use fake_cluster::{FakeCluster, FakeNode};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Scenario {
    /// §8 S1: node granularity, two conflicting jobs in one partition.
    Gang,
    /// §8 S4: shadow preemption across a high/low priority pair.
    Shadow,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "gang-core smoke-test driver", long_about = None)]
struct Args {
    /// Resource-accounting granularity.
    #[arg(long, default_value = "node")]
    granularity: String,

    /// Slicer tick period, in seconds.
    #[arg(long, default_value_t = 1)]
    time_slice_seconds: u64,

    /// Trust configured node counts over live readings.
    #[arg(long)]
    fast_schedule: bool,

    /// Which literal spec.md §8 scenario to run.
    #[arg(long, value_enum, default_value_t = Scenario::Gang)]
    scenario: Scenario,

    /// How many slicer ticks to wait for before printing final state.
    #[arg(long, default_value_t = 2)]
    ticks: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::new(&args.granularity, args.time_slice_seconds, args.fast_schedule)
        .context("invalid --granularity/--time-slice-seconds")?;

    match args.scenario {
        Scenario::Gang => run_gang_scenario(config, args.ticks)?,
        Scenario::Shadow => run_shadow_scenario(config, args.ticks)?,
    }
    Ok(())
}

fn bits(set: &[usize], len: usize) -> Bits {
    let mut b = Bits::repeat(false, len);
    for &i in set {
        b.set(i, true);
    }
    b
}

/// §8 S1: two nodes, job A and job B both on `{n0}`. A starts first and
/// runs; B is admitted but suspended (conflict); one slicer tick later the
/// rotation flips which of the two is seated.
fn run_gang_scenario(config: Config, ticks: u64) -> Result<()> {
    let cluster = Arc::new(FakeCluster::new(
        vec![FakeNode { sockets: 1, cores_per_socket: 4, cpus: 4 }, FakeNode { sockets: 1, cores_per_socket: 4, cpus: 4 }],
        vec![PartitionSnapshot { name: "batch".into(), priority: 10 }],
    ));

    let scheduler = GangScheduler::init(config, cluster.clone() as Arc<dyn gang_core::ClusterView>)?;

    cluster.add_job(1, "batch", bits(&[0], 2), &[]);
    scheduler.job_start(1, "batch", bits(&[0], 2))?;
    cluster.add_job(2, "batch", bits(&[0], 2), &[]);
    scheduler.job_start(2, "batch", bits(&[0], 2))?;

    print_jobs("after job_start(1), job_start(2)", &cluster);

    for tick in 1..=ticks {
        thread::sleep(Duration::from_secs(1));
        print_jobs(&format!("after ~tick {tick}"), &cluster);
    }

    scheduler.fini();
    Ok(())
}

/// §8 S4: `high` (priority 100) and `low` (priority 10) both node
/// granularity. `low` holds job X on `{n0}`; job Y then starts in `high` on
/// the same node and preempts X via a shadow until Y ends.
fn run_shadow_scenario(config: Config, ticks: u64) -> Result<()> {
    let cluster = Arc::new(FakeCluster::new(
        vec![FakeNode { sockets: 1, cores_per_socket: 4, cpus: 4 }],
        vec![PartitionSnapshot { name: "high".into(), priority: 100 }, PartitionSnapshot { name: "low".into(), priority: 10 }],
    ));

    let scheduler = GangScheduler::init(config, cluster.clone() as Arc<dyn gang_core::ClusterView>)?;

    cluster.add_job(10, "low", bits(&[0], 1), &[]);
    scheduler.job_start(10, "low", bits(&[0], 1))?;
    print_jobs("after job_start(X=10) in 'low'", &cluster);

    cluster.add_job(20, "high", bits(&[0], 1), &[]);
    scheduler.job_start(20, "high", bits(&[0], 1))?;
    print_jobs("after job_start(Y=20) in 'high' (X should now be suspended)", &cluster);

    for tick in 1..=ticks {
        thread::sleep(Duration::from_secs(1));
        print_jobs(&format!("after ~tick {tick}"), &cluster);
    }

    scheduler.job_end(20, "high");
    print_jobs("after job_end(Y=20) (X should resume)", &cluster);

    scheduler.fini();
    Ok(())
}

fn print_jobs(label: &str, cluster: &FakeCluster) {
    println!("-- {label} --");
    for (id, partition, state) in cluster.describe_jobs() {
        println!("  job {id} in '{partition}': {state:?}");
    }
}
