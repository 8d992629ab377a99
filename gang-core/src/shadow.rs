//! The shadow propagator (§4.E): the cross-partition relation that links a
//! job running in a higher-priority partition to every lower-priority
//! partition its resources overlap with, so the lower partition's fit
//! engine knows to refuse conflicting jobs for as long as the shadow holds.

use crate::partition::{Partition, ShadowRef};

/// `cast(j, priority_of_owner)`: add `j` to every partition whose priority
/// is strictly lower than the owner's, deduplicated by `(owner, job_id)`
/// identity.
pub fn cast(partitions: &mut [Partition], owner_idx: usize, job_id: u32, owner_priority: u16) {
    for (idx, q) in partitions.iter_mut().enumerate() {
        if idx == owner_idx || q.priority >= owner_priority {
            continue;
        }
        if q.shadows.iter().any(|s| s.owner_partition == owner_idx && s.job_id == job_id) {
            continue;
        }
        q.shadows.push(ShadowRef { owner_partition: owner_idx, job_id });
    }
}

/// `clear(j)`: remove `j` from every partition's shadow list. Job ids are
/// cluster-wide unique, so matching on `job_id` alone (without the owner
/// index) is sufficient and mirrors how the removal is keyed everywhere
/// else in this crate.
pub fn clear(partitions: &mut [Partition], job_id: u32) {
    for q in partitions.iter_mut() {
        q.shadows.retain(|s| s.job_id != job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, priority: u16) -> Partition {
        Partition::new(name.to_string(), priority)
    }

    #[test]
    fn cast_reaches_only_strictly_lower_priority_partitions() {
        let mut parts = vec![part("high", 100), part("mid", 50), part("low", 10)];
        cast(&mut parts, 0, 7, 100);
        assert!(parts[1].shadows.iter().any(|s| s.job_id == 7));
        assert!(parts[2].shadows.iter().any(|s| s.job_id == 7));
        assert!(parts[0].shadows.is_empty());
    }

    #[test]
    fn cast_is_idempotent() {
        let mut parts = vec![part("high", 100), part("low", 10)];
        cast(&mut parts, 0, 7, 100);
        cast(&mut parts, 0, 7, 100);
        assert_eq!(parts[1].shadows.len(), 1);
    }

    #[test]
    fn clear_removes_from_every_partition() {
        let mut parts = vec![part("high", 100), part("mid", 50), part("low", 10)];
        cast(&mut parts, 0, 7, 100);
        clear(&mut parts, 7);
        assert!(parts.iter().all(|q| q.shadows.is_empty()));
    }
}
