//! The resource-map model (§4.A): a bitset over a granularity-dependent bit
//! domain, paired with a dense CPU-count vector aligned to the bitset's own
//! set bits when the granularity carries one.
//!
//! Resmaps from different jobs share one bijection between `(node, socket)`
//! pairs and bit positions, fixed by the node order and per-node socket
//! count alone (never by which job is being built), so they can be
//! combined with bitwise AND/OR without translation.

use crate::collaborators::Bits;
use crate::error::GangError;
use crate::granularity::Granularity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resmap {
    bits: Bits,
    /// `Some` only for Core/CPU granularity. Length equals `bits.count_ones()`;
    /// entry `a` is the CPU count held on the bit that is the `a`-th set bit
    /// of `bits` in ascending index order.
    cpu_vector: Option<Vec<u16>>,
}

impl Resmap {
    pub fn bits(&self) -> &Bits {
        &self.bits
    }

    pub fn cpu_vector(&self) -> Option<&[u16]> {
        self.cpu_vector.as_deref()
    }

    pub fn view(&self) -> ResourceView<'_> {
        ResourceView { resmap: &self.bits, cpu_vector: self.cpu_vector.as_deref() }
    }
}

/// A borrowed view of a resmap, used by the fit engine so it does not care
/// whether the resmap it is looking at belongs to a `Job` or is a snapshot
/// taken for a shadow.
#[derive(Debug, Clone, Copy)]
pub struct ResourceView<'a> {
    pub resmap: &'a Bits,
    pub cpu_vector: Option<&'a [u16]>,
}

/// For Core/CPU granularity, how many bit positions each node contributes to
/// the walk: real socket count for Core, a single pseudo-socket (index 0,
/// meaning "the whole node") for CPU. This mirrors how the allocator is
/// queried for CPU granularity in `cores_on`.
fn sockets_per_node_for_walk(granularity: Granularity, sockets_per_node: &[u16], node: usize) -> u16 {
    if granularity == Granularity::Cpu { 1 } else { sockets_per_node[node] }
}

/// Builds a job's resmap from its external node bitmap (§4.A `build`).
///
/// `cores_on(alloc_index, socket_index)` must behave like
/// `ClusterView::cores_on` called with this job's id already bound; the
/// caller supplies a closure so this module stays independent of the
/// collaborator trait.
pub fn build(
    job_id: u32,
    node_bitmap: &Bits,
    granularity: Granularity,
    node_count: usize,
    resmap_size: usize,
    sockets_per_node: &[u16],
    cores_on: &dyn Fn(usize, u16) -> u16,
) -> Result<Resmap, GangError> {
    if granularity.bit_domain_is_per_node() {
        if node_bitmap.len() != node_count {
            return Err(GangError::BitmapSizeChanged { job_id, expected: node_count, got: node_bitmap.len() });
        }
        let bits = node_bitmap.clone();
        let cpu_vector = if granularity.carries_cpu_vector() {
            Some(load_cpu_vector_for_bits(&bits, node_bitmap, granularity, sockets_per_node, cores_on))
        } else {
            None
        };
        return Ok(Resmap { bits, cpu_vector });
    }

    // Socket/Core: fresh bitset over the global socket domain. `map_index`
    // is the bit-position offset (advances for every node, present or not,
    // to keep the (node, socket) -> bit bijection job-independent);
    // `alloc_index` is the allocator-relative node counter `cores_on`
    // expects, which only advances for nodes present in `node_bitmap`.
    let mut bits = Bits::repeat(false, resmap_size);
    let mut map_index = 0usize;
    let mut alloc_index = 0usize;
    for node in 0..node_count {
        let sockets = sockets_per_node[node];
        if node_bitmap[node] {
            for socket in 0..sockets {
                if cores_on(alloc_index, socket) > 0 {
                    bits.set(map_index + socket as usize, true);
                }
            }
            alloc_index += 1;
        }
        map_index += sockets as usize;
    }

    let cpu_vector = if granularity.carries_cpu_vector() {
        Some(load_cpu_vector_for_bits(&bits, node_bitmap, granularity, sockets_per_node, cores_on))
    } else {
        None
    };
    Ok(Resmap { bits, cpu_vector })
}

/// `load_cpu_vector` (§4.A): one entry per socket with a positive core
/// count, walked in the same node/socket order as `build`, for each node
/// present in the job's own `node_bitmap`. Length equals `popcount(bits)`.
fn load_cpu_vector_for_bits(
    _bits: &Bits,
    node_bitmap: &Bits,
    granularity: Granularity,
    sockets_per_node: &[u16],
    cores_on: &dyn Fn(usize, u16) -> u16,
) -> Vec<u16> {
    let mut out = Vec::new();
    let mut alloc_index = 0usize;
    for node in 0..node_bitmap.len() {
        if !node_bitmap[node] {
            continue;
        }
        let sockets = sockets_per_node_for_walk(granularity, sockets_per_node, node);
        for socket in 0..sockets {
            let cores = cores_on(alloc_index, socket);
            if cores > 0 {
                out.push(cores);
            }
        }
        alloc_index += 1;
    }
    out
}

/// Bitwise AND of two same-width bitsets, returned as a new owned bitset.
pub fn bits_and(a: &Bits, b: &Bits) -> Bits {
    debug_assert_eq!(a.len(), b.len());
    let mut out = Bits::repeat(false, a.len());
    for i in 0..a.len() {
        if a[i] && b[i] {
            out.set(i, true);
        }
    }
    out
}

/// OR `src` into `dst` in place.
pub fn bits_or_assign(dst: &mut Bits, src: &Bits) {
    debug_assert_eq!(dst.len(), src.len());
    for i in 0..dst.len() {
        if src[i] {
            dst.set(i, true);
        }
    }
}

/// Overwrite `dst`'s contents with `src`'s, in place (same width).
pub fn bits_copy_from(dst: &mut Bits, src: &Bits) {
    debug_assert_eq!(dst.len(), src.len());
    for i in 0..dst.len() {
        dst.set(i, src[i]);
    }
}

pub fn popcount(bits: &Bits) -> usize {
    bits.count_ones()
}
