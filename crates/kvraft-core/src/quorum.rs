//! # quorum
//!
//! why: decide when enough peers agree for a write to become durable cluster-wide
//! relations: used by leader.rs to commit and candidate.rs to win elections
//! what: has_quorum, quorum_size

/// Smallest number of processes (leader included) that forms a strict majority.
pub fn quorum_size(cluster_size: usize) -> usize {
    cluster_size / 2 + 1
}

/// Whether `acks` peer acknowledgments plus the local process reach a
/// strict majority of a cluster with `peers` other members.
///
/// Recomputed from membership on every call.
pub fn has_quorum(peers: usize, acks: usize) -> bool {
    (peers + 1) / 2 < acks + 1
}
