//! # election
//!
//! why: every role must apply the same rule when asked for its vote
//! relations: used by leader.rs, follower.rs and candidate.rs
//! what: can_vote

use crate::log::{Epoch, LogIndex};

/// Vote rule shared by every role.
///
/// Grant only to a candidate from a strictly newer epoch, or from the same
/// epoch with a strictly longer log.
pub fn can_vote(
    current_epoch: Epoch,
    current_next_index: LogIndex,
    candidate_epoch: Epoch,
    candidate_next_index: LogIndex,
) -> bool {
    if candidate_epoch != current_epoch {
        return candidate_epoch > current_epoch;
    }
    candidate_next_index > current_next_index
}
