//! # repair
//!
//! why: bring a follower whose log diverged back in line with the leader
//! relations: driven by leader.rs on a rejected entry and on consistency results
//! what: RepairTracker, RepairStep
//!
//! When a follower cannot apply the in-flight entry, the leader walks
//! backwards through its own log one index at a time asking "do you have
//! this record?" until the follower says yes (or index 0 is reached), then
//! sends the whole suffix from that index in one batch.
//!
//! The tracker only decides the next step. Sending the probe or the batch
//! is up to the caller, so the probe sequence can be driven without a
//! message loop.

use std::collections::HashMap;

use crate::log::{LogIndex, NodeId};

/// What the leader should do next for one follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    /// Offer the entry at `index` as a consistency probe.
    Probe { index: LogIndex },
    /// Send every entry from `from` and re-send the in-flight write.
    Repair { from: LogIndex },
    /// The follower has no repair in progress; drop the response.
    Ignore,
}

/// Index last offered to each follower that is being repaired.
#[derive(Debug, Default, Clone)]
pub struct RepairTracker {
    offered: HashMap<NodeId, LogIndex>,
}

impl RepairTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or restart) repair of `follower` from the leader's last index.
    pub fn start(&mut self, follower: NodeId, last_index: LogIndex) -> RepairStep {
        self.offered.insert(follower, last_index);
        RepairStep::Probe { index: last_index }
    }

    /// Advance the search after the follower answered the last probe.
    pub fn on_probe_result(&mut self, follower: NodeId, matches: bool) -> RepairStep {
        let Some(&offered) = self.offered.get(&follower) else {
            return RepairStep::Ignore;
        };

        if matches {
            self.offered.remove(&follower);
            return RepairStep::Repair { from: offered };
        }

        match offered.checked_sub(1) {
            Some(below) if below > 0 => {
                self.offered.insert(follower, below);
                RepairStep::Probe { index: below }
            }
            _ => {
                self.offered.remove(&follower);
                RepairStep::Repair { from: 0 }
            }
        }
    }

    /// Index currently offered to `follower`, if it is being repaired.
    pub fn offered(&self, follower: NodeId) -> Option<LogIndex> {
        self.offered.get(&follower).copied()
    }

    pub fn in_progress(&self) -> usize {
        self.offered.len()
    }
}
