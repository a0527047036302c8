//! # candidate
//!
//! why: let a process claim leadership of a new epoch when none is known
//! relations: uses election.rs to grant competing votes, quorum.rs to count its own, hands over to leader.rs or follower.rs
//! what: Candidate, vote counting, yielding to newer or current leaders

use std::collections::HashSet;

use crate::election::can_vote;
use crate::error::Result;
use crate::follower::Follower;
use crate::inbox::Inbox;
use crate::leader::Leader;
use crate::log::NodeId;
use crate::message::{Envelope, Message};
use crate::quorum::has_quorum;
use crate::role::{Process, Role, RoleState};
use crate::store::LogStore;

#[derive(Debug)]
pub struct Candidate {
    state: RoleState,
    votes: HashSet<NodeId>,
}

impl Candidate {
    /// Open a new epoch and ask every peer for its vote.
    pub fn new<S: LogStore>(process: &mut Process<'_, S>) -> Result<Self> {
        let epoch = process.store.epoch() + 1;
        process.store.set_epoch(epoch)?;
        let next_index = process.store.next_index();
        tracing::info!(node = process.id, epoch, next_index, "starting election");
        process.broadcast(Message::ElectionRequest { epoch, next_index });

        Ok(Self {
            state: RoleState {
                leader: None,
                epoch,
            },
            votes: HashSet::new(),
        })
    }

    pub fn state(&self) -> RoleState {
        self.state
    }

    /// Process one batch of inbox messages; returns the next role if it changes.
    pub fn act<S: LogStore>(
        &mut self,
        inbox: &mut Inbox,
        process: &mut Process<'_, S>,
    ) -> Result<Option<Role>> {
        let mut cycle = inbox.begin_cycle();
        let mut next = Ok(None);

        while let Some(envelope) = cycle.next() {
            next = self.handle(&envelope, process);
            match next {
                // The vote already answered a request; anything else is
                // left for the follower to handle.
                Ok(Some(Role::Follower(_))) if !is_election_request(&envelope.message) => {
                    cycle.defer(envelope);
                    break;
                }
                Ok(None) => {}
                _ => break,
            }
        }
        cycle.finish(inbox);

        if !matches!(next, Ok(None)) {
            return next;
        }
        if has_quorum(process.peers.len(), self.votes.len()) {
            tracing::info!(node = process.id, epoch = self.state.epoch, votes = self.votes.len(), "election won");
            return Ok(Some(Role::Leader(Leader::new(process))));
        }
        Ok(None)
    }

    fn handle<S: LogStore>(&mut self, envelope: &Envelope, process: &mut Process<'_, S>) -> Result<Option<Role>> {
        let from = envelope.from;
        let current = process.store.epoch();

        match &envelope.message {
            Message::WhoIsLeader { request_id } => {
                process.send(
                    from,
                    Message::LeaderIdentity {
                        request_id: request_id.clone(),
                        leader: None,
                    },
                );
            }
            Message::ElectionVote { epoch } if *epoch == self.state.epoch => {
                if process.peers.contains(&from) {
                    self.votes.insert(from);
                }
            }
            Message::ElectionRequest { epoch, next_index } => {
                if can_vote(current, process.store.next_index(), *epoch, *next_index) {
                    process.store.set_epoch(*epoch)?;
                    process.send(from, Message::ElectionVote { epoch: *epoch });
                    return Ok(Some(follower(None, *epoch)));
                }
            }
            message if yields_at_same_epoch(message) => {
                let epoch = message.epoch().unwrap_or(current);
                if epoch >= current {
                    process.store.set_epoch(epoch)?;
                    return Ok(Some(follower(Some(from), epoch)));
                }
            }
            message => {
                if let Some(epoch) = message.epoch().filter(|&epoch| epoch > current) {
                    process.store.set_epoch(epoch)?;
                    return Ok(Some(follower(Some(from), epoch)));
                }
                tracing::debug!(node = process.id, from, kind = message.kind(), "ignored by candidate");
            }
        }
        Ok(None)
    }
}

/// Leader traffic that ends the election even at the candidate's own epoch.
fn yields_at_same_epoch(message: &Message) -> bool {
    matches!(
        message,
        Message::Heartbeat { .. } | Message::ReplicateEntry { .. } | Message::CommitConfirm { .. }
    )
}

fn is_election_request(message: &Message) -> bool {
    matches!(message, Message::ElectionRequest { .. })
}

fn follower(leader: Option<NodeId>, epoch: u64) -> Role {
    Role::Follower(Follower::new(RoleState { leader, epoch }))
}
