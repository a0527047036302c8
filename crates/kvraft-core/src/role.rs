//! # role
//!
//! why: exactly one role is active per process; switching variant is how a process changes role
//! relations: variants live in leader.rs, follower.rs, candidate.rs; driven by node.rs
//! what: Role enum, RoleState, Process handle

use crate::candidate::Candidate;
use crate::error::Result;
use crate::follower::Follower;
use crate::inbox::Inbox;
use crate::leader::Leader;
use crate::log::{Epoch, NodeId};
use crate::message::{Envelope, Message};
use crate::store::LogStore;

/// State every role variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleState {
    /// Leader this process currently believes in
    pub leader: Option<NodeId>,
    /// Epoch the role was created with
    pub epoch: Epoch,
}

/// The process a role acts on behalf of.
///
/// Gives a role its identity, the peers it talks to, the log store and
/// somewhere to put outbound messages. Nothing else is reachable.
pub struct Process<'a, S> {
    pub id: NodeId,
    pub peers: &'a [NodeId],
    pub store: &'a mut S,
    outbox: &'a mut Vec<Envelope>,
}

impl<'a, S: LogStore> Process<'a, S> {
    pub fn new(
        id: NodeId,
        peers: &'a [NodeId],
        store: &'a mut S,
        outbox: &'a mut Vec<Envelope>,
    ) -> Self {
        Self {
            id,
            peers,
            store,
            outbox,
        }
    }

    pub fn send(&mut self, to: NodeId, message: Message) {
        self.outbox.push(Envelope::new(self.id, to, message));
    }

    /// Send a copy of `message` to every peer.
    pub fn broadcast(&mut self, message: Message) {
        for &peer in self.peers {
            self.outbox.push(Envelope::new(self.id, peer, message.clone()));
        }
    }
}

/// Role of a process (leader, follower, or candidate).
#[derive(Debug)]
pub enum Role {
    Leader(Leader),
    Follower(Follower),
    Candidate(Candidate),
}

impl Role {
    /// Run one activation: drain the inbox once and switch variant if needed.
    ///
    /// On error the role is left as it was.
    pub fn act<S: LogStore>(&mut self, inbox: &mut Inbox, process: &mut Process<'_, S>) -> Result<()> {
        let next = match self {
            Self::Leader(leader) => leader.act(inbox, process)?.map(Self::Follower),
            Self::Follower(follower) => {
                follower.act(inbox, process)?;
                None
            }
            Self::Candidate(candidate) => candidate.act(inbox, process)?,
        };

        if let Some(next) = next {
            tracing::info!(
                node = process.id,
                from = self.name(),
                to = next.name(),
                epoch = next.state().epoch,
                leader = ?next.state().leader,
                "role transition"
            );
            *self = next;
        }
        Ok(())
    }

    pub fn state(&self) -> RoleState {
        match self {
            Self::Leader(leader) => leader.state(),
            Self::Follower(follower) => follower.state(),
            Self::Candidate(candidate) => candidate.state(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Leader(_) => "leader",
            Self::Follower(_) => "follower",
            Self::Candidate(_) => "candidate",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader(_))
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, Self::Follower(_))
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self, Self::Candidate(_))
    }
}
