//! # node
//!
//! why: own everything one cluster process has and run its role one activation at a time
//! relations: uses role.rs for the active role, inbox.rs for delivery, store.rs for the log
//! what: Node struct, bootstrap helpers, step, delivery and outbound draining

use crate::candidate::Candidate;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::follower::Follower;
use crate::inbox::Inbox;
use crate::leader::Leader;
use crate::log::NodeId;
use crate::message::Envelope;
use crate::role::{Process, Role, RoleState};
use crate::store::LogStore;

/// A single cluster process.
///
/// Messages are pushed in with [`Node::deliver`], handled by [`Node::step`]
/// and collected with [`Node::take_outbox`]. The node never performs I/O
/// beyond what its store does.
#[derive(Debug)]
pub struct Node<S> {
    config: NodeConfig,
    store: S,
    role: Role,
    inbox: Inbox,
    outbox: Vec<Envelope>,
}

impl<S: LogStore> Node<S> {
    /// Create a node in Follower role at the store's epoch, with no known leader.
    pub fn new(config: NodeConfig, store: S) -> Self {
        let role = Role::Follower(Follower::new(RoleState {
            leader: None,
            epoch: store.epoch(),
        }));
        Self {
            config,
            store,
            role,
            inbox: Inbox::new(),
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.config.id
    }

    pub fn peers(&self) -> &[NodeId] {
        &self.config.peers
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Install a Leader directly at the store's current epoch.
    pub fn bootstrap_leader(&mut self) {
        let (role, _, mut process) = self.split();
        *role = Role::Leader(Leader::new(&mut process));
    }

    /// Turn into a Candidate and request votes.
    pub fn campaign(&mut self) -> Result<()> {
        let (role, _, mut process) = self.split();
        *role = Role::Candidate(Candidate::new(&mut process)?);
        Ok(())
    }

    pub fn deliver(&mut self, envelope: Envelope) {
        self.inbox.push(envelope);
    }

    /// Run one activation of the current role.
    pub fn step(&mut self) -> Result<()> {
        let (role, inbox, mut process) = self.split();
        role.act(inbox, &mut process)
    }

    /// Messages produced since the last call.
    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    fn split(&mut self) -> (&mut Role, &mut Inbox, Process<'_, S>) {
        let process = Process::new(
            self.config.id,
            &self.config.peers,
            &mut self.store,
            &mut self.outbox,
        );
        (&mut self.role, &mut self.inbox, process)
    }
}
