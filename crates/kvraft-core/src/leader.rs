//! # leader
//!
//! why: decide, once per activation, how a process that believes it leads reacts to its inbox
//! relations: uses repair.rs for log repair, quorum.rs for commit, election.rs for voting
//! what: Leader, PendingWrite, client admission, quorum commit, repair handshake, step-down

use std::collections::HashSet;

use crate::election::can_vote;
use crate::error::{RaftError, Result};
use crate::follower::Follower;
use crate::inbox::{Cycle, Inbox};
use crate::log::{Command, Epoch, LogItem, NodeId, RequestId};
use crate::message::{Envelope, Message};
use crate::quorum::has_quorum;
use crate::repair::{RepairStep, RepairTracker};
use crate::role::{Process, RoleState};
use crate::store::LogStore;

/// The single client write waiting for a quorum.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    /// Client to confirm to
    pub client: NodeId,
    /// Entry sent to peers and held in the provisional slot
    pub entry: LogItem,
    /// Peers that acknowledged `entry`
    pub acks: HashSet<NodeId>,
}

impl PendingWrite {
    pub fn request_id(&self) -> &str {
        &self.entry.request_id
    }
}

/// Leader role.
///
/// Admits one client write at a time, replicates it, commits it once a
/// quorum acknowledged it and repairs followers whose log diverged.
#[derive(Debug)]
pub struct Leader {
    state: RoleState,
    pending: Option<PendingWrite>,
    // Grows for the whole tenure; only a new role instance resets it.
    processed: HashSet<RequestId>,
    repair: RepairTracker,
}

impl Leader {
    /// Take over leadership at the store's current epoch and announce it.
    pub fn new<S: LogStore>(process: &mut Process<'_, S>) -> Self {
        let leader = Self {
            state: RoleState {
                leader: Some(process.id),
                epoch: process.store.epoch(),
            },
            pending: None,
            processed: HashSet::new(),
            repair: RepairTracker::new(),
        };
        leader.broadcast_heartbeat(process);
        leader
    }

    pub fn state(&self) -> RoleState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    pub fn has_processed(&self, request_id: &str) -> bool {
        self.processed.contains(request_id)
    }

    pub fn repair(&self) -> &RepairTracker {
        &self.repair
    }

    /// Process one batch of inbox messages.
    ///
    /// Returns the follower to become if leadership was given up, `None`
    /// to stay leader. If handling a message fails, the messages not yet
    /// handled stay queued and the error is returned, unless a newer epoch
    /// was already seen in the batch; then the leader steps down instead.
    pub fn act<S: LogStore>(
        &mut self,
        inbox: &mut Inbox,
        process: &mut Process<'_, S>,
    ) -> Result<Option<Follower>> {
        let mut cycle = inbox.begin_cycle();
        let mut observed = Vec::new();
        let drained = self.drain(&mut cycle, &mut observed, process);
        cycle.finish(inbox);

        match drained {
            Ok(Some(follower)) => return Ok(Some(follower)),
            Ok(None) => {}
            // A newer epoch seen before the failure still ends this tenure.
            Err(error) => {
                return match self.arbitrate(&observed, process)? {
                    Some(follower) => {
                        tracing::warn!(node = process.id, %error, "stepping down after failed activation");
                        Ok(Some(follower))
                    }
                    None => Err(error),
                };
            }
        }

        self.broadcast_heartbeat(process);
        self.check_pending_write(process)?;
        self.arbitrate(&observed, process)
    }

    fn drain<S: LogStore>(
        &mut self,
        cycle: &mut Cycle,
        observed: &mut Vec<(NodeId, Epoch)>,
        process: &mut Process<'_, S>,
    ) -> Result<Option<Follower>> {
        while let Some(Envelope { from, to, message }) = cycle.next() {
            tracing::debug!(node = process.id, from, kind = message.kind(), "leader handling message");

            match message {
                Message::WhoIsLeader { request_id } => {
                    process.send(
                        from,
                        Message::LeaderIdentity {
                            request_id,
                            leader: Some(process.id),
                        },
                    );
                }
                Message::ClientRead { request_id, key } => {
                    let value = process.store.read_key(&key);
                    process.send(from, Message::ReadResult { request_id, value });
                }
                Message::ClientWrite {
                    request_id,
                    command,
                } => {
                    if let Some(deferred) = self.client_write(from, request_id, command, process) {
                        cycle.defer(Envelope::new(from, to, deferred));
                    }
                }
                Message::ReplicateAck {
                    request_id,
                    can_apply,
                    ..
                } => self.replicate_ack(from, &request_id, can_apply, process)?,
                Message::ConsistencyProbeResult { matches, .. } => {
                    let step = self.repair.on_probe_result(from, matches);
                    self.apply_repair_step(from, step, process)?;
                }
                Message::ElectionRequest { epoch, next_index } => {
                    if let Some(follower) = self.election_request(from, epoch, next_index, process)? {
                        return Ok(Some(follower));
                    }
                }
                Message::Heartbeat { epoch, .. }
                | Message::HeartbeatAck { epoch }
                | Message::ReplicateEntry { epoch, .. }
                | Message::CommitConfirm { epoch, .. }
                | Message::ConsistencyProbe { epoch, .. }
                | Message::ElectionVote { epoch } => observed.push((from, epoch)),
                other => cycle.defer(Envelope::new(from, to, other)),
            }
        }
        Ok(None)
    }

    /// Admit a client write, or hand it back if another write is in flight.
    fn client_write<S: LogStore>(
        &mut self,
        client: NodeId,
        request_id: RequestId,
        command: Command,
        process: &mut Process<'_, S>,
    ) -> Option<Message> {
        if self.processed.contains(&request_id) {
            tracing::debug!(node = process.id, %request_id, "duplicate write dropped");
            return None;
        }
        if self.pending.is_some() {
            return Some(Message::ClientWrite {
                request_id,
                command,
            });
        }

        self.processed.insert(request_id.clone());
        let entry = LogItem::new(
            process.store.next_index(),
            process.store.epoch(),
            request_id,
            command,
        );
        tracing::debug!(
            node = process.id,
            request_id = %entry.request_id,
            index = entry.index,
            "write admitted"
        );

        let message = replicate_entry(&*process.store, &entry);
        process.broadcast(message);
        process.store.append_provisional(entry.clone());
        self.pending = Some(PendingWrite {
            client,
            entry,
            acks: HashSet::new(),
        });
        None
    }

    fn replicate_ack<S: LogStore>(
        &mut self,
        from: NodeId,
        request_id: &str,
        can_apply: bool,
        process: &mut Process<'_, S>,
    ) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };
        if !process.peers.contains(&from) {
            tracing::warn!(node = process.id, from, "ack from non-member ignored");
            return Ok(());
        }

        if can_apply && request_id == pending.entry.request_id {
            pending.acks.insert(from);
            return Ok(());
        }

        let last = process
            .store
            .last_log_item()
            .ok_or(RaftError::MissingLastLogItem { follower: from })?
            .index;
        tracing::debug!(node = process.id, follower = from, index = last, "starting repair");
        let step = self.repair.start(from, last);
        self.apply_repair_step(from, step, process)
    }

    fn apply_repair_step<S: LogStore>(
        &mut self,
        follower: NodeId,
        step: RepairStep,
        process: &mut Process<'_, S>,
    ) -> Result<()> {
        match step {
            RepairStep::Probe { index } => {
                let entry = process
                    .store
                    .entry_at(index)
                    .cloned()
                    .ok_or(RaftError::MissingLogEntry { index })?;
                let epoch = process.store.epoch();
                process.send(follower, Message::ConsistencyProbe { epoch, entry });
            }
            RepairStep::Repair { from } => {
                let entries = process.store.entries_from(from);
                tracing::debug!(
                    node = process.id,
                    follower,
                    from,
                    count = entries.len(),
                    "sending repair batch"
                );
                process.send(
                    follower,
                    Message::RepairBatch {
                        from_index: from,
                        entries,
                    },
                );
                if let Some(pending) = &self.pending {
                    let message = replicate_entry(&*process.store, &pending.entry);
                    process.send(follower, message);
                }
            }
            RepairStep::Ignore => {
                tracing::debug!(node = process.id, follower, "probe result without repair dropped");
            }
        }
        Ok(())
    }

    fn election_request<S: LogStore>(
        &mut self,
        candidate: NodeId,
        epoch: Epoch,
        next_index: u64,
        process: &mut Process<'_, S>,
    ) -> Result<Option<Follower>> {
        if !can_vote(process.store.epoch(), process.store.next_index(), epoch, next_index) {
            tracing::debug!(node = process.id, candidate, epoch, "vote refused");
            return Ok(None);
        }

        let follower = step_down(None, epoch, process)?;
        process.send(candidate, Message::ElectionVote { epoch });
        Ok(Some(follower))
    }

    fn broadcast_heartbeat<S: LogStore>(&self, process: &mut Process<'_, S>) {
        let message = Message::Heartbeat {
            epoch: process.store.epoch(),
            last: process.store.last_log_item().map(LogItem::position),
        };
        process.broadcast(message);
    }

    /// Commit the pending write once a quorum acknowledged it.
    fn check_pending_write<S: LogStore>(&mut self, process: &mut Process<'_, S>) -> Result<()> {
        let Some(pending) = &self.pending else {
            return Ok(());
        };
        if !has_quorum(process.peers.len(), pending.acks.len()) {
            return Ok(());
        }

        // Durable locally before anyone is told.
        let committed = process.store.commit_provisional()?;
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        tracing::info!(
            node = process.id,
            request_id = %committed.request_id,
            index = committed.index,
            acks = pending.acks.len(),
            "write committed"
        );

        process.send(
            pending.client,
            Message::WriteConfirmed {
                request_id: committed.request_id.clone(),
            },
        );
        let epoch = process.store.epoch();
        process.broadcast(Message::CommitConfirm {
            epoch,
            request_id: committed.request_id,
        });
        Ok(())
    }

    /// Step down if a message this cycle carried a newer epoch.
    fn arbitrate<S: LogStore>(
        &self,
        observed: &[(NodeId, Epoch)],
        process: &mut Process<'_, S>,
    ) -> Result<Option<Follower>> {
        let Some((sender, epoch)) = highest_epoch(observed) else {
            return Ok(None);
        };
        if epoch <= process.store.epoch() {
            return Ok(None);
        }
        step_down(Some(sender), epoch, process).map(Some)
    }
}

/// The sender and epoch of the first message carrying the largest epoch.
pub fn highest_epoch(observed: &[(NodeId, Epoch)]) -> Option<(NodeId, Epoch)> {
    observed.iter().copied().fold(None, |best, candidate| match best {
        Some((_, epoch)) if epoch >= candidate.1 => best,
        _ => Some(candidate),
    })
}

fn replicate_entry<S: LogStore>(store: &S, entry: &LogItem) -> Message {
    Message::ReplicateEntry {
        epoch: store.epoch(),
        prev: store.last_log_item().map(LogItem::position),
        entry: entry.clone(),
    }
}

fn step_down<S: LogStore>(
    leader: Option<NodeId>,
    epoch: Epoch,
    process: &mut Process<'_, S>,
) -> Result<Follower> {
    process.store.set_epoch(epoch)?;
    process.store.discard_provisional();
    Ok(Follower::new(RoleState { leader, epoch }))
}
