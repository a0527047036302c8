//! # follower
//!
//! why: mirror the leader's log and answer the leader's replication and repair traffic
//! relations: created by leader.rs and candidate.rs on step-down, uses election.rs for votes
//! what: Follower, provisional append, commit on confirmation, consistency answers, repair batches

use crate::election::can_vote;
use crate::error::Result;
use crate::inbox::Inbox;
use crate::log::{LogItem, LogPosition, NodeId, RequestId};
use crate::message::{Envelope, Message};
use crate::role::{Process, RoleState};
use crate::store::LogStore;

#[derive(Debug)]
pub struct Follower {
    state: RoleState,
}

impl Follower {
    pub fn new(state: RoleState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> RoleState {
        self.state
    }

    /// Process one batch of inbox messages.
    pub fn act<S: LogStore>(&mut self, inbox: &mut Inbox, process: &mut Process<'_, S>) -> Result<()> {
        let mut cycle = inbox.begin_cycle();
        let mut outcome = Ok(());

        while let Some(Envelope { from, message, .. }) = cycle.next() {
            outcome = self.handle(from, message, process);
            if outcome.is_err() {
                break;
            }
        }
        cycle.finish(inbox);
        outcome
    }

    fn handle<S: LogStore>(
        &mut self,
        from: NodeId,
        message: Message,
        process: &mut Process<'_, S>,
    ) -> Result<()> {
        match message {
            Message::WhoIsLeader { request_id } => {
                process.send(
                    from,
                    Message::LeaderIdentity {
                        request_id,
                        leader: self.state.leader,
                    },
                );
            }
            Message::Heartbeat { epoch, .. } => {
                if epoch >= process.store.epoch() {
                    self.follow(from, epoch, process)?;
                }
                let epoch = process.store.epoch();
                process.send(from, Message::HeartbeatAck { epoch });
            }
            Message::ReplicateEntry { epoch, prev, entry } => {
                let request_id = entry.request_id.clone();
                let can_apply = self.replicate(from, epoch, prev, entry, process)?;
                let epoch = process.store.epoch();
                process.send(
                    from,
                    Message::ReplicateAck {
                        epoch,
                        request_id,
                        can_apply,
                    },
                );
            }
            Message::CommitConfirm { epoch, request_id } => {
                if epoch >= process.store.epoch() {
                    self.commit(&request_id, process)?;
                }
            }
            Message::ConsistencyProbe { entry, .. } => {
                let matches = process.store.entry_at(entry.index) == Some(&entry);
                let epoch = process.store.epoch();
                process.send(from, Message::ConsistencyProbeResult { epoch, matches });
            }
            Message::RepairBatch {
                from_index,
                entries,
            } => {
                tracing::debug!(node = process.id, from_index, count = entries.len(), "applying repair batch");
                process.store.replace_from(from_index, entries)?;
            }
            Message::ElectionRequest { epoch, next_index } => {
                if can_vote(process.store.epoch(), process.store.next_index(), epoch, next_index) {
                    process.store.set_epoch(epoch)?;
                    self.state = RoleState {
                        leader: None,
                        epoch,
                    };
                    process.send(from, Message::ElectionVote { epoch });
                }
            }
            Message::ClientWrite { request_id, .. } | Message::ClientRead { request_id, .. } => {
                tracing::debug!(node = process.id, %request_id, "client request at follower dropped");
            }
            other => {
                tracing::debug!(node = process.id, from, kind = other.kind(), "ignored by follower");
            }
        }
        Ok(())
    }

    fn follow<S: LogStore>(&mut self, leader: NodeId, epoch: u64, process: &mut Process<'_, S>) -> Result<()> {
        if epoch > process.store.epoch() {
            process.store.set_epoch(epoch)?;
        }
        if self.state.leader != Some(leader) {
            tracing::info!(node = process.id, leader, epoch, "following new leader");
        }
        self.state = RoleState {
            leader: Some(leader),
            epoch,
        };
        Ok(())
    }

    fn replicate<S: LogStore>(
        &mut self,
        from: NodeId,
        epoch: u64,
        prev: Option<LogPosition>,
        entry: LogItem,
        process: &mut Process<'_, S>,
    ) -> Result<bool> {
        if epoch < process.store.epoch() {
            return Ok(false);
        }
        self.follow(from, epoch, process)?;

        let extends = entry.index == process.store.next_index()
            && prev == process.store.last_log_item().map(LogItem::position);
        if extends {
            process.store.append_provisional(entry);
        }
        Ok(extends)
    }

    fn commit<S: LogStore>(&mut self, request_id: &RequestId, process: &mut Process<'_, S>) -> Result<()> {
        let matches = process
            .store
            .provisional()
            .is_some_and(|p| &p.request_id == request_id);
        if !matches {
            tracing::warn!(node = process.id, %request_id, "commit confirmation without matching write");
            return Ok(());
        }
        process.store.commit_provisional()?;
        Ok(())
    }
}
