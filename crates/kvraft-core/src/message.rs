//! # message
//!
//! why: define every message a process can find in its inbox or send out
//! relations: queued by inbox.rs, produced and consumed by the role modules
//! what: Message enum (client, replication, repair, election), Envelope

use serde::{Deserialize, Serialize};

use crate::log::{Command, Epoch, LogIndex, LogItem, LogPosition, NodeId, RequestId};

/// All messages exchanged between clients and cluster processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Client asks who the leader is
    WhoIsLeader { request_id: RequestId },
    /// Answer to `WhoIsLeader`
    LeaderIdentity {
        request_id: RequestId,
        leader: Option<NodeId>,
    },
    /// Client write (goes through the log)
    ClientWrite {
        request_id: RequestId,
        command: Command,
    },
    /// Client read (answered from local data, never logged)
    ClientRead { request_id: RequestId, key: String },
    /// Write committed by a quorum
    WriteConfirmed { request_id: RequestId },
    /// Answer to `ClientRead`
    ReadResult {
        request_id: RequestId,
        value: Option<String>,
    },
    /// Leader offers the in-flight entry to a peer.
    /// `prev` is the leader's last committed position the entry extends.
    ReplicateEntry {
        epoch: Epoch,
        prev: Option<LogPosition>,
        entry: LogItem,
    },
    /// Peer answers `ReplicateEntry`
    ReplicateAck {
        epoch: Epoch,
        request_id: RequestId,
        can_apply: bool,
    },
    /// "Do you have this record?"
    ConsistencyProbe { epoch: Epoch, entry: LogItem },
    /// Answer to `ConsistencyProbe`
    ConsistencyProbeResult { epoch: Epoch, matches: bool },
    /// Leader overwrites a follower's log from `from_index` onwards
    RepairBatch {
        from_index: LogIndex,
        entries: Vec<LogItem>,
    },
    /// Leader tells peers the in-flight write is committed
    CommitConfirm { epoch: Epoch, request_id: RequestId },
    /// Leadership assertion carrying the leader's last log position
    Heartbeat {
        epoch: Epoch,
        last: Option<LogPosition>,
    },
    /// Peer answers `Heartbeat` with its own epoch
    HeartbeatAck { epoch: Epoch },
    /// Candidate asks for a vote
    ElectionRequest { epoch: Epoch, next_index: LogIndex },
    /// Vote granted
    ElectionVote { epoch: Epoch },
}

impl Message {
    /// The epoch this message carries, if it is a protocol message.
    pub fn epoch(&self) -> Option<Epoch> {
        match self {
            Self::ReplicateEntry { epoch, .. }
            | Self::ReplicateAck { epoch, .. }
            | Self::ConsistencyProbe { epoch, .. }
            | Self::ConsistencyProbeResult { epoch, .. }
            | Self::CommitConfirm { epoch, .. }
            | Self::Heartbeat { epoch, .. }
            | Self::HeartbeatAck { epoch }
            | Self::ElectionRequest { epoch, .. }
            | Self::ElectionVote { epoch } => Some(*epoch),
            Self::WhoIsLeader { .. }
            | Self::LeaderIdentity { .. }
            | Self::ClientWrite { .. }
            | Self::ClientRead { .. }
            | Self::WriteConfirmed { .. }
            | Self::ReadResult { .. }
            | Self::RepairBatch { .. } => None,
        }
    }

    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WhoIsLeader { .. } => "who_is_leader",
            Self::LeaderIdentity { .. } => "leader_identity",
            Self::ClientWrite { .. } => "client_write",
            Self::ClientRead { .. } => "client_read",
            Self::WriteConfirmed { .. } => "write_confirmed",
            Self::ReadResult { .. } => "read_result",
            Self::ReplicateEntry { .. } => "replicate_entry",
            Self::ReplicateAck { .. } => "replicate_ack",
            Self::ConsistencyProbe { .. } => "consistency_probe",
            Self::ConsistencyProbeResult { .. } => "consistency_probe_result",
            Self::RepairBatch { .. } => "repair_batch",
            Self::CommitConfirm { .. } => "commit_confirm",
            Self::Heartbeat { .. } => "heartbeat",
            Self::HeartbeatAck { .. } => "heartbeat_ack",
            Self::ElectionRequest { .. } => "election_request",
            Self::ElectionVote { .. } => "election_vote",
        }
    }
}

/// A message addressed from one process (or client) to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: NodeId,
    pub to: NodeId,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: NodeId, to: NodeId, message: Message) -> Self {
        Self { from, to, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_carry_no_epoch() {
        let msg = Message::ClientRead {
            request_id: "r".into(),
            key: "k".into(),
        };
        assert_eq!(msg.epoch(), None);
        assert_eq!(
            Message::RepairBatch {
                from_index: 0,
                entries: vec![]
            }
            .epoch(),
            None
        );
    }

    #[test]
    fn protocol_messages_expose_epoch() {
        assert_eq!(Message::HeartbeatAck { epoch: 9 }.epoch(), Some(9));
        assert_eq!(
            Message::ElectionRequest {
                epoch: 3,
                next_index: 1
            }
            .epoch(),
            Some(3)
        );
    }

    #[test]
    fn envelope_survives_json() {
        let env = Envelope::new(
            1,
            2,
            Message::ClientWrite {
                request_id: "c-1".into(),
                command: Command::put("a", "x"),
            },
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
