//! # log
//!
//! why: describe the entries the leader replicates and the state machine they drive
//! relations: stored by store.rs, carried by message.rs, probed by repair.rs
//! what: LogItem, LogPosition, Command, WriteOp, key/value apply rule

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authority generation number. Higher always supersedes lower.
pub type Epoch = u64;

/// 0-based position of an entry in the replicated log.
pub type LogIndex = u64;

/// Identity of a cluster member or client.
pub type NodeId = u64;

/// Client-chosen identifier used to de-duplicate retried writes.
pub type RequestId = String;

/// Kind of mutation a write request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteOp {
    /// Replace the value stored under the key.
    Put,
    /// Concatenate to the value stored under the key (empty if absent).
    Append,
}

/// A client write: operation plus its key/value payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub op: WriteOp,
    pub key: String,
    pub value: String,
}

impl Command {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: WriteOp::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn append(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: WriteOp::Append,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Apply this command to a key/value map.
    pub fn apply(&self, data: &mut BTreeMap<String, String>) {
        match self.op {
            WriteOp::Put => {
                data.insert(self.key.clone(), self.value.clone());
            }
            WriteOp::Append => {
                data.entry(self.key.clone())
                    .or_default()
                    .push_str(&self.value);
            }
        }
    }
}

/// A single entry in the replicated log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogItem {
    /// Position in the log
    pub index: LogIndex,
    /// Epoch of the leader that admitted the write
    pub epoch: Epoch,
    /// The client request this entry was created for
    pub request_id: RequestId,
    pub command: Command,
}

impl LogItem {
    /// Create a new log item
    pub fn new(index: LogIndex, epoch: Epoch, request_id: impl Into<RequestId>, command: Command) -> Self {
        Self {
            index,
            epoch,
            request_id: request_id.into(),
            command,
        }
    }

    /// The (index, epoch) pair that identifies this entry in heartbeats.
    pub fn position(&self) -> LogPosition {
        LogPosition {
            index: self.index,
            epoch: self.epoch,
        }
    }
}

/// Reference to a log entry without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub index: LogIndex,
    pub epoch: Epoch,
}

/// Rebuild the key/value map from a sequence of committed items.
pub fn replay<'a>(items: impl IntoIterator<Item = &'a LogItem>) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    for item in items {
        item.command.apply(&mut data);
    }
    data
}
