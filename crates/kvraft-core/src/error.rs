//! # error
//!
//! why: one error type for role activation, log stores and configuration
//! relations: returned through node.rs step; kvraft-storage reuses it for disk failures
//! what: RaftError, Result alias

use thiserror::Error;

use crate::log::{LogIndex, NodeId};

/// Errors raised by role activation, log stores and configuration.
#[derive(Error, Debug)]
pub enum RaftError {
    /// A follower rejected an entry while the leader's own log is empty,
    /// so there is no record to start a consistency probe from.
    #[error("Leader log is empty while starting repair for follower {follower}")]
    MissingLastLogItem { follower: NodeId },

    /// A log index that should exist is not present in the store.
    #[error("Log entry {index} is missing")]
    MissingLogEntry { index: LogIndex },

    /// Commit requested with an empty provisional slot.
    #[error("No provisional write to commit")]
    NoProvisionalWrite,

    /// The provisional write no longer sits at the end of the log.
    #[error("Provisional write at index {found} does not extend log (next index {expected})")]
    ProvisionalIndexMismatch { expected: LogIndex, found: LogIndex },

    /// Invalid cluster configuration.
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Node id is not a member of the cluster.
    #[error("Node {id} is not a cluster member")]
    UnknownNode { id: NodeId },

    /// I/O error (file store).
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RaftError>;
