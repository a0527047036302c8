//! # kvraft-core
//!
//! why: implement the leader side of a replicated key/value log in pure, I/O-free rust
//! relations: kvraft-storage provides a durable LogStore, kvraft-sim drives nodes over an in-process router
//! what: role state machine (leader, follower, candidate), messages, log store trait, repair and quorum logic

pub mod candidate;
pub mod config;
pub mod election;
pub mod error;
pub mod follower;
pub mod inbox;
pub mod leader;
pub mod log;
pub mod message;
pub mod node;
pub mod quorum;
pub mod repair;
pub mod role;
pub mod store;

pub use config::{ClusterConfig, NodeConfig};
pub use error::{RaftError, Result};
pub use leader::{Leader, PendingWrite};
pub use log::{Command, Epoch, LogIndex, LogItem, LogPosition, NodeId, RequestId, WriteOp};
pub use message::{Envelope, Message};
pub use node::Node;
pub use role::{Process, Role, RoleState};
pub use store::{LogStore, MemoryStore};
