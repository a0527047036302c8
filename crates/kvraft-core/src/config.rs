//! # config
//!
//! why: every process needs the same static view of who is in the cluster
//! relations: NodeConfig feeds node.rs; loaded by kvraft-sim from flags or a file
//! what: ClusterConfig (json load, validation), NodeConfig

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RaftError, Result};
use crate::log::NodeId;

/// Members of the cluster.
///
/// Membership is fixed for the lifetime of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeId>,
}

/// What a single process needs to know about the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: NodeId,
    /// Every other member
    pub peers: Vec<NodeId>,
}

impl ClusterConfig {
    /// Id reserved for clients talking to the cluster.
    pub const CLIENT_ID: NodeId = 0;

    pub fn new(nodes: Vec<NodeId>) -> Result<Self> {
        let config = Self { nodes };
        config.validate()?;
        Ok(config)
    }

    /// Nodes `1..=size`.
    pub fn with_size(size: u64) -> Result<Self> {
        Self::new((1..=size).collect())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check membership invariants.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(RaftError::Config {
                reason: "cluster needs at least one node".to_string(),
            });
        }
        if self.nodes.contains(&Self::CLIENT_ID) {
            return Err(RaftError::Config {
                reason: format!("node id {} is reserved for clients", Self::CLIENT_ID),
            });
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.nodes.iter().find(|id| !seen.insert(**id)) {
            return Err(RaftError::Config {
                reason: format!("node {dup} listed more than once"),
            });
        }
        Ok(())
    }

    /// View of the cluster from node `id`.
    pub fn node(&self, id: NodeId) -> Result<NodeConfig> {
        if !self.nodes.contains(&id) {
            return Err(RaftError::UnknownNode { id });
        }
        Ok(NodeConfig {
            id,
            peers: self.nodes.iter().copied().filter(|&n| n != id).collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}
