//! Command-line host for a simulated kvraft cluster.
//!
//! Every node runs in this process; an in-process router moves messages
//! between them one delivery round at a time. A scripted client finds the
//! leader with `WhoIsLeader` and then submits each operation in order.
//!
//! # Example usage
//!
//! ```bash
//! # three in-memory nodes
//! cargo run --bin kvraft-sim -- put:a:1 append:a:2 get:a
//!
//! # five nodes persisted under ./data, rerun to see the state recovered
//! cargo run --bin kvraft-sim -- --nodes 5 --data-dir ./data get:a
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueHint};

use kvraft_core::{
    ClusterConfig, Command, Envelope, LogStore, MemoryStore, Message, Node, NodeId, WriteOp,
};
use kvraft_storage::FileStore;

const CLIENT: NodeId = ClusterConfig::CLIENT_ID;

/// Command-line arguments for the simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run a simulated kvraft cluster and drive it with client operations")]
struct Args {
    /// Number of nodes, ids 1..=N (ignored with --config)
    #[arg(long, default_value_t = 3)]
    nodes: u64,

    /// JSON cluster file, e.g. { "nodes": [1, 2, 3] }
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Keep each node's state in <DATA_DIR>/node-<id> instead of memory
    #[arg(long, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Delivery rounds to wait for any single reply
    #[arg(long, default_value_t = 50)]
    rounds: usize,

    /// Operations: put:KEY:VALUE, append:KEY:VALUE or get:KEY
    #[arg(required = true)]
    ops: Vec<Op>,
}

/// One scripted client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Write(Command),
    Read(String),
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("put"), Some(key), Some(value)) if !key.is_empty() => {
                Ok(Op::Write(Command::put(key, value)))
            }
            (Some("append"), Some(key), Some(value)) if !key.is_empty() => {
                Ok(Op::Write(Command::append(key, value)))
            }
            (Some("get"), Some(key), None) if !key.is_empty() => Ok(Op::Read(key.to_string())),
            _ => Err(format!(
                "invalid operation '{s}', expected put:KEY:VALUE, append:KEY:VALUE or get:KEY"
            )),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Write(command) => {
                let op = match command.op {
                    WriteOp::Put => "put",
                    WriteOp::Append => "append",
                };
                write!(f, "{op}:{}:{}", command.key, command.value)
            }
            Op::Read(key) => write!(f, "get:{key}"),
        }
    }
}

/// Nodes plus the router between them and the client.
struct Cluster<S> {
    nodes: BTreeMap<NodeId, Node<S>>,
    client_inbox: Vec<Message>,
    next_request: u64,
}

impl<S: LogStore> Cluster<S> {
    fn open(config: &ClusterConfig, mut open_store: impl FnMut(NodeId) -> Result<S>) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for &id in &config.nodes {
            let store = open_store(id).with_context(|| format!("failed to open store of node {id}"))?;
            nodes.insert(id, Node::new(config.node(id)?, store));
        }
        Ok(Self {
            nodes,
            client_inbox: Vec::new(),
            next_request: 0,
        })
    }

    fn node(&self, id: NodeId) -> Result<&Node<S>> {
        self.nodes.get(&id).ok_or_else(|| anyhow!("node {id} is not in the cluster"))
    }

    fn route(&mut self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            if envelope.to == CLIENT {
                self.client_inbox.push(envelope.message);
            } else if let Some(node) = self.nodes.get_mut(&envelope.to) {
                node.deliver(envelope);
            } else {
                tracing::warn!(to = envelope.to, kind = envelope.message.kind(), "message to unknown node dropped");
            }
        }
    }

    fn flush(&mut self) {
        let out: Vec<_> = self.nodes.values_mut().flat_map(Node::take_outbox).collect();
        self.route(out);
    }

    /// Step every node once, then deliver what they sent.
    fn round(&mut self) -> Result<()> {
        for (id, node) in &mut self.nodes {
            node.step().with_context(|| format!("node {id} failed"))?;
        }
        self.flush();
        Ok(())
    }

    fn request_id(&mut self) -> String {
        self.next_request += 1;
        format!("client-{}", self.next_request)
    }

    /// Send `message` to `to` and run rounds until the reply for `request_id` arrives.
    fn request(&mut self, to: NodeId, request_id: &str, message: Message, max_rounds: usize) -> Result<Message> {
        self.route(vec![Envelope::new(CLIENT, to, message)]);
        for _ in 0..max_rounds {
            self.round()?;
            if let Some(position) = self
                .client_inbox
                .iter()
                .position(|m| reply_id(m) == Some(request_id))
            {
                return Ok(self.client_inbox.remove(position));
            }
        }
        bail!("no reply to {request_id} from node {to} after {max_rounds} rounds")
    }

    /// Have `candidate` run for leader, then ask it who leads until someone does.
    fn elect(&mut self, candidate: NodeId, max_rounds: usize) -> Result<NodeId> {
        self.nodes
            .get_mut(&candidate)
            .ok_or_else(|| anyhow!("node {candidate} is not in the cluster"))?
            .campaign()?;
        self.flush();

        for _ in 0..max_rounds {
            let request_id = self.request_id();
            let message = Message::WhoIsLeader {
                request_id: request_id.clone(),
            };
            if let Message::LeaderIdentity {
                leader: Some(leader),
                ..
            } = self.request(candidate, &request_id, message, max_rounds)?
            {
                return Ok(leader);
            }
        }
        bail!("no leader emerged after {max_rounds} attempts")
    }

    fn submit(&mut self, leader: NodeId, op: &Op, max_rounds: usize) -> Result<Message> {
        let request_id = self.request_id();
        let message = match op {
            Op::Write(command) => Message::ClientWrite {
                request_id: request_id.clone(),
                command: command.clone(),
            },
            Op::Read(key) => Message::ClientRead {
                request_id: request_id.clone(),
                key: key.clone(),
            },
        };
        self.request(leader, &request_id, message, max_rounds)
    }
}

fn reply_id(message: &Message) -> Option<&str> {
    match message {
        Message::LeaderIdentity { request_id, .. }
        | Message::WriteConfirmed { request_id }
        | Message::ReadResult { request_id, .. } => Some(request_id),
        _ => None,
    }
}

fn describe(reply: &Message) -> String {
    match reply {
        Message::WriteConfirmed { .. } => "ok".to_string(),
        Message::ReadResult { value: Some(value), .. } => value.clone(),
        Message::ReadResult { value: None, .. } => "(not found)".to_string(),
        other => format!("unexpected reply {}", other.kind()),
    }
}

/// Elect the first configured node and run every operation against the leader.
fn run<S: LogStore>(mut cluster: Cluster<S>, ops: &[Op], max_rounds: usize) -> Result<Vec<String>> {
    let candidate = *cluster
        .nodes
        .keys()
        .next()
        .ok_or_else(|| anyhow!("cluster has no nodes"))?;
    let leader = cluster.elect(candidate, max_rounds)?;
    let epoch = cluster.node(leader)?.store().epoch();
    tracing::info!(leader, epoch, "leader elected");

    let mut results = Vec::with_capacity(ops.len());
    for op in ops {
        let reply = cluster.submit(leader, op, max_rounds)?;
        results.push(format!("{op} -> {}", describe(&reply)));
    }
    Ok(results)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("failed to load cluster config {}", path.display()))?,
        None => ClusterConfig::with_size(args.nodes)?,
    };
    tracing::info!(nodes = ?config.nodes, "starting cluster");

    let results = match &args.data_dir {
        Some(dir) => {
            let cluster = Cluster::open(&config, |id| {
                Ok(FileStore::open(dir.join(format!("node-{id}")))?)
            })?;
            run(cluster, &args.ops, args.rounds)?
        }
        None => run(Cluster::open(&config, |_| Ok(MemoryStore::new()))?, &args.ops, args.rounds)?,
    };

    for line in results {
        println!("{line}");
    }
    Ok(())
}
