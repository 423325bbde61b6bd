//! Node Registry
//!
//! Tracks the fixed set of storage nodes and whether each one is
//! currently active. Node ids run from 1 to N and map to index `id - 1`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Stable node identifier, assigned at startup (1..=N)
pub type NodeId = u32;

/// Node status in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Node is serving reads and accepting replicas
    Active,
    /// Node has been failed and is unreachable
    Failed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Active => write!(f, "Active"),
            NodeStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// A single storage node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier
    pub id: NodeId,
    /// Current status
    pub status: NodeStatus,
}

impl Node {
    /// Create a new node, active by default
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            status: NodeStatus::Active,
        }
    }

    /// Check if the node is active
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

/// Fixed-size node table
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    /// Create a registry with nodes 1..=count, all active
    pub fn new(count: NodeId) -> Self {
        let nodes = (1..=count).map(Node::new).collect();
        info!("Initialized node registry with {} nodes", count);
        Self { nodes }
    }

    /// All nodes in fixed id order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the registry has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest valid node id
    pub fn max_id(&self) -> NodeId {
        self.nodes.last().map(|n| n.id).unwrap_or(0)
    }

    /// Check whether `id` names a node in this registry
    pub fn contains(&self, id: NodeId) -> bool {
        id >= 1 && id <= self.max_id()
    }

    /// Get a node by id
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.index(id).map(|idx| &self.nodes[idx])
    }

    /// Check if a node is active. Unknown ids are never active.
    pub fn is_active(&self, id: NodeId) -> bool {
        self.get(id).map(Node::is_active).unwrap_or(false)
    }

    /// Set a node's active flag, returning the previous status
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<NodeStatus> {
        let idx = self.index(id)?;
        let node = &mut self.nodes[idx];
        let previous = node.status;
        node.status = if active {
            NodeStatus::Active
        } else {
            NodeStatus::Failed
        };

        if previous == node.status {
            debug!("Node {} already {}", id, previous);
        }
        Ok(previous)
    }

    /// Mark a node as failed
    pub fn fail(&mut self, id: NodeId) -> Result<NodeStatus> {
        self.set_active(id, false)
    }

    /// Mark a node as recovered
    pub fn recover(&mut self, id: NodeId) -> Result<NodeStatus> {
        self.set_active(id, true)
    }

    /// Count how many of `ids` are currently active
    pub fn count_active<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> usize {
        ids.into_iter().filter(|id| self.is_active(**id)).count()
    }

    /// Get cluster summary
    pub fn summary(&self) -> ClusterSummary {
        let active_nodes = self.nodes.iter().filter(|n| n.is_active()).count();
        ClusterSummary {
            total_nodes: self.nodes.len(),
            active_nodes,
            failed_nodes: self.nodes.len() - active_nodes,
        }
    }

    fn index(&self, id: NodeId) -> Result<usize> {
        if self.contains(id) {
            Ok((id - 1) as usize)
        } else {
            Err(Error::InvalidNodeId {
                id,
                max: self.max_id(),
            })
        }
    }
}

/// Cluster summary information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub failed_nodes: usize,
}
