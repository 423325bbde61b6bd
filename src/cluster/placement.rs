//! Placement Policy
//!
//! Picks the nodes that receive a new upload. The walk is a plain scan in
//! node id order so that placement is reproducible run to run.

use super::{NodeId, NodeRegistry};

/// Select up to `factor` active nodes for a new upload, lowest ids first.
///
/// Returns fewer than `factor` ids when not enough nodes are active; the
/// caller decides whether that is an error.
pub fn select_for_upload(registry: &NodeRegistry, factor: usize) -> Vec<NodeId> {
    registry
        .nodes()
        .iter()
        .filter(|node| node.is_active())
        .map(|node| node.id)
        .take(factor)
        .collect()
}
