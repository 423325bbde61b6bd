//! Cluster Module
//!
//! The fixed node table and the placement policy that picks
//! nodes for new uploads.

mod registry;
pub mod placement;

pub use registry::{Node, NodeId, NodeStatus, NodeRegistry, ClusterSummary};
pub use placement::select_for_upload;
