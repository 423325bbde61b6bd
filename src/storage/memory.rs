//! In-memory storage with fault injection

use std::collections::{HashMap, HashSet};
use std::io;

use super::BlobStore;
use crate::cluster::NodeId;

/// Keeps every node's files in a map. Nodes marked faulty fail every
/// operation that touches them, which lets callers exercise storage faults.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<(NodeId, String), Vec<u8>>,
    faulty: HashSet<NodeId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `node` fail until cleared
    pub fn inject_fault(&mut self, node: NodeId) {
        self.faulty.insert(node);
    }

    /// Stop failing operations on `node`
    pub fn clear_fault(&mut self, node: NodeId) {
        self.faulty.remove(&node);
    }

    /// Check whether `node` holds `filename`
    pub fn has(&self, node: NodeId, filename: &str) -> bool {
        self.blobs.contains_key(&(node, filename.to_string()))
    }

    /// Nodes holding `filename`, in id order
    pub fn holders(&self, filename: &str) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .blobs
            .keys()
            .filter(|(_, name)| name == filename)
            .map(|(node, _)| *node)
            .collect();
        nodes.sort_unstable();
        nodes
    }

    fn check(&self, node: NodeId) -> io::Result<()> {
        if self.faulty.contains(&node) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected fault on node {}", node),
            ));
        }
        Ok(())
    }
}

impl BlobStore for MemoryStore {
    fn put(&mut self, node: NodeId, filename: &str, data: &[u8]) -> io::Result<()> {
        self.check(node)?;
        self.blobs.insert((node, filename.to_string()), data.to_vec());
        Ok(())
    }

    fn get(&self, node: NodeId, filename: &str) -> io::Result<Vec<u8>> {
        self.check(node)?;
        self.blobs
            .get(&(node, filename.to_string()))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not on node {}", filename, node),
                )
            })
    }

    fn remove(&mut self, node: NodeId, filename: &str) -> io::Result<()> {
        self.check(node)?;
        self.blobs.remove(&(node, filename.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_injection() {
        let mut store = MemoryStore::new();
        store.put(1, "a", b"data").unwrap();

        store.inject_fault(1);
        assert!(store.get(1, "a").is_err());
        assert!(store.copy(1, 2, "a").is_err());
        assert!(!store.has(2, "a"));

        store.clear_fault(1);
        store.copy(1, 2, "a").unwrap();
        assert_eq!(store.holders("a"), vec![1, 2]);
    }
}
