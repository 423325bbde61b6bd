//! Storage Module
//!
//! The byte-copy primitive the engine replicates through. Each node owns an
//! opaque storage location; the engine only ever puts, gets, copies and
//! removes whole files by name. Stores ignore node activity: whether a node
//! may be used is the engine's decision.

mod dir;
mod memory;

use std::io;

use crate::cluster::NodeId;

pub use dir::DirStore;
pub use memory::MemoryStore;

/// Per-node whole-file storage
pub trait BlobStore {
    /// Store `data` as `filename` on `node`, overwriting any existing copy
    fn put(&mut self, node: NodeId, filename: &str, data: &[u8]) -> io::Result<()>;

    /// Read `filename` from `node`
    fn get(&self, node: NodeId, filename: &str) -> io::Result<Vec<u8>>;

    /// Remove `filename` from `node`. Removing a missing file succeeds.
    fn remove(&mut self, node: NodeId, filename: &str) -> io::Result<()>;

    /// Copy `filename` from one node to another
    fn copy(&mut self, from: NodeId, to: NodeId, filename: &str) -> io::Result<()> {
        let data = self.get(from, filename)?;
        self.put(to, filename, &data)
    }
}
