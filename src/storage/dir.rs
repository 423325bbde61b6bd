//! Directory-per-node storage

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::BlobStore;
use crate::cluster::NodeId;

/// Stores each node's files under `<base>/node_<id>/`
pub struct DirStore {
    /// Base directory holding the node directories
    base_dir: PathBuf,
}

impl DirStore {
    /// Create the store, making sure every node directory exists
    pub fn new(base_dir: PathBuf, node_count: NodeId) -> io::Result<Self> {
        let store = Self { base_dir };
        for id in 1..=node_count {
            fs::create_dir_all(store.node_dir(id))?;
        }
        Ok(store)
    }

    /// Get the directory of a node
    pub fn node_dir(&self, node: NodeId) -> PathBuf {
        self.base_dir.join(format!("node_{}", node))
    }

    /// Get the path of a file on a node
    pub fn file_path(&self, node: NodeId, filename: &str) -> PathBuf {
        self.node_dir(node).join(filename)
    }

    fn ensure_parent(path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
    }
}

impl BlobStore for DirStore {
    fn put(&mut self, node: NodeId, filename: &str, data: &[u8]) -> io::Result<()> {
        let path = self.file_path(node, filename);
        Self::ensure_parent(&path)?;
        fs::write(&path, data)?;
        debug!("Wrote {} ({} bytes) to node {}", filename, data.len(), node);
        Ok(())
    }

    fn get(&self, node: NodeId, filename: &str) -> io::Result<Vec<u8>> {
        fs::read(self.file_path(node, filename))
    }

    fn remove(&mut self, node: NodeId, filename: &str) -> io::Result<()> {
        match fs::remove_file(self.file_path(node, filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn copy(&mut self, from: NodeId, to: NodeId, filename: &str) -> io::Result<()> {
        let target = self.file_path(to, filename);
        Self::ensure_parent(&target)?;
        let bytes = fs::copy(self.file_path(from, filename), &target)?;
        debug!("Copied {} ({} bytes) from node {} to node {}", filename, bytes, from, to);
        Ok(())
    }
}
