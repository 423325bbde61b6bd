//! Metadata store
//!
//! In-memory map from filename to replica set, checkpointed to disk after
//! every structural change. The in-memory map stays authoritative for the
//! rest of the process even when a checkpoint fails.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::codec;
use crate::cluster::NodeId;
use crate::error::{Error, Result};

/// Ordered, duplicate-free list of nodes believed to hold a file.
///
/// Order is assignment history: initial placement first, then nodes
/// appended by healing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaSet(Vec<NodeId>);

impl ReplicaSet {
    /// Build a replica set, keeping the first occurrence of each id
    pub fn new(ids: impl IntoIterator<Item = NodeId>) -> Self {
        let mut set = Self(Vec::new());
        for id in ids {
            set.push(id);
        }
        set
    }

    /// Append a node id. Returns false if it was already present.
    pub fn push(&mut self, id: NodeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ReplicaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{}", ids.join(" "))
    }
}

/// Snapshot of one metadata entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub replicas: ReplicaSet,
}

/// Filename to replica set mapping with file-backed checkpoints
#[derive(Debug)]
pub struct MetadataStore {
    entries: BTreeMap<String, ReplicaSet>,
    path: PathBuf,
}

impl MetadataStore {
    /// Create an empty store that checkpoints to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            entries: BTreeMap::new(),
            path,
        }
    }

    /// Open the store at `path`, loading any prior state.
    ///
    /// Node ids outside `1..=max_node` and repeated ids are dropped; a
    /// record left without ids is not retained. A load failure is logged
    /// and leaves the store empty.
    pub fn open(path: PathBuf, max_node: NodeId) -> Self {
        let mut store = Self::new(path);

        if !store.path.exists() {
            info!("No metadata at {:?}, starting empty", store.path);
            return store;
        }

        match fs::read_to_string(&store.path) {
            Ok(content) => {
                for (filename, ids) in codec::decode(&content) {
                    let known = ids.iter().copied().filter(|id| {
                        let valid = *id >= 1 && *id <= max_node;
                        if !valid {
                            warn!("Dropping unknown node {} from metadata for {}", id, filename);
                        }
                        valid
                    });
                    let replicas = ReplicaSet::new(known);
                    if replicas.is_empty() {
                        warn!("Skipping metadata for {}: no usable replicas", filename);
                        continue;
                    }
                    store.entries.insert(filename, replicas);
                }
                info!("Metadata loaded from disk ({} files)", store.entries.len());
            }
            Err(e) => {
                warn!("Failed to load metadata from {:?}: {}", store.path, e);
            }
        }

        store
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current map to disk.
    ///
    /// Writes to a sibling temp file and renames it into place, so a failed
    /// write never leaves a truncated checkpoint behind.
    pub fn persist(&self) -> Result<()> {
        let content = codec::encode(
            self.entries
                .iter()
                .map(|(name, replicas)| (name.as_str(), replicas.ids())),
        );

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(e) = fs::write(&tmp, content).and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Persistence(format!("{:?}: {}", self.path, e)));
        }

        debug!("Saved metadata with {} entries", self.entries.len());
        Ok(())
    }

    /// Get a file's replica set
    pub fn get(&self, filename: &str) -> Option<&ReplicaSet> {
        self.entries.get(filename)
    }

    /// Get a mutable replica set
    pub fn get_mut(&mut self, filename: &str) -> Option<&mut ReplicaSet> {
        self.entries.get_mut(filename)
    }

    /// Check if a file is tracked
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Insert or replace a file's replica set. Empty sets are not stored.
    pub fn insert(&mut self, filename: String, replicas: ReplicaSet) -> Option<ReplicaSet> {
        if replicas.is_empty() {
            return self.entries.remove(&filename);
        }
        self.entries.insert(filename, replicas)
    }

    /// Remove a file's entry
    pub fn remove(&mut self, filename: &str) -> Option<ReplicaSet> {
        self.entries.remove(filename)
    }

    /// Tracked filenames in sorted order
    pub fn filenames(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Iterate over all entries in filename order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReplicaSet)> {
        self.entries.iter()
    }

    /// Owned snapshot of every entry in filename order
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.entries
            .iter()
            .map(|(filename, replicas)| FileRecord {
                filename: filename.clone(),
                replicas: replicas.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replica_set_dedupes() {
        let mut set = ReplicaSet::new(vec![3, 1, 3, 2, 1]);
        assert_eq!(set.ids(), &[3, 1, 2]);
        assert!(!set.push(2));
        assert!(set.push(4));
        assert_eq!(set.ids(), &[3, 1, 2, 4]);
        assert_eq!(set.to_string(), "3 1 2 4");
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.txt");

        let mut store = MetadataStore::new(path.clone());
        store.insert("x.txt".to_string(), ReplicaSet::new(vec![1, 2, 3]));
        store.persist().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "x.txt:1,2,3\n");

        let reloaded = MetadataStore::open(path, 4);
        assert_eq!(reloaded.snapshot(), store.snapshot());
        assert_eq!(reloaded.get("x.txt").unwrap().ids(), &[1, 2, 3]);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.txt"), 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_filters_unknown_nodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.txt");
        fs::write(
            &path,
            "a.txt:1,2,3,\nb.txt:0,9\nc.txt:2,2,4\ngarbage\nd.txt:1,oops\n",
        )
        .unwrap();

        let store = MetadataStore::open(path, 4);
        assert_eq!(store.filenames(), vec!["a.txt", "c.txt"]);
        assert_eq!(store.get("c.txt").unwrap().ids(), &[2, 4]);
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("metadata.txt");
        fs::create_dir(&path).unwrap();

        let mut store = MetadataStore::new(path);
        store.insert("a.txt".to_string(), ReplicaSet::new(vec![1]));

        let err = store.persist().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(store.contains("a.txt"));
        assert!(!dir.path().join("metadata.txt.tmp").exists());
    }

    #[test]
    fn test_insert_empty_set_removes_entry() {
        let dir = tempdir().unwrap();
        let mut store = MetadataStore::new(dir.path().join("metadata.txt"));
        store.insert("a.txt".to_string(), ReplicaSet::new(vec![1, 2]));
        store.insert("a.txt".to_string(), ReplicaSet::default());
        assert!(!store.contains("a.txt"));
    }
}
