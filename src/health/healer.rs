//! Re-replication
//!
//! Restores a file's replica count toward the replication factor by copying
//! from the first live replica. Healing runs in two phases:
//!
//! 1. Restore original slots: re-stage the content on every failed node
//!    already in the replica set, so the file is whole again when that node
//!    comes back. Each restored slot counts toward the target even though the
//!    node is still down.
//! 2. Expand: if still short, copy to active nodes outside the replica set in
//!    id order and append them to it.
//!
//! Progress made before a storage fault is kept and checkpointed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::{NodeId, NodeRegistry};
use crate::error::{Error, Result};
use crate::metadata::MetadataStore;
use crate::storage::BlobStore;

/// How a repair attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairStatus {
    /// The file is not in the metadata map
    Untracked,
    /// Already at or above the replication factor, nothing done
    Healthy,
    /// No replica is active, nothing to copy from
    NoLiveSource,
    /// Replica count reached the replication factor
    Repaired,
    /// Ran out of candidate nodes before reaching the factor
    Partial,
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairStatus::Untracked => write!(f, "UNTRACKED"),
            RepairStatus::Healthy => write!(f, "HEALTHY"),
            RepairStatus::NoLiveSource => write!(f, "NO_LIVE_SOURCE"),
            RepairStatus::Repaired => write!(f, "REPAIRED"),
            RepairStatus::Partial => write!(f, "PARTIAL"),
        }
    }
}

/// Result of a single repair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub filename: String,
    /// Node the copies were made from
    pub source: Option<NodeId>,
    /// Failed nodes in the replica set that got a fresh copy
    pub restored: Vec<NodeId>,
    /// Active nodes appended to the replica set
    pub added: Vec<NodeId>,
    /// Replica count after the repair, restored slots included
    pub replica_count: usize,
    pub status: RepairStatus,
}

impl RepairOutcome {
    fn new(filename: &str, replica_count: usize, status: RepairStatus) -> Self {
        Self {
            filename: filename.to_string(),
            source: None,
            restored: Vec::new(),
            added: Vec::new(),
            replica_count,
            status,
        }
    }

    /// Check if any copy was made
    pub fn made_progress(&self) -> bool {
        !self.restored.is_empty() || !self.added.is_empty()
    }
}

/// Re-replicates under-replicated files
#[derive(Debug, Clone)]
pub struct Healer {
    factor: usize,
}

impl Healer {
    pub fn new(factor: usize) -> Self {
        Self { factor }
    }

    /// Replication factor this healer works toward
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Repair a single file.
    ///
    /// Returns `Err(ReplicationFailed)` if a copy faults; copies made before
    /// the fault stay in the replica set and are checkpointed.
    pub fn repair<S: BlobStore>(
        &self,
        filename: &str,
        registry: &NodeRegistry,
        metadata: &mut MetadataStore,
        store: &mut S,
    ) -> Result<RepairOutcome> {
        let replicas = match metadata.get(filename) {
            Some(replicas) => replicas,
            None => return Ok(RepairOutcome::new(filename, 0, RepairStatus::Untracked)),
        };

        let active = registry.count_active(replicas.iter());
        if active >= self.factor {
            debug!("{} already has {} active replicas", filename, active);
            return Ok(RepairOutcome::new(filename, active, RepairStatus::Healthy));
        }

        let source = match replicas.iter().copied().find(|id| registry.is_active(*id)) {
            Some(source) => source,
            None => {
                warn!("Cannot heal {}: no active replica to copy from", filename);
                return Ok(RepairOutcome::new(filename, 0, RepairStatus::NoLiveSource));
            }
        };

        let mut outcome = RepairOutcome::new(filename, active, RepairStatus::Partial);
        outcome.source = Some(source);

        let copied = self.heal_from(source, registry, metadata, store, &mut outcome);

        if let Err(e) = metadata.persist() {
            warn!("Failed to save metadata after healing {}: {}", filename, e);
        }

        copied?;
        if outcome.replica_count >= self.factor {
            outcome.status = RepairStatus::Repaired;
        }
        Ok(outcome)
    }

    fn heal_from<S: BlobStore>(
        &self,
        source: NodeId,
        registry: &NodeRegistry,
        metadata: &mut MetadataStore,
        store: &mut S,
        outcome: &mut RepairOutcome,
    ) -> Result<()> {
        let filename = outcome.filename.clone();
        let fault = |node: NodeId, e: std::io::Error| Error::ReplicationFailed {
            filename: filename.clone(),
            node,
            reason: e.to_string(),
        };

        // Phase A: restore original slots on failed nodes
        let original: Vec<NodeId> = metadata
            .get(&filename)
            .map(|replicas| replicas.ids().to_vec())
            .unwrap_or_default();

        for id in original {
            if outcome.replica_count >= self.factor {
                break;
            }
            if registry.is_active(id) {
                continue;
            }
            store.copy(source, id, &filename).map_err(|e| fault(id, e))?;
            outcome.replica_count += 1;
            outcome.restored.push(id);
            info!("RE-REPLICATED: File '{}' restored to Node {}", filename, id);
        }

        // Phase B: expand onto active nodes outside the replica set
        for node in registry.nodes() {
            if outcome.replica_count >= self.factor {
                break;
            }
            let listed = metadata
                .get(&filename)
                .map(|replicas| replicas.contains(node.id))
                .unwrap_or(true);
            if !node.is_active() || listed {
                continue;
            }
            store.copy(source, node.id, &filename).map_err(|e| fault(node.id, e))?;
            if let Some(replicas) = metadata.get_mut(&filename) {
                replicas.push(node.id);
            }
            outcome.replica_count += 1;
            outcome.added.push(node.id);
            info!("RE-REPLICATED: File '{}' added to Node {}", filename, node.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ReplicaSet;
    use crate::storage::MemoryStore;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        registry: NodeRegistry,
        metadata: MetadataStore,
        store: MemoryStore,
    }

    /// `a.txt` stored on `ids` in a cluster of `nodes`
    fn fixture(nodes: NodeId, ids: Vec<NodeId>) -> Fixture {
        let dir = tempdir().unwrap();
        let mut metadata = MetadataStore::new(dir.path().join("metadata.txt"));
        let mut store = MemoryStore::new();
        for id in &ids {
            store.put(*id, "a.txt", b"payload").unwrap();
        }
        metadata.insert("a.txt".to_string(), ReplicaSet::new(ids));
        metadata.persist().unwrap();

        Fixture {
            _dir: dir,
            registry: NodeRegistry::new(nodes),
            metadata,
            store,
        }
    }

    #[test]
    fn test_untracked_file_is_noop() {
        let mut fx = fixture(4, vec![1, 2, 3]);
        let outcome = Healer::new(3)
            .repair("missing", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();
        assert_eq!(outcome.status, RepairStatus::Untracked);
    }

    #[test]
    fn test_healthy_file_is_untouched() {
        let mut fx = fixture(4, vec![1, 2, 3]);
        let path = fx.metadata.path().to_path_buf();
        let before = std::fs::read_to_string(&path).unwrap();

        let healer = Healer::new(3);
        for _ in 0..3 {
            let outcome = healer
                .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
                .unwrap();
            assert_eq!(outcome.status, RepairStatus::Healthy);
            assert!(!outcome.made_progress());
        }

        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[1, 2, 3]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_no_live_source() {
        let mut fx = fixture(4, vec![1, 2, 3]);
        for id in 1..=3 {
            fx.registry.fail(id).unwrap();
        }

        let outcome = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();
        assert_eq!(outcome.status, RepairStatus::NoLiveSource);
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[1, 2, 3]);
    }

    #[test]
    fn test_restores_original_slots_first() {
        let mut fx = fixture(4, vec![1, 2, 3]);
        fx.registry.fail(1).unwrap();
        fx.registry.fail(2).unwrap();
        fx.store.remove(1, "a.txt").unwrap();
        fx.store.remove(2, "a.txt").unwrap();

        let outcome = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();

        assert_eq!(outcome.source, Some(3));
        assert_eq!(outcome.restored, vec![1, 2]);
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.replica_count, 3);
        assert_eq!(outcome.status, RepairStatus::Repaired);

        // Content is pre-staged on the failed nodes, set unchanged
        assert!(fx.store.has(1, "a.txt"));
        assert!(fx.store.has(2, "a.txt"));
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[1, 2, 3]);
    }

    #[test]
    fn test_restore_stops_at_factor() {
        let mut fx = fixture(4, vec![1, 2, 3, 4]);
        for id in 1..=3 {
            fx.registry.fail(id).unwrap();
            fx.store.remove(id, "a.txt").unwrap();
        }

        let outcome = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();

        assert_eq!(outcome.source, Some(4));
        assert_eq!(outcome.restored, vec![1, 2]);
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.replica_count, 3);
        assert_eq!(outcome.status, RepairStatus::Repaired);

        // Node 3 is left without a copy once the count reaches the factor
        assert!(!fx.store.has(3, "a.txt"));
        assert_eq!(fx.store.holders("a.txt"), vec![1, 2, 4]);
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_expands_to_new_nodes() {
        // Replica set only lists two nodes, one of which is down
        let mut fx = fixture(5, vec![2, 3]);
        fx.registry.fail(2).unwrap();

        let outcome = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();

        assert_eq!(outcome.restored, vec![2]);
        assert_eq!(outcome.added, vec![1]);
        assert_eq!(outcome.status, RepairStatus::Repaired);
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[2, 3, 1]);

        // Checkpointed
        let reloaded = MetadataStore::open(fx.metadata.path().to_path_buf(), 5);
        assert_eq!(reloaded.get("a.txt").unwrap().ids(), &[2, 3, 1]);
    }

    #[test]
    fn test_partial_when_cluster_too_small() {
        let mut fx = fixture(2, vec![2]);

        let outcome = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap();

        assert_eq!(outcome.added, vec![1]);
        assert_eq!(outcome.replica_count, 2);
        assert_eq!(outcome.status, RepairStatus::Partial);
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[2, 1]);
    }

    #[test]
    fn test_fault_keeps_earlier_progress() {
        let mut fx = fixture(6, vec![3]);
        // Node 2 faults, node 1 succeeds before it
        fx.store.inject_fault(2);

        let err = Healer::new(3)
            .repair("a.txt", &fx.registry, &mut fx.metadata, &mut fx.store)
            .unwrap_err();

        match err {
            Error::ReplicationFailed { node, .. } => assert_eq!(node, 2),
            other => panic!("expected ReplicationFailed, got {:?}", other),
        }
        assert_eq!(fx.metadata.get("a.txt").unwrap().ids(), &[3, 1]);

        let reloaded = MetadataStore::open(fx.metadata.path().to_path_buf(), 6);
        assert_eq!(reloaded.get("a.txt").unwrap().ids(), &[3, 1]);
    }
}
