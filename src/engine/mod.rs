//! Replication Engine
//!
//! Orchestrates uploads, downloads and deletes over the node registry,
//! metadata store and byte storage, and runs a health check after every
//! node state change.

use std::fs;
use std::io;
use std::path::{Component, Path};

use tracing::{info, warn};

use crate::cluster::{select_for_upload, Node, NodeId, NodeRegistry};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::health::{Healer, HealthMonitor, HealthReport, RepairOutcome};
use crate::metadata::{FileRecord, MetadataStore, ReplicaSet};
use crate::storage::{BlobStore, DirStore};

/// Replicated object store engine
pub struct ReplicationEngine<S: BlobStore> {
    registry: NodeRegistry,
    metadata: MetadataStore,
    store: S,
    monitor: HealthMonitor,
}

impl ReplicationEngine<DirStore> {
    /// Build an engine from configuration: directory-per-node storage under
    /// `storage.data_dir` and metadata loaded from the configured file.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.storage.data_dir)?;

        let node_count = config.node_count();
        let store = DirStore::new(config.storage.data_dir.clone(), node_count)?;
        let metadata = MetadataStore::open(config.metadata_path(), node_count);

        Ok(Self::new(
            NodeRegistry::new(node_count),
            metadata,
            store,
            config.cluster.replication_factor,
        ))
    }
}

impl<S: BlobStore> ReplicationEngine<S> {
    /// Create an engine from its parts
    pub fn new(registry: NodeRegistry, metadata: MetadataStore, store: S, factor: usize) -> Self {
        info!(
            "Replication engine ready: {} nodes, factor {}, {} files tracked",
            registry.len(),
            factor,
            metadata.len()
        );

        Self {
            registry,
            metadata,
            store,
            monitor: HealthMonitor::new(Healer::new(factor)),
        }
    }

    /// Replication factor
    pub fn factor(&self) -> usize {
        self.monitor.healer().factor()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// All nodes in id order
    pub fn nodes(&self) -> &[Node] {
        self.registry.nodes()
    }

    /// Upload the file at `source` under `filename`.
    pub fn upload(&mut self, filename: &str, source: &Path) -> Result<ReplicaSet> {
        validate_filename(filename)?;

        let data = match fs::read(source) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound(source.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        self.upload_bytes(filename, &data)
    }

    /// Replicate `data` as `filename` onto the first active nodes.
    ///
    /// Any earlier entry for `filename` is replaced; copies it left on nodes
    /// outside the new replica set are not cleaned up. A storage fault
    /// leaves the metadata untouched, without rolling back copies already
    /// written.
    pub fn upload_bytes(&mut self, filename: &str, data: &[u8]) -> Result<ReplicaSet> {
        validate_filename(filename)?;

        let factor = self.factor();
        let targets = select_for_upload(&self.registry, factor);
        if targets.len() < factor {
            return Err(Error::InsufficientReplicas {
                available: targets.len(),
                required: factor,
            });
        }

        for &node in &targets {
            self.store
                .put(node, filename, data)
                .map_err(|e| Error::ReplicationFailed {
                    filename: filename.to_string(),
                    node,
                    reason: e.to_string(),
                })?;
        }

        let replicas = ReplicaSet::new(targets);
        if let Some(previous) = self.metadata.insert(filename.to_string(), replicas.clone()) {
            info!("Replaced replica set [{}] of {}", previous, filename);
        }
        info!("Uploaded {} to nodes [{}]", filename, replicas);

        self.checkpoint();
        Ok(replicas)
    }

    /// Read a file from the first active node in its replica set.
    ///
    /// Only that node is tried: a storage fault there fails the read rather
    /// than falling through to the next replica.
    pub fn read(&self, filename: &str) -> Result<(NodeId, Vec<u8>)> {
        let replicas = self
            .metadata
            .get(filename)
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;

        let node = replicas
            .iter()
            .copied()
            .find(|id| self.registry.is_active(*id))
            .ok_or_else(|| Error::AllReplicasUnavailable(filename.to_string()))?;

        let data = self
            .store
            .get(node, filename)
            .map_err(|e| Error::ReplicationFailed {
                filename: filename.to_string(),
                node,
                reason: e.to_string(),
            })?;

        Ok((node, data))
    }

    /// Download a file to `destination`, returning the node it came from
    pub fn download(&self, filename: &str, destination: &Path) -> Result<NodeId> {
        let (node, data) = self.read(filename)?;

        fs::write(destination, data).map_err(|e| Error::ReplicationFailed {
            filename: filename.to_string(),
            node,
            reason: format!("writing {:?}: {}", destination, e),
        })?;

        info!("Downloaded {} from node {} to {:?}", filename, node, destination);
        Ok(node)
    }

    /// Remove a file from every node in its replica set, then forget it.
    ///
    /// A removal fault aborts with the metadata unchanged; removals that
    /// already happened are not undone.
    pub fn delete(&mut self, filename: &str) -> Result<ReplicaSet> {
        let replicas = self
            .metadata
            .get(filename)
            .cloned()
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;

        for &node in replicas.iter() {
            self.store
                .remove(node, filename)
                .map_err(|e| Error::DeletionFailed {
                    filename: filename.to_string(),
                    node,
                    reason: e.to_string(),
                })?;
        }

        self.metadata.remove(filename);
        info!("Deleted {} from nodes [{}]", filename, replicas);

        self.checkpoint();
        Ok(replicas)
    }

    /// Snapshot of every tracked file and its replica set
    pub fn list(&self) -> Vec<FileRecord> {
        self.metadata.snapshot()
    }

    /// Fail a node, then run a health check
    pub fn fail_node(&mut self, id: NodeId) -> Result<HealthReport> {
        self.registry.fail(id)?;
        info!("Node {} is inactive", id);
        Ok(self.check_health())
    }

    /// Recover a node, then run a health check
    pub fn recover_node(&mut self, id: NodeId) -> Result<HealthReport> {
        self.registry.recover(id)?;
        info!("Node {} is active", id);
        Ok(self.check_health())
    }

    /// Scan every file and heal the ones at risk
    pub fn check_health(&mut self) -> HealthReport {
        self.monitor
            .check_all(&self.registry, &mut self.metadata, &mut self.store)
    }

    /// Repair a single file directly
    pub fn repair(&mut self, filename: &str) -> Result<RepairOutcome> {
        self.monitor
            .healer()
            .repair(filename, &self.registry, &mut self.metadata, &mut self.store)
    }

    /// Number of active replicas a file currently has
    pub fn active_replicas(&self, filename: &str) -> Option<usize> {
        self.metadata
            .get(filename)
            .map(|replicas| self.registry.count_active(replicas.iter()))
    }

    fn checkpoint(&self) {
        if let Err(e) = self.metadata.persist() {
            warn!("Warning: Failed to save metadata: {}", e);
        }
    }
}

/// Reject names that would break the metadata format, leave a node's
/// storage directory, or alias another name on disk.
fn validate_filename(filename: &str) -> Result<()> {
    let invalid = || Error::InvalidFilename(filename.to_string());

    if filename.trim().is_empty() || filename.contains([':', '\n', '\r']) {
        return Err(invalid());
    }

    // `components()` folds away `.` and repeated separators, so check the raw segments
    if filename
        .split(['/', '\\'])
        .any(|segment| matches!(segment, "" | "." | ".."))
    {
        return Err(invalid());
    }

    let path = Path::new(filename);
    if path.is_absolute() || path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(invalid());
    }

    Ok(())
}
