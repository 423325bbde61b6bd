//! Replica health monitor
//!
//! Runs after every node state change. Any file with fewer than
//! [`MIN_SAFE_REPLICAS`] active replicas is flagged as at risk and handed to
//! the healer. The trigger is deliberately below the replication factor:
//! a file that lost one of three copies is left alone.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{Healer, RepairOutcome};
use crate::cluster::NodeRegistry;
use crate::metadata::MetadataStore;
use crate::storage::BlobStore;

/// Files with fewer active replicas than this get healed
pub const MIN_SAFE_REPLICAS: usize = 2;

/// A file found below the safe replica count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtRiskFile {
    pub filename: String,
    pub active_replicas: usize,
}

/// A repair that hit a storage fault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairFailure {
    pub filename: String,
    pub reason: String,
}

/// Result of a full health scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    /// Number of files scanned
    pub files_checked: usize,
    /// Files found at risk, in scan order
    pub at_risk: Vec<AtRiskFile>,
    /// Completed repairs, in scan order
    pub repairs: Vec<RepairOutcome>,
    /// Repairs that faulted
    pub failures: Vec<RepairFailure>,
}

impl HealthReport {
    /// Check if the scan found nothing at risk
    pub fn is_healthy(&self) -> bool {
        self.at_risk.is_empty()
    }
}

/// Scans every tracked file and triggers healing
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    healer: Healer,
}

impl HealthMonitor {
    pub fn new(healer: Healer) -> Self {
        Self { healer }
    }

    pub fn healer(&self) -> &Healer {
        &self.healer
    }

    /// Check every file's active replica count and heal the ones at risk.
    ///
    /// A failed repair is recorded and the scan moves on to the next file.
    pub fn check_all<S: BlobStore>(
        &self,
        registry: &NodeRegistry,
        metadata: &mut MetadataStore,
        store: &mut S,
    ) -> HealthReport {
        let mut report = HealthReport::default();

        for filename in metadata.filenames() {
            let active = match metadata.get(&filename) {
                Some(replicas) => registry.count_active(replicas.iter()),
                None => continue,
            };
            report.files_checked += 1;

            if active >= MIN_SAFE_REPLICAS {
                continue;
            }

            warn!(
                "File '{}' has only {} active replicas, data loss risk",
                filename, active
            );
            report.at_risk.push(AtRiskFile {
                filename: filename.clone(),
                active_replicas: active,
            });

            match self.healer.repair(&filename, registry, metadata, store) {
                Ok(outcome) => report.repairs.push(outcome),
                Err(e) => {
                    error!("Error during re-replication of {}: {}", filename, e);
                    report.failures.push(RepairFailure {
                        filename,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::RepairStatus;
    use crate::metadata::ReplicaSet;
    use crate::storage::MemoryStore;
    use tempfile::tempdir;

    fn track(metadata: &mut MetadataStore, store: &mut MemoryStore, name: &str, ids: Vec<u32>) {
        for id in &ids {
            store.put(*id, name, name.as_bytes()).unwrap();
        }
        metadata.insert(name.to_string(), ReplicaSet::new(ids));
    }

    #[test]
    fn test_one_lost_replica_is_not_at_risk() {
        let dir = tempdir().unwrap();
        let mut metadata = MetadataStore::new(dir.path().join("metadata.txt"));
        let mut store = MemoryStore::new();
        let mut registry = NodeRegistry::new(4);
        track(&mut metadata, &mut store, "a.txt", vec![1, 2, 3]);

        registry.fail(1).unwrap();
        let report = HealthMonitor::new(Healer::new(3)).check_all(&registry, &mut metadata, &mut store);

        assert_eq!(report.files_checked, 1);
        assert!(report.is_healthy());
        assert!(report.repairs.is_empty());
        assert!(!store.has(4, "a.txt"));
    }

    #[test]
    fn test_at_risk_file_is_healed() {
        let dir = tempdir().unwrap();
        let mut metadata = MetadataStore::new(dir.path().join("metadata.txt"));
        let mut store = MemoryStore::new();
        let mut registry = NodeRegistry::new(4);
        track(&mut metadata, &mut store, "a.txt", vec![1, 2, 3]);

        registry.fail(1).unwrap();
        registry.fail(2).unwrap();
        let report = HealthMonitor::new(Healer::new(3)).check_all(&registry, &mut metadata, &mut store);

        assert_eq!(report.at_risk.len(), 1);
        assert_eq!(report.at_risk[0].active_replicas, 1);
        assert_eq!(report.repairs.len(), 1);
        assert_eq!(report.repairs[0].restored, vec![1, 2]);
        assert_eq!(report.repairs[0].status, RepairStatus::Repaired);
    }

    #[test]
    fn test_failure_does_not_stop_scan() {
        let dir = tempdir().unwrap();
        let mut metadata = MetadataStore::new(dir.path().join("metadata.txt"));
        let mut store = MemoryStore::new();
        let mut registry = NodeRegistry::new(5);
        track(&mut metadata, &mut store, "a.txt", vec![1, 2]);
        track(&mut metadata, &mut store, "b.txt", vec![4, 5]);

        registry.fail(1).unwrap();
        registry.fail(4).unwrap();
        // a.txt heals onto node 1 (restore) which faults; b.txt must still heal
        store.inject_fault(1);

        let report = HealthMonitor::new(Healer::new(3)).check_all(&registry, &mut metadata, &mut store);

        assert_eq!(report.files_checked, 2);
        assert_eq!(report.at_risk.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "a.txt");
        assert_eq!(report.repairs.len(), 1);
        assert_eq!(report.repairs[0].filename, "b.txt");
        assert_eq!(report.repairs[0].restored, vec![4]);
        assert_eq!(report.repairs[0].added, vec![2]);
        assert_eq!(metadata.get("b.txt").unwrap().ids(), &[4, 5, 2]);
    }
}
