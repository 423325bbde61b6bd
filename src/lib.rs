//! WolfStore - Replicated Object Store
//!
//! A small replicated object store: a fixed set of storage nodes hold
//! copies of uploaded files, and the store keeps a target number of live
//! replicas per file as nodes fail and recover.
//!
//! # Architecture
//!
//! Placement is deterministic: new uploads go to the lowest-numbered
//! active nodes. Reads are served by the first active node in a file's
//! replica set. Every node failure or recovery triggers a health scan that
//! re-replicates files which have dropped below a safe number of live
//! copies.
//!
//! # Features
//!
//! - Fixed node table with fail/recover transitions
//! - Replica set bookkeeping checkpointed after every change
//! - Two-phase healing: restore lost slots, then expand onto new nodes
//! - Pluggable byte storage (directory per node, or in-memory)
//! - Interactive shell and one-shot CLI

pub mod config;
pub mod error;
pub mod cluster;
pub mod metadata;
pub mod storage;
pub mod health;
pub mod engine;
pub mod shell;

pub use config::StoreConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::error::{Error, Result};
    pub use crate::cluster::{Node, NodeId, NodeRegistry, NodeStatus};
    pub use crate::metadata::{FileRecord, MetadataStore, ReplicaSet};
    pub use crate::storage::{BlobStore, DirStore, MemoryStore};
    pub use crate::health::{HealthReport, RepairOutcome, RepairStatus};
    pub use crate::engine::ReplicationEngine;
}
