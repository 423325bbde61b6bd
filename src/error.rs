//! WolfStore Error Types

use std::path::PathBuf;

use thiserror::Error;

use crate::cluster::NodeId;

/// Result type alias for WolfStore operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfStore error types
#[derive(Error, Debug)]
pub enum Error {
    // Node errors
    #[error("Invalid node ID {id} (valid range is 1..={max})")]
    InvalidNodeId { id: NodeId, max: NodeId },

    // Upload errors
    #[error("Source file not found: {0:?}")]
    SourceNotFound(PathBuf),

    #[error("Not enough active nodes for {required} replicas ({available} available)")]
    InsufficientReplicas { available: usize, required: usize },

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    // Lookup errors
    #[error("File not found in store: {0}")]
    NotFound(String),

    #[error("All replicas of {0} are unavailable")]
    AllReplicasUnavailable(String),

    // Storage faults
    #[error("Replication of {filename} failed on node {node}: {reason}")]
    ReplicationFailed {
        filename: String,
        node: NodeId,
        reason: String,
    },

    #[error("Deletion of {filename} failed on node {node}: {reason}")]
    DeletionFailed {
        filename: String,
        node: NodeId,
        reason: String,
    },

    // Metadata errors
    #[error("Metadata persistence error: {0}")]
    Persistence(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error came from the byte storage primitive
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::ReplicationFailed { .. } | Error::DeletionFailed { .. }
        )
    }

    /// Check if retrying the same operation later could succeed.
    /// Nothing in the engine retries on its own; this is for callers.
    pub fn is_retryable(&self) -> bool {
        self.is_storage_fault() || matches!(self, Error::AllReplicasUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let copy = Error::ReplicationFailed {
            filename: "a.txt".into(),
            node: 2,
            reason: "disk full".into(),
        };
        assert!(copy.is_storage_fault());
        assert!(copy.is_retryable());

        let unavailable = Error::AllReplicasUnavailable("a.txt".into());
        assert!(!unavailable.is_storage_fault());
        assert!(unavailable.is_retryable());

        assert!(!Error::NotFound("a.txt".into()).is_retryable());
        assert!(!Error::InvalidNodeId { id: 9, max: 4 }.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::InsufficientReplicas { available: 2, required: 3 };
        assert_eq!(
            err.to_string(),
            "Not enough active nodes for 3 replicas (2 available)"
        );

        let err = Error::InvalidNodeId { id: 0, max: 4 };
        assert_eq!(err.to_string(), "Invalid node ID 0 (valid range is 1..=4)");
    }
}
