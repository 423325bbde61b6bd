//! WolfStore Configuration
//!
//! This module provides configuration structures for the replicated
//! object store: cluster shape, on-disk layout and logging.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cluster::NodeId;

/// Main WolfStore configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cluster shape
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// On-disk layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of storage nodes, fixed for the process lifetime
    #[serde(default = "default_nodes")]
    pub nodes: usize,

    /// Target number of active replicas per file
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
}

/// Storage layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding node directories and the metadata file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Metadata file name, relative to `data_dir`
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Prefix prepended to the file name on download
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_nodes() -> usize {
    4
}

fn default_replication_factor() -> usize {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_metadata_file() -> String {
    "metadata.txt".to_string()
}

fn default_download_prefix() -> String {
    "downloaded_".to_string()
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metadata_file: default_metadata_file(),
            download_prefix: default_download_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: StoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.cluster.nodes == 0 {
            return Err(crate::Error::Config("cluster.nodes must be at least 1".into()));
        }

        if NodeId::try_from(self.cluster.nodes).is_err() {
            return Err(crate::Error::Config("cluster.nodes is too large".into()));
        }

        if self.cluster.replication_factor == 0 {
            return Err(crate::Error::Config(
                "cluster.replication_factor must be at least 1".into(),
            ));
        }

        if self.storage.metadata_file.is_empty() {
            return Err(crate::Error::Config("storage.metadata_file cannot be empty".into()));
        }

        if self.storage.download_prefix.is_empty() {
            return Err(crate::Error::Config("storage.download_prefix cannot be empty".into()));
        }

        if self.cluster.replication_factor > self.cluster.nodes {
            tracing::warn!(
                "replication_factor {} exceeds node count {}; every upload will fail",
                self.cluster.replication_factor,
                self.cluster.nodes
            );
        }

        Ok(())
    }

    /// Number of nodes as a node id bound
    pub fn node_count(&self) -> NodeId {
        NodeId::try_from(self.cluster.nodes).unwrap_or(NodeId::MAX)
    }

    /// Get the metadata file path
    pub fn metadata_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.metadata_file)
    }

    /// Get the destination path for a downloaded file.
    ///
    /// The prefix goes on the final path component, so `docs/a.txt`
    /// lands at `docs/downloaded_a.txt`.
    pub fn download_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        let base = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let target = format!("{}{}", self.storage.download_prefix, base);

        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(target),
            _ => PathBuf::from(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[cluster]
nodes = 5
replication_factor = 2

[storage]
data_dir = "/var/lib/wolfstore"
"#;

        let config = StoreConfig::from_str(toml).unwrap();
        assert_eq!(config.cluster.nodes, 5);
        assert_eq!(config.cluster.replication_factor, 2);
        assert_eq!(config.storage.metadata_file, "metadata.txt");
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/var/lib/wolfstore/metadata.txt")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StoreConfig::from_str("").unwrap();
        assert_eq!(config.cluster.nodes, 4);
        assert_eq!(config.cluster.replication_factor, 3);
        assert_eq!(config.logging.level, "error");
    }

    #[test]
    fn test_validation_rejects_zero_nodes() {
        let err = StoreConfig::from_str("[cluster]\nnodes = 0\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));

        let err = StoreConfig::from_str("[cluster]\nreplication_factor = 0\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_download_path() {
        let config = StoreConfig::default();
        assert_eq!(config.download_path("a.txt"), PathBuf::from("downloaded_a.txt"));
        assert_eq!(
            config.download_path("docs/a.txt"),
            PathBuf::from("docs/downloaded_a.txt")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wolfstore.toml");

        let mut config = StoreConfig::default();
        config.cluster.nodes = 6;
        config.save(&path).unwrap();

        let loaded = StoreConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.cluster.nodes, 6);

        let missing = StoreConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(missing.cluster.nodes, 4);
    }
}
