//! Metadata Module
//!
//! Maps each stored filename to the ordered list of nodes believed to
//! hold a copy, and checkpoints that map to a line-based text file.

pub mod codec;
mod store;

pub use store::{MetadataStore, ReplicaSet, FileRecord};
