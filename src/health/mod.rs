//! Health Module
//!
//! Scans tracked files after node state changes and re-replicates the
//! ones that have dropped below a safe number of live copies.

mod healer;
mod monitor;

pub use healer::{Healer, RepairOutcome, RepairStatus};
pub use monitor::{HealthMonitor, HealthReport, AtRiskFile, RepairFailure, MIN_SAFE_REPLICAS};
