//! Custom Resource Definitions for the Pool Topology Operator
//!
//! This module contains all CRD types:
//! - StoragePoolPolicy: desired topology policy (bounds, RAID, eligibility)
//! - StoragePoolCluster: computed pool topology, one pool per node

pub mod pool_cluster;
pub mod pool_policy;

pub use pool_cluster::*;
pub use pool_policy::*;

// Re-export common types for convenience
pub use chrono::{DateTime, Utc};
pub use std::collections::BTreeMap;
