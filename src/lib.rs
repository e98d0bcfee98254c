//! Pool Topology Operator - Planning Core
//!
//! A reconciliation planner for storage-pool topology: given a policy
//! (pool-count bounds, RAID requirements, node eligibility rules) and the
//! observed cluster state, it computes a stable, minimally disruptive plan
//! of which nodes host a pool and how each node's disks form RAID groups.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Planning Engine                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │  Eligibility   │──▶│   Node Plan    │──▶│   Disk-Group     │  │
//! │  │  Filter        │   │   Stabilizer   │   │   Builder        │  │
//! │  └────────────────┘   └────────────────┘   └──────────────────┘  │
//! │          │                    │                     │            │
//! │          └────────────────────┴──────────┬──────────┘            │
//! │                                          │                       │
//! │                               ┌──────────┴──────────┐            │
//! │                               │ RAID Policy         │            │
//! │                               │ Validator           │            │
//! │                               └─────────────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core is purely transformational: `(policy, previous plan, observed
//! state) -> (node plan, desired StoragePoolCluster)`. Identity continuity
//! across cycles comes from the caller feeding the previous plan back in.
//!
//! # Modules
//!
//! - [`crd`]: Custom Resource Definitions (policy in, pool cluster out)
//! - [`planner`]: eligibility, node planning, RAID validation, group assembly
//! - [`error`]: Error types and handling

pub mod crd;
pub mod error;
pub mod planner;

// Re-export commonly used types
pub use crd::{
    BlockDeviceRef, ClusterCondition, ClusterPhase, ExternalDiskConfig, LocalDiskConfig,
    PoolConfig, PoolCountBounds, PoolSpec, RaidGroup, StoragePoolCluster,
    StoragePoolClusterSpec, StoragePoolClusterStatus, StoragePoolPolicy, StoragePoolPolicySpec,
    HOSTNAME_LABEL,
};

pub use error::{Error, ErrorAction, Result};

pub use planner::{
    CandidateNode, ClusterResource, DesiredState, DeviceAssignment, DiskGroupBuilder,
    EligibilityFilter, LabelSelectorEvaluator, NodeIdentity, NodePlanner, ObservedState,
    PlanningEngine, RaidGroupConfig, RaidType, SelectorEvaluator, SelectorTerm,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
