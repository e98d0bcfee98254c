//! StoragePoolCluster CRD
//!
//! The desired pool topology computed by the planner: one pool entry per
//! participating node, each pinning itself to its node by hostname and
//! carrying the RAID groups its block devices are assembled into.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node-selector label key used to pin a pool to its node
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

// =============================================================================
// StoragePoolCluster CRD
// =============================================================================

/// StoragePoolCluster describes the desired storage-pool topology across a
/// set of nodes. It is recomputed fresh every reconciliation; continuity
/// comes from feeding the previously applied plan back into the planner.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storage.billyronks.io",
    version = "v1",
    kind = "StoragePoolCluster",
    plural = "storagepoolclusters",
    shortname = "spc",
    status = "StoragePoolClusterStatus",
    printcolumn = r#"{"name": "Pools", "type": "integer", "jsonPath": ".status.desiredPoolCount"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolClusterSpec {
    /// One pool entry per participating node
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// A single node's pool: where it runs and what its RAID groups contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    /// Node selector pinning this pool to one node (hostname label)
    pub node_selector: BTreeMap<String, String>,

    /// Data RAID groups, each an ordered list of block devices
    pub data_raid_groups: Vec<RaidGroup>,

    /// Pool-level settings
    pub pool_config: PoolConfig,
}

impl PoolSpec {
    /// Hostname this pool is pinned to, when the selector carries one
    pub fn host_name(&self) -> Option<&str> {
        self.node_selector.get(HOSTNAME_LABEL).map(|s| s.as_str())
    }

    /// Total block devices across all groups
    pub fn device_count(&self) -> usize {
        self.data_raid_groups
            .iter()
            .map(|g| g.block_devices.len())
            .sum()
    }
}

/// An ordered set of block devices combined under one redundancy scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaidGroup {
    /// Block devices in this group
    pub block_devices: Vec<BlockDeviceRef>,
}

/// Reference to a block device by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceRef {
    /// Name of the block device resource
    pub block_device_name: String,
}

impl BlockDeviceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            block_device_name: name.into(),
        }
    }
}

/// Pool-level configuration rendered with fixed defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// RAID type of the data groups
    pub data_raid_group_type: String,

    /// Thick provisioning; always false at this layer
    #[serde(default)]
    pub thick_provision: bool,

    /// Compression setting; always "off" at this layer
    #[serde(default = "default_compression")]
    pub compression: String,
}

impl PoolConfig {
    /// Fixed defaults for a freshly planned pool
    pub fn for_raid_type(raid_type: impl Into<String>) -> Self {
        Self {
            data_raid_group_type: raid_type.into(),
            thick_provision: false,
            compression: default_compression(),
        }
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_compression() -> String {
    "off".to_string()
}

// =============================================================================
// Status
// =============================================================================

/// Status of the StoragePoolCluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolClusterStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Number of pools in the desired plan
    #[serde(default)]
    pub desired_pool_count: u32,

    /// Last reconcile time
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_reconcile_time: Option<DateTime<Utc>>,

    /// Conditions
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

/// Cluster lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ClusterPhase {
    #[default]
    Pending,
    Planned,
    Degraded,
    Error,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Planned => write!(f, "Planned"),
            ClusterPhase::Degraded => write!(f, "Degraded"),
            ClusterPhase::Error => write!(f, "Error"),
        }
    }
}

/// Cluster condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: String,
    /// Last transition time
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Message
    #[serde(default)]
    pub message: Option<String>,
}

impl StoragePoolClusterStatus {
    /// Set a condition, replacing any existing condition of the same type
    pub fn set_condition(&mut self, condition: ClusterCondition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
    }
}
