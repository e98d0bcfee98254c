//! StoragePoolPolicy CRD
//!
//! The upstream policy driving the planner: pool-count bounds, RAID
//! requirements, node eligibility terms, and the disk provisioning mode.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::planner::eligibility::SelectorTerm;
use crate::planner::raid::{self, RaidGroupConfig};

// =============================================================================
// StoragePoolPolicy CRD
// =============================================================================

/// StoragePoolPolicy declares how many pools the cluster should run, what
/// RAID layout each pool uses, and which nodes are eligible to host one.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storage.billyronks.io",
    version = "v1",
    kind = "StoragePoolPolicy",
    plural = "storagepoolpolicies",
    shortname = "spp",
    printcolumn = r#"{"name": "MinPools", "type": "integer", "jsonPath": ".spec.minPoolCount"}"#,
    printcolumn = r#"{"name": "MaxPools", "type": "integer", "jsonPath": ".spec.maxPoolCount"}"#,
    printcolumn = r#"{"name": "Raid", "type": "string", "jsonPath": ".spec.raidConfig.raidType"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolPolicySpec {
    /// Minimum number of pools the plan must contain
    #[serde(default = "default_min_pool_count")]
    pub min_pool_count: i64,

    /// Maximum number of pools the plan may contain
    #[serde(default = "default_max_pool_count")]
    pub max_pool_count: i64,

    /// RAID layout for each pool; an empty type defaults to mirror
    #[serde(default)]
    pub raid_config: RaidGroupConfig,

    /// Minimum block devices a node must offer
    #[serde(default)]
    pub min_device_count: Option<u32>,

    /// Minimum capacity per block device (e.g. "100Gi")
    #[serde(default)]
    pub min_device_capacity: Option<String>,

    /// Node eligibility terms; OR'd together, empty means all nodes match
    #[serde(default)]
    pub node_selector_terms: Vec<SelectorTerm>,

    /// Disks provisioned by an external provisioner
    #[serde(default)]
    pub external_disk_config: Option<ExternalDiskConfig>,

    /// Disks selected from those already attached to nodes
    #[serde(default)]
    pub local_disk_config: Option<LocalDiskConfig>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Externally provisioned disk settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDiskConfig {
    /// Provisioner responsible for creating the disks
    pub provisioner: String,

    /// Capacity per provisioned disk (e.g. "500Gi")
    #[serde(default)]
    pub capacity: Option<String>,
}

/// Local disk selection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalDiskConfig {
    /// Labels a block device must carry to be selected
    #[serde(default)]
    pub device_selector: BTreeMap<String, String>,

    /// Cap on devices taken from a single node
    #[serde(default)]
    pub max_devices_per_node: Option<u32>,
}

/// Validated pool-count bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCountBounds {
    pub min: usize,
    pub max: usize,
}

// =============================================================================
// Validation
// =============================================================================

impl StoragePoolPolicySpec {
    /// Validate the whole policy; any failure aborts the planning cycle
    pub fn validate(&self) -> Result<()> {
        self.pool_count_bounds()?;
        self.normalized_raid_config()?;

        match (&self.external_disk_config, &self.local_disk_config) {
            (Some(_), Some(_)) => Err(Error::InvalidDiskConfig {
                reason: "both external and local disk config set".into(),
            }),
            (None, None) => Err(Error::InvalidDiskConfig {
                reason: "neither external nor local disk config set".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Pool-count bounds; negative values and inverted bounds are rejected
    pub fn pool_count_bounds(&self) -> Result<PoolCountBounds> {
        if self.min_pool_count < 0 || self.max_pool_count < 0 || self.max_pool_count < self.min_pool_count {
            return Err(Error::InvalidBounds {
                min: self.min_pool_count,
                max: self.max_pool_count,
            });
        }
        Ok(PoolCountBounds {
            min: self.min_pool_count as usize,
            max: self.max_pool_count as usize,
        })
    }

    /// RAID config with the mirror default and device-count default applied
    pub fn normalized_raid_config(&self) -> Result<RaidGroupConfig> {
        let mut config = self.raid_config.clone();
        if config.raid_type.is_empty() {
            config.raid_type = "mirror".to_string();
        }
        raid::populate_default_device_count(&mut config)?;
        raid::validate(&config)?;
        Ok(config)
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_min_pool_count() -> i64 {
    1
}

fn default_max_pool_count() -> i64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn base_policy() -> StoragePoolPolicySpec {
        StoragePoolPolicySpec {
            min_pool_count: 1,
            max_pool_count: 3,
            raid_config: RaidGroupConfig::default(),
            min_device_count: None,
            min_device_capacity: None,
            node_selector_terms: Vec::new(),
            external_disk_config: None,
            local_disk_config: Some(LocalDiskConfig::default()),
        }
    }

    #[test]
    fn test_valid_policy() {
        assert!(base_policy().validate().is_ok());
    }

    #[test]
    fn test_negative_bounds_rejected() {
        let mut policy = base_policy();
        policy.min_pool_count = -1;
        assert_matches!(policy.validate(), Err(Error::InvalidBounds { .. }));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut policy = base_policy();
        policy.min_pool_count = 5;
        policy.max_pool_count = 2;
        assert_matches!(policy.validate(), Err(Error::InvalidBounds { .. }));
    }

    #[test]
    fn test_disk_config_exactly_one() {
        let mut policy = base_policy();
        policy.external_disk_config = Some(ExternalDiskConfig {
            provisioner: "local.csi".into(),
            capacity: Some("500Gi".into()),
        });
        assert_matches!(policy.validate(), Err(Error::InvalidDiskConfig { .. }));

        policy.local_disk_config = None;
        assert!(policy.validate().is_ok());

        policy.external_disk_config = None;
        assert_matches!(policy.validate(), Err(Error::InvalidDiskConfig { .. }));
    }

    #[test]
    fn test_empty_raid_type_defaults_to_mirror() {
        let policy = base_policy();
        let config = policy.normalized_raid_config().unwrap();
        assert_eq!(config.raid_type, "mirror");
        assert_eq!(config.device_count, 2);
    }

    #[test]
    fn test_pool_count_bounds() {
        let bounds = base_policy().pool_count_bounds().unwrap();
        assert_eq!(bounds, PoolCountBounds { min: 1, max: 3 });
    }
}
