//! Disk-Group Builder
//!
//! Converts a per-node device assignment plus a RAID type into a validated
//! StoragePoolCluster. Mirror/raidz/raidz2 pools get a single group per node
//! in the given device order; stripe pools get one singleton group per
//! device, with previously observed devices keeping their slots ahead of
//! newly added ones.
//!
//! Output order follows the explicit host ordering when one is supplied;
//! otherwise it is the insertion order of the desired-device map, which the
//! caller must keep stable where determinism matters.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use crate::crd::pool_cluster::{
    BlockDeviceRef, PoolConfig, PoolSpec, RaidGroup, StoragePoolCluster, StoragePoolClusterSpec,
    HOSTNAME_LABEL,
};
use crate::error::{Error, Result};
use crate::planner::raid::{self, RaidGroupConfig, RaidType};

/// Builder for a node-pinned pool cluster spec
#[derive(Debug, Clone)]
pub struct DiskGroupBuilder {
    name: String,
    namespace: String,
    raid_type: String,
    desired_devices: IndexMap<String, Vec<String>>,
    observed_devices: IndexMap<String, Vec<String>>,
    ordered_host_names: Option<Vec<String>>,
}

impl DiskGroupBuilder {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        raid_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            raid_type: raid_type.into(),
            desired_devices: IndexMap::new(),
            observed_devices: IndexMap::new(),
            ordered_host_names: None,
        }
    }

    /// Devices that should belong to the pool on `host`
    pub fn desired_devices(mut self, host: impl Into<String>, devices: Vec<String>) -> Self {
        self.desired_devices.insert(host.into(), devices);
        self
    }

    /// Devices previously assigned on `host` and still attached
    pub fn observed_devices(mut self, host: impl Into<String>, devices: Vec<String>) -> Self {
        self.observed_devices.insert(host.into(), devices);
        self
    }

    /// Explicit output ordering for hosts; authoritative when supplied
    pub fn ordered_host_names(mut self, hosts: Vec<String>) -> Self {
        self.ordered_host_names = Some(hosts);
        self
    }

    /// Validate the inputs and render the pool cluster
    ///
    /// All validation happens before any output is produced; either the
    /// whole spec is valid or nothing is emitted. Zero nodes is a valid,
    /// empty cluster.
    pub fn build(&self) -> Result<StoragePoolCluster> {
        if self.name.is_empty() {
            return Err(Error::MissingRequiredField {
                field: "name".into(),
            });
        }
        if self.namespace.is_empty() {
            return Err(Error::MissingRequiredField {
                field: "namespace".into(),
            });
        }
        let raid_type = RaidType::from_str(&self.raid_type)?;

        for (host, devices) in &self.desired_devices {
            let config = RaidGroupConfig::new(self.raid_type.clone(), devices.len() as u32);
            raid::validate(&config).map_err(|err| Error::PoolSpecInvalid {
                node: host.clone(),
                source: Box::new(err),
            })?;
        }

        let mut pools = Vec::new();
        for host in self.host_order() {
            let devices = match self.desired_devices.get(&host) {
                Some(devices) => devices,
                None => continue,
            };
            let observed = self
                .observed_devices
                .get(&host)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let data_raid_groups = match raid_type {
                RaidType::Stripe => stripe_groups(devices, observed),
                _ => vec![single_group(devices)],
            };
            debug!(
                host = host.as_str(),
                groups = data_raid_groups.len(),
                "assembled raid groups"
            );

            pools.push(PoolSpec {
                node_selector: BTreeMap::from([(HOSTNAME_LABEL.to_string(), host.clone())]),
                data_raid_groups,
                pool_config: PoolConfig::for_raid_type(self.raid_type.clone()),
            });
        }

        let mut cluster =
            StoragePoolCluster::new(&self.name, StoragePoolClusterSpec { pools });
        cluster.metadata.namespace = Some(self.namespace.clone());
        Ok(cluster)
    }

    /// Hosts in output order: the explicit list first (skipping names with
    /// no devices), then any unlisted map entries in insertion order
    fn host_order(&self) -> Vec<String> {
        match &self.ordered_host_names {
            Some(ordered) => {
                let mut order: Vec<String> = ordered
                    .iter()
                    .filter(|host| self.desired_devices.contains_key(*host))
                    .cloned()
                    .collect();
                for host in self.desired_devices.keys() {
                    if !order.contains(host) {
                        order.push(host.clone());
                    }
                }
                order
            }
            None => self.desired_devices.keys().cloned().collect(),
        }
    }
}

/// One group holding every desired device, in its given order
fn single_group(devices: &[String]) -> RaidGroup {
    RaidGroup {
        block_devices: devices.iter().map(|d| BlockDeviceRef::new(d.as_str())).collect(),
    }
}

/// One singleton group per device; devices also present in the observed set
/// keep their slots first, in observed order, then new devices follow in
/// desired order. Slot continuity is best-effort.
fn stripe_groups(desired: &[String], observed: &[String]) -> Vec<RaidGroup> {
    let mut groups = Vec::with_capacity(desired.len());

    for device in observed {
        if desired.contains(device) {
            groups.push(single_group(std::slice::from_ref(device)));
        }
    }
    for device in desired {
        if !observed.contains(device) {
            groups.push(single_group(std::slice::from_ref(device)));
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn devices(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn group_devices(pool: &PoolSpec, group: usize) -> Vec<&str> {
        pool.data_raid_groups[group]
            .block_devices
            .iter()
            .map(|bd| bd.block_device_name.as_str())
            .collect()
    }

    #[test]
    fn test_mirror_single_group() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "mirror")
            .desired_devices("node-001", devices(&["bd1", "bd2"]))
            .build()
            .unwrap();

        assert_eq!(cluster.spec.pools.len(), 1);
        let pool = &cluster.spec.pools[0];
        assert_eq!(pool.host_name(), Some("node-001"));
        assert_eq!(pool.data_raid_groups.len(), 1);
        assert_eq!(group_devices(pool, 0), vec!["bd1", "bd2"]);
        assert_eq!(pool.pool_config.data_raid_group_type, "mirror");
        assert!(!pool.pool_config.thick_provision);
        assert_eq!(pool.pool_config.compression, "off");
    }

    #[test]
    fn test_stripe_one_group_per_device() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "stripe")
            .desired_devices("node-001", devices(&["bd1", "bd2", "bd3"]))
            .build()
            .unwrap();

        let pool = &cluster.spec.pools[0];
        assert_eq!(pool.data_raid_groups.len(), 3);
        for group in &pool.data_raid_groups {
            assert_eq!(group.block_devices.len(), 1);
        }
    }

    #[test]
    fn test_stripe_observed_devices_keep_their_slots() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "stripe")
            .desired_devices("node-001", devices(&["bd4", "bd2", "bd1"]))
            .observed_devices("node-001", devices(&["bd1", "bd2", "bd3"]))
            .build()
            .unwrap();

        // bd3 was dropped, bd4 is new: retained devices first in observed
        // order, then the new one
        let pool = &cluster.spec.pools[0];
        assert_eq!(group_devices(pool, 0), vec!["bd1"]);
        assert_eq!(group_devices(pool, 1), vec!["bd2"]);
        assert_eq!(group_devices(pool, 2), vec!["bd4"]);
    }

    #[test]
    fn test_raidz_rejects_four_devices() {
        let err = DiskGroupBuilder::new("pool-a", "storage", "raidz")
            .desired_devices("node-001", devices(&["bd1", "bd2", "bd3", "bd4"]))
            .build()
            .unwrap_err();

        assert_matches!(err, Error::PoolSpecInvalid { ref node, .. } if node == "node-001");
    }

    #[test]
    fn test_raidz_accepts_valid_counts() {
        for count in [3usize, 5, 9] {
            let names: Vec<String> = (0..count).map(|i| format!("bd{}", i)).collect();
            let cluster = DiskGroupBuilder::new("pool-a", "storage", "raidz")
                .desired_devices("node-001", names.clone())
                .build()
                .unwrap();
            assert_eq!(group_devices(&cluster.spec.pools[0], 0).len(), count);
        }
    }

    #[test]
    fn test_explicit_host_ordering() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "mirror")
            .desired_devices("node-001", devices(&["bd1", "bd2"]))
            .desired_devices("node-002", devices(&["bd3", "bd4"]))
            .ordered_host_names(vec!["node-002".into(), "node-001".into()])
            .build()
            .unwrap();

        let hosts: Vec<_> = cluster
            .spec
            .pools
            .iter()
            .map(|p| p.host_name().unwrap().to_string())
            .collect();
        assert_eq!(hosts, vec!["node-002", "node-001"]);
    }

    #[test]
    fn test_ordering_skips_unknown_hosts_and_appends_unlisted() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "mirror")
            .desired_devices("node-001", devices(&["bd1", "bd2"]))
            .desired_devices("node-002", devices(&["bd3", "bd4"]))
            .ordered_host_names(vec!["node-404".into(), "node-002".into()])
            .build()
            .unwrap();

        let hosts: Vec<_> = cluster
            .spec
            .pools
            .iter()
            .map(|p| p.host_name().unwrap().to_string())
            .collect();
        assert_eq!(hosts, vec!["node-002", "node-001"]);
    }

    #[test]
    fn test_missing_name_and_namespace() {
        let err = DiskGroupBuilder::new("", "storage", "mirror").build().unwrap_err();
        assert_matches!(err, Error::MissingRequiredField { ref field } if field == "name");

        let err = DiskGroupBuilder::new("pool-a", "", "mirror").build().unwrap_err();
        assert_matches!(err, Error::MissingRequiredField { ref field } if field == "namespace");
    }

    #[test]
    fn test_unknown_raid_type() {
        let err = DiskGroupBuilder::new("pool-a", "storage", "raid6")
            .desired_devices("node-001", devices(&["bd1"]))
            .build()
            .unwrap_err();
        assert_matches!(err, Error::UnsupportedRaidType { .. });
    }

    #[test]
    fn test_empty_input_builds_empty_cluster() {
        let cluster = DiskGroupBuilder::new("pool-a", "storage", "mirror")
            .build()
            .unwrap();
        assert!(cluster.spec.pools.is_empty());
        assert_eq!(cluster.metadata.namespace.as_deref(), Some("storage"));
    }

    #[test]
    fn test_no_partial_output_on_validation_failure() {
        // node-002 is invalid; node-001 must not leak into any output
        let err = DiskGroupBuilder::new("pool-a", "storage", "mirror")
            .desired_devices("node-001", devices(&["bd1", "bd2"]))
            .desired_devices("node-002", devices(&["bd3"]))
            .build()
            .unwrap_err();
        assert_matches!(err, Error::PoolSpecInvalid { ref node, .. } if node == "node-002");
    }
}
