//! RAID Policy Validator
//!
//! Pure functions validating a RAID group's device count against the
//! combinatorial constraints of its type, plus defaulting helpers.
//!
//! Defaulting is permissive (an unknown type with a preset device count is
//! left untouched as an escape hatch) while validation is strict (unknown
//! types always fail). The asymmetry is intentional layering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

// =============================================================================
// RAID Type
// =============================================================================

/// Redundancy scheme for a data RAID group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RaidType {
    /// No redundancy, one group per device
    Stripe,
    /// Two-way mirror
    Mirror,
    /// Single parity, 2^n data devices
    Raidz,
    /// Double parity, 2^n data devices
    Raidz2,
}

impl std::fmt::Display for RaidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaidType::Stripe => write!(f, "stripe"),
            RaidType::Mirror => write!(f, "mirror"),
            RaidType::Raidz => write!(f, "raidz"),
            RaidType::Raidz2 => write!(f, "raidz2"),
        }
    }
}

impl FromStr for RaidType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stripe" => Ok(RaidType::Stripe),
            "mirror" => Ok(RaidType::Mirror),
            "raidz" => Ok(RaidType::Raidz),
            "raidz2" => Ok(RaidType::Raidz2),
            other => Err(Error::UnsupportedRaidType {
                raid_type: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// RAID Group Config
// =============================================================================

/// RAID settings for the data groups of a pool
///
/// The type is kept as a free-form string so that a policy carrying an
/// unrecognized type with an explicit device count can pass defaulting;
/// [`validate`] still rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaidGroupConfig {
    /// RAID type: stripe, mirror, raidz, or raidz2
    #[serde(default)]
    pub raid_type: String,

    /// Total devices per group; 0 means "use the type default"
    #[serde(default)]
    pub device_count: u32,
}

impl RaidGroupConfig {
    pub fn new(raid_type: impl Into<String>, device_count: u32) -> Self {
        Self {
            raid_type: raid_type.into(),
            device_count,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Default device count for a RAID type
pub fn default_device_count(raid_type: &str) -> Result<u32> {
    match RaidType::from_str(raid_type)? {
        RaidType::Stripe => Ok(1),
        RaidType::Mirror => Ok(2),
        RaidType::Raidz => Ok(3),
        RaidType::Raidz2 => Ok(6),
    }
}

/// Fill in the default device count when none was configured
///
/// A nonzero count is left untouched even for unknown types.
pub fn populate_default_device_count(config: &mut RaidGroupConfig) -> Result<()> {
    if config.device_count == 0 {
        config.device_count = default_device_count(&config.raid_type)?;
    }
    Ok(())
}

/// Validate a device count against its RAID type's combinatorial rule
///
/// mirror requires exactly 2 devices; stripe accepts any positive count;
/// raidz requires count-1 in {2, 4, 8, ...}; raidz2 the same on count-2.
pub fn validate(config: &RaidGroupConfig) -> Result<()> {
    if config.device_count == 0 {
        return Err(Error::InvalidDeviceCount {
            count: config.device_count as i64,
        });
    }

    let valid = match RaidType::from_str(&config.raid_type)? {
        RaidType::Stripe => true,
        RaidType::Mirror => config.device_count == 2,
        RaidType::Raidz => is_parity_group_count(config.device_count, 1),
        RaidType::Raidz2 => is_parity_group_count(config.device_count, 2),
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDeviceCountForRaidType {
            raid_type: config.raid_type.clone(),
            count: config.device_count,
        })
    }
}

/// Usable data devices per group, excluding redundancy overhead
pub fn data_device_count(config: &RaidGroupConfig) -> Result<u32> {
    validate(config)?;
    match RaidType::from_str(&config.raid_type)? {
        RaidType::Stripe => Ok(config.device_count),
        RaidType::Mirror => Ok(config.device_count / 2),
        RaidType::Raidz => Ok(config.device_count - 1),
        RaidType::Raidz2 => Ok(config.device_count - 2),
    }
}

/// True when `count - parity` is a power of two with exponent >= 1
fn is_parity_group_count(count: u32, parity: u32) -> bool {
    match count.checked_sub(parity) {
        Some(data) => data >= 2 && data.is_power_of_two(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_raid_type_round_trip() {
        for name in ["stripe", "mirror", "raidz", "raidz2"] {
            let parsed: RaidType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert_matches!(
            RaidType::from_str("raid5"),
            Err(Error::UnsupportedRaidType { .. })
        );
    }

    #[test]
    fn test_default_device_count() {
        assert_eq!(default_device_count("stripe").unwrap(), 1);
        assert_eq!(default_device_count("mirror").unwrap(), 2);
        assert_eq!(default_device_count("raidz").unwrap(), 3);
        assert_eq!(default_device_count("raidz2").unwrap(), 6);
        assert_matches!(
            default_device_count("raid10"),
            Err(Error::UnsupportedRaidType { .. })
        );
    }

    #[test]
    fn test_populate_default_device_count() {
        let mut config = RaidGroupConfig::new("raidz", 0);
        populate_default_device_count(&mut config).unwrap();
        assert_eq!(config.device_count, 3);

        // Explicit count is left alone
        let mut config = RaidGroupConfig::new("mirror", 4);
        populate_default_device_count(&mut config).unwrap();
        assert_eq!(config.device_count, 4);
    }

    #[test]
    fn test_populate_unknown_type() {
        // Unknown type with no count fails
        let mut config = RaidGroupConfig::new("raid5", 0);
        assert_matches!(
            populate_default_device_count(&mut config),
            Err(Error::UnsupportedRaidType { .. })
        );

        // Unknown type with a preset count passes defaulting...
        let mut config = RaidGroupConfig::new("raid5", 8);
        populate_default_device_count(&mut config).unwrap();
        assert_eq!(config.device_count, 8);

        // ...but never validation
        assert_matches!(
            validate(&config),
            Err(Error::UnsupportedRaidType { .. })
        );
    }

    #[test]
    fn test_validate_mirror() {
        assert!(validate(&RaidGroupConfig::new("mirror", 2)).is_ok());
        for count in [1, 3, 4] {
            assert_matches!(
                validate(&RaidGroupConfig::new("mirror", count)),
                Err(Error::InvalidDeviceCountForRaidType { .. })
            );
        }
    }

    #[test]
    fn test_validate_stripe() {
        for count in [1, 2, 3, 7, 100] {
            assert!(validate(&RaidGroupConfig::new("stripe", count)).is_ok());
        }
        assert_matches!(
            validate(&RaidGroupConfig::new("stripe", 0)),
            Err(Error::InvalidDeviceCount { .. })
        );
    }

    #[test]
    fn test_validate_raidz() {
        for count in [3, 5, 9, 17] {
            assert!(validate(&RaidGroupConfig::new("raidz", count)).is_ok());
        }
        for count in [1, 2, 4, 6, 8] {
            assert!(validate(&RaidGroupConfig::new("raidz", count)).is_err());
        }
    }

    #[test]
    fn test_validate_raidz2() {
        for count in [4, 6, 10, 18] {
            assert!(validate(&RaidGroupConfig::new("raidz2", count)).is_ok());
        }
        for count in [2, 3, 5, 8, 9] {
            assert!(validate(&RaidGroupConfig::new("raidz2", count)).is_err());
        }
    }

    #[test]
    fn test_data_device_count() {
        assert_eq!(data_device_count(&RaidGroupConfig::new("stripe", 4)).unwrap(), 4);
        assert_eq!(data_device_count(&RaidGroupConfig::new("mirror", 2)).unwrap(), 1);
        assert_eq!(data_device_count(&RaidGroupConfig::new("raidz", 5)).unwrap(), 4);
        assert_eq!(data_device_count(&RaidGroupConfig::new("raidz2", 10)).unwrap(), 8);
    }
}
