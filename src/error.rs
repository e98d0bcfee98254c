//! Error types for the Pool Topology Operator
//!
//! Provides structured error types for policy validation, node planning,
//! and RAID-group assembly.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    // =========================================================================
    // Policy Errors
    // =========================================================================
    #[error("Invalid pool count bounds: min {min}, max {max}")]
    InvalidBounds { min: i64, max: i64 },

    #[error("Invalid disk config: {reason}")]
    InvalidDiskConfig { reason: String },

    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    // =========================================================================
    // RAID Errors
    // =========================================================================
    #[error("Unsupported RAID type: {raid_type}")]
    UnsupportedRaidType { raid_type: String },

    #[error("Invalid device count {count}: must be greater than zero")]
    InvalidDeviceCount { count: i64 },

    #[error("Device count {count} is not valid for RAID type {raid_type}")]
    InvalidDeviceCountForRaidType { raid_type: String, count: u32 },

    #[error("Invalid pool spec for node {node}: {source}")]
    PoolSpecInvalid {
        node: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Node Planning Errors
    // =========================================================================
    #[error("Insufficient eligible nodes: need {needed}, have {available}")]
    InsufficientEligibleNodes { needed: usize, available: usize },

    #[error("Node not found in allowed set: {node}")]
    NodeNotFound { node: String },

    #[error("Selector evaluation failed for node {node}: {reason}")]
    SelectorEvaluationFailed { node: String, reason: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::SelectorEvaluationFailed { .. } => {
                ErrorAction::RequeueWithBackoff
            }

            // The cluster may grow into the bounds - medium retry
            Error::InsufficientEligibleNodes { .. } | Error::NodeNotFound { .. } => {
                ErrorAction::RequeueAfter(Duration::from_secs(60))
            }

            // Policy/validation errors - don't retry until the spec changes
            Error::Configuration(_)
            | Error::InvalidBounds { .. }
            | Error::InvalidDiskConfig { .. }
            | Error::MissingRequiredField { .. }
            | Error::UnsupportedRaidType { .. }
            | Error::InvalidDeviceCount { .. }
            | Error::InvalidDeviceCountForRaidType { .. }
            | Error::PoolSpecInvalid { .. }
            | Error::YamlParse(_)
            | Error::JsonParse(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Kube(_) | Error::SelectorEvaluationFailed { .. })
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
