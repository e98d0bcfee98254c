//! Planning Engine
//!
//! Drives one full planning pass: validate the policy, filter eligible
//! nodes, stabilize the node plan against the previous cycle's output, and
//! assemble the desired pool cluster. All-or-nothing: any failure aborts the
//! pass with no partial output, and the caller retries next reconciliation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crd::pool_cluster::StoragePoolCluster;
use crate::crd::pool_policy::StoragePoolPolicySpec;
use crate::error::{Error, Result};
use crate::planner::eligibility::{
    ClusterResource, EligibilityFilter, NodeIdentity, SelectorEvaluator,
};
use crate::planner::group_builder::DiskGroupBuilder;
use crate::planner::node_plan::NodePlanner;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Devices on one node: what should belong to the pool now, and what was
/// previously assigned and is still attached
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAssignment {
    #[serde(default)]
    pub desired: Vec<String>,

    #[serde(default)]
    pub observed: Vec<String>,
}

/// Everything observed this reconciliation cycle
///
/// `previous_plan` is the plan this engine produced last cycle, fed back in
/// by the caller; that feedback loop is the only cross-cycle state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    /// Cluster objects; non-Node kinds are ignored by eligibility
    #[serde(default)]
    pub resources: Vec<ClusterResource>,

    /// Node plan from the previous cycle
    #[serde(default)]
    pub previous_plan: Vec<NodeIdentity>,

    /// Per-node device assignments, keyed by node name
    #[serde(default)]
    pub device_assignments: IndexMap<String, DeviceAssignment>,
}

/// Output of one planning pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    /// Nodes participating in the cluster, in plan order
    pub nodes: Vec<NodeIdentity>,

    /// Desired pool topology
    pub pool_cluster: StoragePoolCluster,
}

// =============================================================================
// Engine
// =============================================================================

/// One engine per governed pool cluster; stateless across passes
pub struct PlanningEngine {
    name: String,
    namespace: String,
}

impl PlanningEngine {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Run a planning pass with the default selector evaluator
    pub fn plan(
        &self,
        policy: &StoragePoolPolicySpec,
        state: &ObservedState,
    ) -> Result<DesiredState> {
        let filter = EligibilityFilter::new(
            state.resources.clone(),
            policy.node_selector_terms.clone(),
        );
        self.plan_with_filter(policy, state, filter)
    }

    /// Run a planning pass with a caller-supplied selector evaluator
    pub fn plan_with_evaluator(
        &self,
        policy: &StoragePoolPolicySpec,
        state: &ObservedState,
        evaluator: Box<dyn SelectorEvaluator>,
    ) -> Result<DesiredState> {
        let filter = EligibilityFilter::with_evaluator(
            state.resources.clone(),
            policy.node_selector_terms.clone(),
            evaluator,
        );
        self.plan_with_filter(policy, state, filter)
    }

    fn plan_with_filter(
        &self,
        policy: &StoragePoolPolicySpec,
        state: &ObservedState,
        mut filter: EligibilityFilter,
    ) -> Result<DesiredState> {
        policy.validate()?;
        let bounds = policy.pool_count_bounds()?;
        let raid_config = policy.normalized_raid_config()?;

        let available = filter.allowed_node_count()?;
        if available < bounds.min {
            return Err(Error::InsufficientEligibleNodes {
                needed: bounds.min,
                available,
            });
        }

        let planner = NodePlanner::new(state.previous_plan.clone(), bounds.min, bounds.max);
        let nodes = planner.plan(&mut filter)?;

        let mut builder =
            DiskGroupBuilder::new(&self.name, &self.namespace, &raid_config.raid_type);
        for node in &nodes {
            let assignment = state
                .device_assignments
                .get(&node.name)
                .cloned()
                .unwrap_or_default();
            builder = builder
                .desired_devices(&node.name, assignment.desired)
                .observed_devices(&node.name, assignment.observed);
        }
        builder =
            builder.ordered_host_names(nodes.iter().map(|n| n.name.clone()).collect());

        let pool_cluster = builder.build()?;
        info!(
            cluster = self.name.as_str(),
            nodes = nodes.len(),
            pools = pool_cluster.spec.pools.len(),
            raid = raid_config.raid_type.as_str(),
            "computed desired pool topology"
        );

        Ok(DesiredState {
            nodes,
            pool_cluster,
        })
    }
}
