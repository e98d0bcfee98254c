//! Node Plan Stabilizer
//!
//! Computes the next desired node set from the previous plan and the
//! currently allowed nodes. The primary objective is minimizing churn: a
//! previous plan that still fits the bounds is returned unchanged, and
//! adjustments touch as few nodes as possible.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::planner::eligibility::{CandidateNode, EligibilityFilter, NodeIdentity};

/// Stabilizing node planner for one reconciliation pass
///
/// `observed_nodes` is the plan computed last cycle, fed back in by the
/// caller; the planner itself keeps no state across invocations.
#[derive(Debug, Clone)]
pub struct NodePlanner {
    /// Previous plan, by node identity
    pub observed_nodes: Vec<NodeIdentity>,

    /// Minimum pool count the plan must reach
    pub min_pool_count: usize,

    /// Maximum pool count the plan may reach
    pub max_pool_count: usize,
}

impl NodePlanner {
    pub fn new(
        observed_nodes: Vec<NodeIdentity>,
        min_pool_count: usize,
        max_pool_count: usize,
    ) -> Self {
        Self {
            observed_nodes,
            min_pool_count,
            max_pool_count,
        }
    }

    /// Compute the next desired node set
    ///
    /// First-ever planning takes up to `min_pool_count` nodes in allowed
    /// order without raising an error on a shortfall; bound enforcement for
    /// that case belongs to the engine driving the pass. On later passes the
    /// previous plan is retained wherever possible, trimmed newest-first
    /// above the max, and topped up from the allowed set below the min.
    pub fn plan(&self, filter: &mut EligibilityFilter) -> Result<Vec<NodeIdentity>> {
        if self.max_pool_count < self.min_pool_count {
            return Err(Error::InvalidBounds {
                min: self.min_pool_count as i64,
                max: self.max_pool_count as i64,
            });
        }

        let allowed = filter.allowed_nodes_or_cached()?;

        if self.observed_nodes.is_empty() {
            let plan: Vec<NodeIdentity> = allowed
                .iter()
                .take(self.min_pool_count)
                .map(CandidateNode::identity)
                .collect();
            info!(nodes = plan.len(), "first-time node plan");
            return Ok(plan);
        }

        // Stale entries (gone from the allowed set) drop out silently
        let retained: Vec<NodeIdentity> = self
            .observed_nodes
            .iter()
            .filter(|id| allowed.iter().any(|n| n.identity() == **id))
            .cloned()
            .collect();
        debug!(
            observed = self.observed_nodes.len(),
            retained = retained.len(),
            "partitioned previous plan against allowed set"
        );

        if retained.len() > self.max_pool_count {
            return self.trim_newest(retained, &allowed);
        }
        if retained.len() < self.min_pool_count {
            return self.top_up(retained, &allowed);
        }

        // Stability path: the previous plan still fits, keep it unchanged
        Ok(retained)
    }

    /// Remove nodes newest-created-first until the plan fits the max
    ///
    /// Older nodes are likelier to hold established data, so they survive.
    /// Equal timestamps break by input order (stable sort).
    fn trim_newest(
        &self,
        retained: Vec<NodeIdentity>,
        allowed: &[CandidateNode],
    ) -> Result<Vec<NodeIdentity>> {
        let excess = retained.len() - self.max_pool_count;

        let mut stamped = Vec::with_capacity(retained.len());
        for (index, identity) in retained.iter().enumerate() {
            let node = allowed
                .iter()
                .find(|n| n.identity() == *identity)
                .ok_or_else(|| Error::NodeNotFound {
                    node: identity.name.clone(),
                })?;
            stamped.push((index, node.creation_timestamp));
        }
        stamped.sort_by(|a, b| b.1.cmp(&a.1));

        let removed: HashSet<usize> = stamped.iter().take(excess).map(|(i, _)| *i).collect();
        let plan: Vec<NodeIdentity> = retained
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, id)| id)
            .collect();

        info!(removed = excess, kept = plan.len(), "trimmed node plan to max");
        Ok(plan)
    }

    /// Append allowed nodes not already planned until the min is reached
    fn top_up(
        &self,
        retained: Vec<NodeIdentity>,
        allowed: &[CandidateNode],
    ) -> Result<Vec<NodeIdentity>> {
        let mut plan = retained;
        for node in allowed {
            if plan.len() == self.min_pool_count {
                break;
            }
            let identity = node.identity();
            if !plan.contains(&identity) {
                plan.push(identity);
            }
        }

        if plan.len() < self.min_pool_count {
            return Err(Error::InsufficientEligibleNodes {
                needed: self.min_pool_count,
                available: plan.len(),
            });
        }

        info!(nodes = plan.len(), "topped up node plan to min");
        Ok(plan)
    }
}
