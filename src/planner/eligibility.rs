//! Node Eligibility Filter
//!
//! Filters observed cluster resources down to the nodes allowed to host a
//! pool under the policy's selector terms. The filter memoizes the allowed
//! set within one planning pass; construct a fresh filter per reconciliation
//! so the cache can never go stale across passes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Error, Result};

// =============================================================================
// Node Identity
// =============================================================================

/// Identity of a node: name plus the unique id of that incarnation
///
/// Two references are equal only when both fields match; a node recreated
/// under the same name is a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    pub name: String,
    pub uid: String,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.uid)
    }
}

// =============================================================================
// Candidate Node
// =============================================================================

/// A node observed in the cluster, as the planner sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateNode {
    /// Node name
    pub name: String,

    /// Unique id of this node incarnation
    pub uid: String,

    /// When the node was created
    pub creation_timestamp: DateTime<Utc>,

    /// Node labels used for selector evaluation
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl CandidateNode {
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.name.clone(), self.uid.clone())
    }
}

/// An observed cluster object; only nodes matter to the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClusterResource {
    Node(CandidateNode),
    BlockDevice(BlockDeviceInfo),
}

/// A block device observed on some node, carried through untouched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceInfo {
    pub name: String,
    pub node_name: String,
}

// =============================================================================
// Selector Terms
// =============================================================================

/// One eligibility term: every condition inside it must hold
///
/// Terms are OR'd together by the evaluator; an empty term list means the
/// policy is permissive and every node matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectorTerm {
    /// Labels the node must carry, all of them
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,

    /// Field requirements, e.g. "metadata.name" -> "node-001"
    #[serde(default)]
    pub match_fields: BTreeMap<String, String>,
}

/// External capability evaluating selector terms against a node
///
/// The planner treats the selector language as opaque; any evaluation error
/// aborts eligibility computation for the whole pass.
pub trait SelectorEvaluator {
    fn evaluate(&self, node: &CandidateNode, terms: &[SelectorTerm]) -> Result<bool>;
}

/// Default evaluator over node labels and a small set of metadata fields
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelSelectorEvaluator;

impl SelectorEvaluator for LabelSelectorEvaluator {
    fn evaluate(&self, node: &CandidateNode, terms: &[SelectorTerm]) -> Result<bool> {
        for term in terms {
            if term_matches(node, term)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn term_matches(node: &CandidateNode, term: &SelectorTerm) -> Result<bool> {
    for (key, value) in &term.match_labels {
        if node.labels.get(key) != Some(value) {
            return Ok(false);
        }
    }
    for (field, value) in &term.match_fields {
        let actual = match field.as_str() {
            "metadata.name" => &node.name,
            "metadata.uid" => &node.uid,
            other => {
                return Err(Error::SelectorEvaluationFailed {
                    node: node.name.clone(),
                    reason: format!("unknown field selector: {}", other),
                })
            }
        };
        if actual != value {
            return Ok(false);
        }
    }
    Ok(true)
}

// =============================================================================
// Eligibility Filter
// =============================================================================

/// Short-lived filter over the observed resource list
///
/// One instance serves one planning pass: `allowed_nodes` forces a
/// recompute, `allowed_nodes_or_cached` reuses the memoized result.
pub struct EligibilityFilter {
    resources: Vec<ClusterResource>,
    terms: Vec<SelectorTerm>,
    evaluator: Box<dyn SelectorEvaluator>,
    allowed: Option<Vec<CandidateNode>>,
}

impl EligibilityFilter {
    /// Filter with the default label/field evaluator
    pub fn new(resources: Vec<ClusterResource>, terms: Vec<SelectorTerm>) -> Self {
        Self::with_evaluator(resources, terms, Box::new(LabelSelectorEvaluator))
    }

    /// Filter with a caller-supplied selector evaluator
    pub fn with_evaluator(
        resources: Vec<ClusterResource>,
        terms: Vec<SelectorTerm>,
        evaluator: Box<dyn SelectorEvaluator>,
    ) -> Self {
        Self {
            resources,
            terms,
            evaluator,
            allowed: None,
        }
    }

    /// All Node-kind resources, in input order
    pub fn all_nodes(&self) -> Vec<CandidateNode> {
        self.resources
            .iter()
            .filter_map(|resource| match resource {
                ClusterResource::Node(node) => Some(node.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn all_node_count(&self) -> usize {
        self.all_nodes().len()
    }

    /// Nodes matching the policy, recomputed and cached
    ///
    /// An empty term list is permissive-by-default: every node is allowed.
    pub fn allowed_nodes(&mut self) -> Result<Vec<CandidateNode>> {
        let nodes = self.all_nodes();

        let allowed = if self.terms.is_empty() {
            nodes
        } else {
            let mut matched = Vec::new();
            for node in nodes {
                if self.evaluator.evaluate(&node, &self.terms)? {
                    matched.push(node);
                }
            }
            matched
        };

        debug!(
            allowed = allowed.len(),
            total = self.all_node_count(),
            "evaluated node eligibility"
        );
        self.allowed = Some(allowed.clone());
        Ok(allowed)
    }

    /// Cached allowed set when non-empty, otherwise compute and cache
    pub fn allowed_nodes_or_cached(&mut self) -> Result<Vec<CandidateNode>> {
        match &self.allowed {
            Some(cached) if !cached.is_empty() => Ok(cached.clone()),
            _ => self.allowed_nodes(),
        }
    }

    pub fn allowed_node_count(&mut self) -> Result<usize> {
        Ok(self.allowed_nodes_or_cached()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn make_node(name: &str, uid: &str, labels: &[(&str, &str)]) -> CandidateNode {
        CandidateNode {
            name: name.to_string(),
            uid: uid.to_string(),
            creation_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn resources(nodes: Vec<CandidateNode>) -> Vec<ClusterResource> {
        nodes.into_iter().map(ClusterResource::Node).collect()
    }

    #[test]
    fn test_all_nodes_filters_kind() {
        let mut list = resources(vec![
            make_node("node-1", "u1", &[]),
            make_node("node-2", "u2", &[]),
        ]);
        list.push(ClusterResource::BlockDevice(BlockDeviceInfo {
            name: "bd1".into(),
            node_name: "node-1".into(),
        }));

        let filter = EligibilityFilter::new(list, Vec::new());
        assert_eq!(filter.all_node_count(), 2);
        assert_eq!(filter.all_nodes()[0].name, "node-1");
    }

    #[test]
    fn test_empty_policy_allows_all() {
        let list = resources(vec![
            make_node("node-1", "u1", &[]),
            make_node("node-2", "u2", &[]),
        ]);
        let mut filter = EligibilityFilter::new(list, Vec::new());
        assert_eq!(filter.allowed_node_count().unwrap(), 2);
    }

    #[test]
    fn test_terms_are_ored() {
        let list = resources(vec![
            make_node("node-1", "u1", &[("zone", "a")]),
            make_node("node-2", "u2", &[("zone", "b")]),
            make_node("node-3", "u3", &[("zone", "c")]),
        ]);
        let terms = vec![
            SelectorTerm {
                match_labels: BTreeMap::from([("zone".to_string(), "a".to_string())]),
                ..Default::default()
            },
            SelectorTerm {
                match_labels: BTreeMap::from([("zone".to_string(), "c".to_string())]),
                ..Default::default()
            },
        ];
        let mut filter = EligibilityFilter::new(list, terms);
        let allowed = filter.allowed_nodes().unwrap();
        assert_eq!(allowed.len(), 2);
        assert_eq!(allowed[0].name, "node-1");
        assert_eq!(allowed[1].name, "node-3");
    }

    #[test]
    fn test_term_conditions_are_anded() {
        let list = resources(vec![make_node(
            "node-1",
            "u1",
            &[("zone", "a"), ("storage", "fast")],
        )]);
        let terms = vec![SelectorTerm {
            match_labels: BTreeMap::from([
                ("zone".to_string(), "a".to_string()),
                ("storage".to_string(), "slow".to_string()),
            ]),
            ..Default::default()
        }];
        let mut filter = EligibilityFilter::new(list, terms);
        assert_eq!(filter.allowed_node_count().unwrap(), 0);
    }

    #[test]
    fn test_match_fields() {
        let list = resources(vec![
            make_node("node-1", "u1", &[]),
            make_node("node-2", "u2", &[]),
        ]);
        let terms = vec![SelectorTerm {
            match_fields: BTreeMap::from([("metadata.name".to_string(), "node-2".to_string())]),
            ..Default::default()
        }];
        let mut filter = EligibilityFilter::new(list, terms);
        let allowed = filter.allowed_nodes().unwrap();
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].name, "node-2");
    }

    #[test]
    fn test_unknown_field_selector_fails() {
        let list = resources(vec![make_node("node-1", "u1", &[])]);
        let terms = vec![SelectorTerm {
            match_fields: BTreeMap::from([("spec.unschedulable".to_string(), "false".to_string())]),
            ..Default::default()
        }];
        let mut filter = EligibilityFilter::new(list, terms);
        assert_matches!(
            filter.allowed_nodes(),
            Err(Error::SelectorEvaluationFailed { .. })
        );
    }

    #[test]
    fn test_cache_is_reused() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct CountingEvaluator(Rc<Cell<usize>>);
        impl SelectorEvaluator for CountingEvaluator {
            fn evaluate(&self, _node: &CandidateNode, _terms: &[SelectorTerm]) -> Result<bool> {
                self.0.set(self.0.get() + 1);
                Ok(true)
            }
        }

        let calls = Rc::new(Cell::new(0));
        let list = resources(vec![make_node("node-1", "u1", &[])]);
        let terms = vec![SelectorTerm::default()];
        let mut filter = EligibilityFilter::with_evaluator(
            list,
            terms,
            Box::new(CountingEvaluator(calls.clone())),
        );

        filter.allowed_nodes_or_cached().unwrap();
        filter.allowed_nodes_or_cached().unwrap();
        filter.allowed_node_count().unwrap();
        assert_eq!(calls.get(), 1);

        // A forced recompute bypasses the cache
        filter.allowed_nodes().unwrap();
        assert_eq!(calls.get(), 2);
    }
}
