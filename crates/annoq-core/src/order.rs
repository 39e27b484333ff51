//! Heuristic predicate reordering by estimated selectivity.
//!
//! Backends emit match clauses in predicate order and process patterns
//! left-to-right without a cost-based planner, so putting the most selective
//! predicates first binds more variables before the join widens. The output
//! is always a permutation of the input; node and predicate identities are
//! never changed.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AnnotationRequest, NodeMap, NodeSpec};

/// Estimate for an endpoint with no statistics. Bounded so summing two
/// unknown endpoints still ranks above an id-bound endpoint paired with an
/// unknown one.
const UNKNOWN_COST: u64 = u64::MAX / 4;

/// Precomputed per-node-type edge-count statistics for the active data
/// source. The statistic source itself is an external collaborator; this is
/// just its parsed form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphInfo {
    /// Total edges touching each node type.
    #[serde(default)]
    pub edge_counts: HashMap<String, u64>,
}

impl GraphInfo {
    /// Parse graph statistics from their JSON form. The input must be a
    /// JSON object; other shapes are rejected rather than silently read as
    /// empty statistics.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        if !value.is_object() {
            return Err(Error::Config(
                "graph statistics must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| Error::Config(e.to_string()))
    }

    fn cost_of(&self, node: &NodeSpec) -> u64 {
        // A concrete id pins the endpoint to a single entity.
        if node.id.is_some() {
            return 0;
        }
        let base = self
            .edge_counts
            .get(&node.node_type)
            .copied()
            .unwrap_or(UNKNOWN_COST);
        // Property constraints narrow the match set.
        base / (node.properties.len() as u64 + 1)
    }
}

/// Reorder the request's predicates so the cheaper (more selective) ones come
/// first. Sorting is stable: predicates with equal estimates keep their
/// relative order.
pub fn heuristic_sort(
    mut request: AnnotationRequest,
    node_map: &NodeMap,
    info: &GraphInfo,
) -> AnnotationRequest {
    if request.predicates.len() < 2 {
        return request;
    }

    request.predicates.sort_by_key(|pred| {
        let source = node_map
            .get(&pred.source)
            .map(|n| info.cost_of(n))
            .unwrap_or(UNKNOWN_COST);
        let target = node_map
            .get(&pred.target)
            .map(|n| info.cost_of(n))
            .unwrap_or(UNKNOWN_COST);
        source.saturating_add(target)
    });

    debug!(
        predicates = request.predicates.len(),
        "reordered predicates by estimated selectivity"
    );
    request
}
