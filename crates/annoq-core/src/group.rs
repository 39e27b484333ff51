//! Graph grouping: display-oriented bucketing of a canonical graph.
//!
//! A pure pass over [`CanonicalGraph`]: entities are reordered into
//! type/label buckets but never filtered, dropped, or mutated. Grouping an
//! already-grouped graph is a no-op.

use crate::models::CanonicalGraph;

/// Group a canonical graph for display.
///
/// With zero edges the result is a node-only grouping (nodes bucketed by
/// type); otherwise nodes are bucketed by type and edges by relationship
/// label. Counts are carried through unchanged.
pub fn group_graph(graph: CanonicalGraph) -> CanonicalGraph {
    if graph.edges.is_empty() {
        group_node_only(graph)
    } else {
        group_by_relationship(graph)
    }
}

/// Node-only grouping: bucket nodes by type. Used when no edges matched.
pub fn group_node_only(mut graph: CanonicalGraph) -> CanonicalGraph {
    graph
        .nodes
        .sort_by(|a, b| (&a.node_type, &a.id).cmp(&(&b.node_type, &b.id)));
    graph
}

/// Relationship grouping: bucket edges by label and nodes by type.
fn group_by_relationship(mut graph: CanonicalGraph) -> CanonicalGraph {
    graph
        .nodes
        .sort_by(|a, b| (&a.node_type, &a.id).cmp(&(&b.node_type, &b.id)));
    graph
        .edges
        .sort_by(|a, b| (&a.label, &a.source, &a.target).cmp(&(&b.label, &b.source, &b.target)));
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GraphEdge, GraphNode};
    use std::collections::BTreeMap;

    fn node(id: &str, node_type: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            properties: BTreeMap::new(),
        }
    }

    fn edge(label: &str, source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            id: crate::models::short_id(),
            label: label.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            properties: BTreeMap::new(),
        }
    }

    fn mixed_graph() -> CanonicalGraph {
        CanonicalGraph::with_computed_counts(
            vec![
                node("Disease d1", "Disease"),
                node("Gene g2", "Gene"),
                node("Gene g1", "Gene"),
            ],
            vec![
                edge("TRANSCRIBED_TO", "Gene g1", "Transcript t1"),
                edge("ASSOCIATED_WITH", "Gene g1", "Disease d1"),
            ],
        )
    }

    #[test]
    fn test_grouping_preserves_entities_and_counts() {
        let graph = mixed_graph();
        let counts = graph.counts();
        let node_ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();

        let grouped = group_graph(graph);
        assert_eq!(grouped.counts(), counts);
        assert_eq!(grouped.nodes.len(), 3);
        assert_eq!(grouped.edges.len(), 2);
        for id in node_ids {
            assert!(grouped.nodes.iter().any(|n| n.id == id));
        }
    }

    #[test]
    fn test_nodes_bucketed_by_type_edges_by_label() {
        let grouped = group_graph(mixed_graph());
        let types: Vec<&str> = grouped.nodes.iter().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, vec!["Disease", "Gene", "Gene"]);
        let labels: Vec<&str> = grouped.edges.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["ASSOCIATED_WITH", "TRANSCRIBED_TO"]);
    }

    #[test]
    fn test_node_only_path_when_no_edges() {
        let graph = CanonicalGraph::with_computed_counts(
            vec![node("Gene g2", "Gene"), node("Gene g1", "Gene")],
            vec![],
        );
        let grouped = group_graph(graph);
        assert!(grouped.edges.is_empty());
        assert_eq!(grouped.nodes[0].id, "Gene g1");
        assert_eq!(grouped.nodes[1].id, "Gene g2");
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let once = group_graph(mixed_graph());
        let twice = group_graph(once.clone());
        assert_eq!(once, twice);
    }
}
