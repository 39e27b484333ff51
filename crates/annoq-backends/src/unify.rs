//! Result unification: turning backend-native match output into the
//! canonical node/edge graph.
//!
//! Two paths exist. The identity path builds a graph straight from the
//! first-pass match rows, retaining only type and id. The property path
//! expands those rows into per-property fetches for a second-pass query,
//! then pivots the returned triples back into row-shaped records.

use std::collections::{BTreeMap, HashSet};

use annoq_core::models::{short_id, CanonicalGraph, GraphEdge, GraphNode};
use annoq_core::{Error, Result, SchemaRegistry};

/// One resolved match from a backend's first-pass result. Entities are
/// rendered as `"<type> <id>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub predicate: Option<String>,
    pub source: String,
    pub target: Option<String>,
}

impl MatchRow {
    pub fn node(entity: impl Into<String>) -> Self {
        Self {
            predicate: None,
            source: entity.into(),
            target: None,
        }
    }

    pub fn edge(
        predicate: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            predicate: Some(predicate.into()),
            source: source.into(),
            target: Some(target.into()),
        }
    }
}

/// Interpret flattened result tuples as match rows.
///
/// A two-atom tuple is a node match `(type, id)`; a five-atom tuple is an
/// edge match `(predicate, source type, source id, target type, target id)`.
pub fn rows_from_tuples(tuples: &[Vec<String>]) -> Result<Vec<MatchRow>> {
    let mut rows = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let parts: Vec<&str> = tuple.iter().map(String::as_str).collect();
        match parts.as_slice() {
            [node_type, id] => rows.push(MatchRow::node(format!("{node_type} {id}"))),
            [predicate, st, sid, tt, tid] => rows.push(MatchRow::edge(
                *predicate,
                format!("{st} {sid}"),
                format!("{tt} {tid}"),
            )),
            other => {
                return Err(Error::Serialization(format!(
                    "unexpected match tuple arity {}",
                    other.len()
                )))
            }
        }
    }
    Ok(rows)
}

/// Build a graph from identity-only match rows. Nodes are deduplicated by
/// id, edges by `(label, source, target)`; counts are computed from the
/// materialized entities.
pub fn graph_from_rows(rows: &[MatchRow]) -> CanonicalGraph {
    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: Vec<GraphEdge> = Vec::new();
    let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();

    for row in rows {
        insert_node(&mut nodes, &row.source);
        if let (Some(predicate), Some(target)) = (&row.predicate, &row.target) {
            insert_node(&mut nodes, target);
            let key = (predicate.clone(), row.source.clone(), target.clone());
            if seen_edges.insert(key) {
                edges.push(GraphEdge {
                    id: short_id(),
                    label: predicate.clone(),
                    source: row.source.clone(),
                    target: target.clone(),
                    properties: BTreeMap::new(),
                });
            }
        }
    }

    CanonicalGraph::with_computed_counts(nodes.into_values().collect(), edges)
}

fn insert_node(nodes: &mut BTreeMap<String, GraphNode>, entity: &str) {
    nodes.entry(entity.to_string()).or_insert_with(|| GraphNode {
        id: entity.to_string(),
        node_type: entity.split(' ').next().unwrap_or_default().to_string(),
        properties: BTreeMap::new(),
    });
}

/// One property fetch the second-pass query must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropRequest {
    Node {
        property: String,
        entity: String,
    },
    Edge {
        property: String,
        predicate: String,
        source: String,
        target: String,
    },
}

/// Expand first-pass rows into the declared-property fetches for the
/// second-pass query. A node's properties are requested once, on the row
/// that first introduces it.
pub fn property_requests(rows: &[MatchRow], schema: &SchemaRegistry) -> Vec<PropRequest> {
    let mut requests = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for row in rows {
        push_node_requests(&mut requests, &mut seen, &row.source, schema);
        if let (Some(predicate), Some(target)) = (&row.predicate, &row.target) {
            push_node_requests(&mut requests, &mut seen, target, schema);
            if let Some(props) = schema.edge_properties(predicate) {
                for property in props {
                    requests.push(PropRequest::Edge {
                        property: property.clone(),
                        predicate: predicate.clone(),
                        source: row.source.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
    }
    requests
}

fn push_node_requests<'a>(
    requests: &mut Vec<PropRequest>,
    seen: &mut HashSet<&'a str>,
    entity: &'a str,
    schema: &SchemaRegistry,
) {
    if !seen.insert(entity) {
        return;
    }
    let node_type = entity.split(' ').next().unwrap_or_default();
    if let Some(props) = schema.type_properties(node_type) {
        for property in props {
            requests.push(PropRequest::Node {
                property: property.clone(),
                entity: entity.to_string(),
            });
        }
    }
}

/// Pivot second-pass property triples into a graph.
///
/// Node tuples are `(node <prop> <type> <id> <value…>)`; edge tuples are
/// `(edge <prop> <predicate> <stype> <sid> <ttype> <tid> <value…>)`.
/// Multi-atom values are joined with spaces. Property merge is
/// last-write-wins per key; a well-formed dataset emits each property
/// exactly once per entity.
pub fn graph_from_triples(tuples: &[Vec<String>]) -> Result<CanonicalGraph> {
    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: BTreeMap<(String, String, String), GraphEdge> = BTreeMap::new();

    for tuple in tuples {
        let parts: Vec<&str> = tuple.iter().map(String::as_str).collect();
        match parts.as_slice() {
            ["node", property, node_type, id, value @ ..] => {
                let entity = format!("{node_type} {id}");
                let node = nodes.entry(entity.clone()).or_insert_with(|| GraphNode {
                    id: entity.clone(),
                    node_type: node_type.to_string(),
                    properties: BTreeMap::new(),
                });
                node.properties.insert(property.to_string(), value.join(" "));
            }
            ["edge", property, predicate, st, sid, tt, tid, value @ ..] => {
                let source = format!("{st} {sid}");
                let target = format!("{tt} {tid}");
                insert_node(&mut nodes, &source);
                insert_node(&mut nodes, &target);
                let key = (predicate.to_string(), source.clone(), target.clone());
                let edge = edges.entry(key).or_insert_with(|| GraphEdge {
                    id: short_id(),
                    label: predicate.to_string(),
                    source,
                    target,
                    properties: BTreeMap::new(),
                });
                // "source" as a property name collides with the endpoint field
                let name = if *property == "source" {
                    "source_data".to_string()
                } else {
                    property.to_string()
                };
                edge.properties.insert(name, value.join(" "));
            }
            other => {
                return Err(Error::Serialization(format!(
                    "unexpected property tuple: {other:?}"
                )))
            }
        }
    }

    Ok(CanonicalGraph::with_computed_counts(
        nodes.into_values().collect(),
        edges.into_values().collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::from_description(
            r#"{
                "vertex_labels": [
                    {"name": "Gene", "properties": ["gene_name"]},
                    {"name": "Disease", "properties": ["disease_name"]},
                    {"name": "Transcript", "properties": []}
                ],
                "edge_labels": [
                    {
                        "name": "ASSOCIATED_WITH",
                        "properties": ["score"],
                        "source_label": "Gene",
                        "target_label": "Disease"
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    fn to_tuples(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_rows_from_tuples() {
        let tuples = to_tuples(&[
            &["Gene", "g1"],
            &["ASSOCIATED_WITH", "Gene", "g1", "Disease", "d1"],
        ]);
        let rows = rows_from_tuples(&tuples).unwrap();
        assert_eq!(rows[0], MatchRow::node("Gene g1"));
        assert_eq!(
            rows[1],
            MatchRow::edge("ASSOCIATED_WITH", "Gene g1", "Disease d1")
        );
    }

    #[test]
    fn test_rows_from_tuples_rejects_bad_arity() {
        let tuples = to_tuples(&[&["Gene", "g1", "extra"]]);
        assert!(rows_from_tuples(&tuples).is_err());
    }

    #[test]
    fn test_graph_from_rows_dedups() {
        let rows = vec![
            MatchRow::edge("ASSOCIATED_WITH", "Gene g1", "Disease d1"),
            MatchRow::edge("ASSOCIATED_WITH", "Gene g1", "Disease d1"),
            MatchRow::edge("ASSOCIATED_WITH", "Gene g2", "Disease d1"),
        ];
        let graph = graph_from_rows(&rows);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count, 2);
        let gene = graph.nodes.iter().find(|n| n.id == "Gene g1").unwrap();
        assert_eq!(gene.node_type, "Gene");
    }

    #[test]
    fn test_property_requests_introduce_each_node_once() {
        let rows = vec![
            MatchRow::edge("ASSOCIATED_WITH", "Gene g1", "Disease d1"),
            MatchRow::edge("ASSOCIATED_WITH", "Gene g1", "Disease d2"),
        ];
        let requests = property_requests(&rows, &schema());

        let gene_fetches = requests
            .iter()
            .filter(|r| matches!(r, PropRequest::Node { entity, .. } if entity == "Gene g1"))
            .count();
        assert_eq!(gene_fetches, 1);

        // edge properties are requested per matched edge
        let edge_fetches = requests
            .iter()
            .filter(|r| matches!(r, PropRequest::Edge { .. }))
            .count();
        assert_eq!(edge_fetches, 2);
    }

    #[test]
    fn test_property_requests_skip_property_less_types() {
        let rows = vec![MatchRow::node("Transcript t1")];
        assert!(property_requests(&rows, &schema()).is_empty());
    }

    #[test]
    fn test_graph_from_triples_pivots() {
        let tuples = to_tuples(&[
            &["node", "gene_name", "Gene", "g1", "BRCA1"],
            &["node", "disease_name", "Disease", "d1", "breast", "cancer"],
            &[
                "edge",
                "score",
                "ASSOCIATED_WITH",
                "Gene",
                "g1",
                "Disease",
                "d1",
                "0.92",
            ],
        ]);
        let graph = graph_from_triples(&tuples).unwrap();
        assert_eq!(graph.node_count, 2);
        assert_eq!(graph.edge_count, 1);

        let gene = graph.nodes.iter().find(|n| n.id == "Gene g1").unwrap();
        assert_eq!(gene.properties["gene_name"], "BRCA1");
        let disease = graph.nodes.iter().find(|n| n.id == "Disease d1").unwrap();
        assert_eq!(disease.properties["disease_name"], "breast cancer");

        let edge = &graph.edges[0];
        assert_eq!(edge.label, "ASSOCIATED_WITH");
        assert_eq!(edge.source, "Gene g1");
        assert_eq!(edge.target, "Disease d1");
        assert_eq!(edge.properties["score"], "0.92");
        assert_eq!(edge.id.len(), 8);
    }

    #[test]
    fn test_graph_from_triples_renames_source_property() {
        let tuples = to_tuples(&[&[
            "edge",
            "source",
            "ASSOCIATED_WITH",
            "Gene",
            "g1",
            "Disease",
            "d1",
            "gwas",
        ]]);
        let graph = graph_from_triples(&tuples).unwrap();
        let edge = &graph.edges[0];
        assert_eq!(edge.properties["source_data"], "gwas");
        assert_eq!(edge.source, "Gene g1");
    }

    #[test]
    fn test_graph_from_triples_adds_endpoint_nodes() {
        // endpoints appear even when no node triples were returned for them
        let tuples = to_tuples(&[&[
            "edge",
            "score",
            "ASSOCIATED_WITH",
            "Gene",
            "g1",
            "Disease",
            "d1",
            "0.5",
        ]]);
        let graph = graph_from_triples(&tuples).unwrap();
        assert_eq!(graph.node_count, 2);
    }

    #[test]
    fn test_graph_from_triples_last_write_wins() {
        let tuples = to_tuples(&[
            &["node", "gene_name", "Gene", "g1", "OLD"],
            &["node", "gene_name", "Gene", "g1", "NEW"],
        ]);
        let graph = graph_from_triples(&tuples).unwrap();
        assert_eq!(graph.nodes[0].properties["gene_name"], "NEW");
    }

    #[test]
    fn test_graph_from_triples_rejects_unknown_marker() {
        let tuples = to_tuples(&[&["vertex", "gene_name", "Gene", "g1", "BRCA1"]]);
        assert!(graph_from_triples(&tuples).is_err());
    }
}
