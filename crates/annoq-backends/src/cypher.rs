//! Property-graph backend.
//!
//! Compiles requests into Cypher match-and-return queries and parses the
//! engine's row-shaped JSON output. Unlike the s-expression backends the
//! engine returns entity properties inline, so no second-pass property
//! query is needed; count variants use engine-native aggregation.
//!
//! Result rows use a prefixed-column convention: a node projection for
//! request node `n1` yields `n1_type` / `n1_id` / `n1_props`, an edge
//! projection for predicate `p0` yields `p0_label` plus
//! `p0_source_type` / `p0_source_id` / `p0_source_props` (and the target
//! equivalents) and `p0_props`.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use annoq_core::models::{
    short_id, AnnotationRequest, BackendKind, CanonicalGraph, CompiledQuery, GraphCounts,
    GraphEdge, GraphNode, LabelCount, NodeMap, NodeSpec,
};
use annoq_core::{CancelToken, Error, Result};

use crate::backend::{ExecuteOptions, GraphBackend};

/// Session onto a property-graph engine. Queries go in as Cypher text,
/// results come back as one JSON object per row.
#[async_trait]
pub trait CypherClient: Send + Sync {
    async fn run(&self, query: &str) -> Result<Vec<Value>>;
}

/// Compiler/executor/unifier for the property-graph engine.
pub struct CypherBackend<C> {
    client: C,
}

impl<C: CypherClient> CypherBackend<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: CypherClient> GraphBackend for CypherBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Cypher
    }

    fn compile(
        &self,
        request: &AnnotationRequest,
        node_map: &NodeMap,
        limit: Option<u64>,
    ) -> Result<CompiledQuery> {
        if request.predicates.is_empty() {
            return Ok(compile_node_only(request, limit));
        }

        let mut match_clauses = Vec::new();
        let mut returns = Vec::new();
        let mut count_terms = Vec::new();
        let mut edge_vars = Vec::new();
        let mut introduced: HashSet<&str> = HashSet::new();

        for (idx, predicate) in request.predicates.iter().enumerate() {
            let pid = predicate
                .predicate_id
                .clone()
                .unwrap_or_else(|| format!("p{idx}"));
            let pvar = var_name(&pid);
            let label = predicate.predicate_type.replace(' ', "_");

            let source = endpoint(&predicate.source, node_map, &mut introduced)?;
            let target = endpoint(&predicate.target, node_map, &mut introduced)?;
            match_clauses.push(format!("MATCH {source}-[{pvar}:{label}]->{target}"));

            let svar = var_name(&predicate.source);
            let tvar = var_name(&predicate.target);
            returns.push(format!(
                "type({pvar}) AS {pvar}_label, \
                 labels({svar})[0] AS {pvar}_source_type, {svar}.id AS {pvar}_source_id, \
                 properties({svar}) AS {pvar}_source_props, \
                 labels({tvar})[0] AS {pvar}_target_type, {tvar}.id AS {pvar}_target_id, \
                 properties({tvar}) AS {pvar}_target_props, \
                 properties({pvar}) AS {pvar}_props"
            ));
            edge_vars.push(pvar);
        }

        let node_vars: Vec<String> = request
            .nodes
            .iter()
            .filter(|n| introduced.contains(n.node_id.as_str()))
            .map(|n| var_name(&n.node_id))
            .collect();
        for var in &node_vars {
            count_terms.push(format!("count(DISTINCT {var})"));
        }

        let matches = match_clauses.join("\n");
        let mut query = format!("{matches}\nRETURN {}", returns.join(", "));
        if let Some(limit) = limit {
            query.push_str(&format!("\nLIMIT {limit}"));
        }

        let edge_count_terms: Vec<String> = edge_vars
            .iter()
            .map(|v| format!("count(DISTINCT {v})"))
            .collect();
        let total_count_query = format!(
            "{matches}\nRETURN {} AS total_nodes, {} AS total_edges",
            count_terms.join(" + "),
            edge_count_terms.join(" + ")
        );
        let label_count_query = label_count_query(&matches, &node_vars, &edge_vars);

        Ok(CompiledQuery::Cypher {
            query,
            total_count_query,
            label_count_query,
        })
    }

    async fn execute(
        &self,
        compiled: &CompiledQuery,
        options: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> Result<CanonicalGraph> {
        let CompiledQuery::Cypher {
            query,
            total_count_query,
            label_count_query,
        } = compiled
        else {
            return Err(Error::Internal(
                "compiled query is not a cypher artifact".to_string(),
            ));
        };

        cancel.checkpoint()?;
        let rows = self.client.run(query).await?;
        cancel.checkpoint()?;

        if rows.is_empty() {
            debug!(backend = "cypher", op = "execute", "no matches");
            return Ok(CanonicalGraph::default());
        }
        let graph = graph_from_json_rows(&rows, options.properties)?;

        cancel.checkpoint()?;
        let totals = self.client.run(total_count_query).await?;
        cancel.checkpoint()?;
        let labels = self.client.run(label_count_query).await?;
        cancel.checkpoint()?;

        let (node_count, edge_count) = parse_total_counts(&totals)?;
        let (node_count_by_label, edge_count_by_label) = parse_label_counts(&labels)?;
        let counts = GraphCounts {
            node_count,
            edge_count,
            node_count_by_label,
            edge_count_by_label,
        };

        debug!(
            backend = "cypher",
            op = "execute",
            node_count = counts.node_count,
            edge_count = counts.edge_count,
            "unified graph"
        );
        Ok(CanonicalGraph::with_counts(graph.nodes, graph.edges, counts))
    }
}

fn compile_node_only(request: &AnnotationRequest, limit: Option<u64>) -> CompiledQuery {
    let mut patterns = Vec::new();
    let mut returns = Vec::new();
    let mut count_terms = Vec::new();
    let mut label_unions = Vec::new();

    for node in &request.nodes {
        let var = var_name(&node.node_id);
        patterns.push(node_pattern(node));
        returns.push(format!(
            "labels({var})[0] AS {var}_type, {var}.id AS {var}_id, properties({var}) AS {var}_props"
        ));
        count_terms.push(format!("count(DISTINCT {var})"));
    }

    let matches = format!("MATCH {}", patterns.join(", "));
    let mut query = format!("{matches}\nRETURN {}", returns.join(", "));
    if let Some(limit) = limit {
        query.push_str(&format!("\nLIMIT {limit}"));
    }

    let total_count_query = format!(
        "{matches}\nRETURN {} AS total_nodes, 0 AS total_edges",
        count_terms.join(" + ")
    );

    for node in &request.nodes {
        let var = var_name(&node.node_id);
        label_unions.push(format!(
            "{matches}\nRETURN 'node' AS kind, labels({var})[0] AS label, \
             count(DISTINCT {var}) AS count"
        ));
    }
    let label_count_query = label_unions.join("\nUNION ALL\n");

    CompiledQuery::Cypher {
        query,
        total_count_query,
        label_count_query,
    }
}

/// Render a predicate endpoint, inlining the full node pattern on first
/// introduction and a bare variable reference afterwards.
fn endpoint<'a>(
    node_id: &str,
    node_map: &'a NodeMap,
    introduced: &mut HashSet<&'a str>,
) -> Result<String> {
    let node = node_map
        .get(node_id)
        .ok_or_else(|| Error::Internal(format!("unresolved predicate endpoint: {node_id}")))?;
    if introduced.insert(node.node_id.as_str()) {
        Ok(node_pattern(node))
    } else {
        Ok(format!("({})", var_name(&node.node_id)))
    }
}

/// `(var:Type {id: "…", prop: "…"})`
fn node_pattern(node: &NodeSpec) -> String {
    let var = var_name(&node.node_id);
    let mut constraints = Vec::new();
    if let Some(id) = &node.id {
        constraints.push(format!("id: {}", quote(id)));
    }
    for (key, value) in &node.properties {
        constraints.push(format!("{key}: {}", quote(value)));
    }

    if constraints.is_empty() {
        format!("({var}:{})", node.node_type)
    } else {
        format!("({var}:{} {{{}}})", node.node_type, constraints.join(", "))
    }
}

fn label_count_query(matches: &str, node_vars: &[String], edge_vars: &[String]) -> String {
    let mut unions = Vec::new();
    for var in node_vars {
        unions.push(format!(
            "{matches}\nRETURN 'node' AS kind, labels({var})[0] AS label, \
             count(DISTINCT {var}) AS count"
        ));
    }
    for var in edge_vars {
        unions.push(format!(
            "{matches}\nRETURN 'edge' AS kind, type({var}) AS label, \
             count(DISTINCT {var}) AS count"
        ));
    }
    unions.join("\nUNION ALL\n")
}

/// Request node ids become Cypher variables; anything outside `[A-Za-z0-9_]`
/// is replaced so a hostile node id cannot break out of clause position.
fn var_name(node_id: &str) -> String {
    let mut out: String = node_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, 'v');
    }
    out
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Pivot prefixed result rows into a graph. Nodes dedup by id, edges by
/// `(label, source, target)`.
fn graph_from_json_rows(rows: &[Value], include_properties: bool) -> Result<CanonicalGraph> {
    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: BTreeMap<(String, String, String), GraphEdge> = BTreeMap::new();

    for row in rows {
        let obj = row
            .as_object()
            .ok_or_else(|| Error::Serialization("result row is not an object".to_string()))?;

        let edge_prefixes: Vec<String> = obj
            .keys()
            .filter_map(|k| k.strip_suffix("_label"))
            .map(str::to_string)
            .collect();

        for prefix in &edge_prefixes {
            let label = string_field(obj, &format!("{prefix}_label"))?;
            let source = endpoint_id(obj, prefix, "source")?;
            let target = endpoint_id(obj, prefix, "target")?;

            upsert_node(
                &mut nodes,
                &source,
                obj.get(&format!("{prefix}_source_props")),
                include_properties,
            );
            upsert_node(
                &mut nodes,
                &target,
                obj.get(&format!("{prefix}_target_props")),
                include_properties,
            );

            let key = (label.clone(), source.clone(), target.clone());
            let edge = edges.entry(key).or_insert_with(|| GraphEdge {
                id: short_id(),
                label,
                source,
                target,
                properties: BTreeMap::new(),
            });
            if include_properties {
                merge_props(obj.get(&format!("{prefix}_props")), &mut edge.properties);
            }
        }

        for key in obj.keys() {
            let Some(prefix) = key.strip_suffix("_type") else {
                continue;
            };
            // edge endpoint columns are handled through their edge group
            if prefix.ends_with("_source") || prefix.ends_with("_target") {
                continue;
            }
            let Some(id_value) = obj.get(&format!("{prefix}_id")) else {
                continue;
            };
            let node_type = string_field(obj, key)?;
            let id = value_to_string(id_value).ok_or_else(|| {
                Error::Serialization(format!("missing id for result column {prefix}"))
            })?;
            upsert_node(
                &mut nodes,
                &format!("{node_type} {id}"),
                obj.get(&format!("{prefix}_props")),
                include_properties,
            );
        }
    }

    Ok(CanonicalGraph::with_computed_counts(
        nodes.into_values().collect(),
        edges.into_values().collect(),
    ))
}

fn endpoint_id(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
    end: &str,
) -> Result<String> {
    let node_type = string_field(obj, &format!("{prefix}_{end}_type"))?;
    let id = string_field(obj, &format!("{prefix}_{end}_id"))?;
    Ok(format!("{node_type} {id}"))
}

fn upsert_node(
    nodes: &mut BTreeMap<String, GraphNode>,
    entity: &str,
    props: Option<&Value>,
    include_properties: bool,
) {
    let node = nodes.entry(entity.to_string()).or_insert_with(|| GraphNode {
        id: entity.to_string(),
        node_type: entity.split(' ').next().unwrap_or_default().to_string(),
        properties: BTreeMap::new(),
    });
    if include_properties {
        merge_props(props, &mut node.properties);
    }
}

fn merge_props(value: Option<&Value>, into: &mut BTreeMap<String, String>) {
    let Some(Value::Object(map)) = value else {
        return;
    };
    for (key, value) in map {
        // the engine stores the entity id as a property too; it is already
        // part of the canonical node id
        if key == "id" {
            continue;
        }
        if let Some(rendered) = value_to_string(value) {
            into.insert(key.clone(), rendered);
        }
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String> {
    obj.get(key)
        .and_then(value_to_string)
        .ok_or_else(|| Error::Serialization(format!("missing result column: {key}")))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_total_counts(rows: &[Value]) -> Result<(u64, u64)> {
    let row = rows
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Serialization("empty total-count result".to_string()))?;
    let nodes = row.get("total_nodes").and_then(Value::as_u64).unwrap_or(0);
    let edges = row.get("total_edges").and_then(Value::as_u64).unwrap_or(0);
    Ok((nodes, edges))
}

fn parse_label_counts(rows: &[Value]) -> Result<(Vec<LabelCount>, Vec<LabelCount>)> {
    let mut node_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut edge_counts: BTreeMap<String, u64> = BTreeMap::new();

    for row in rows {
        let obj = row
            .as_object()
            .ok_or_else(|| Error::Serialization("label-count row is not an object".to_string()))?;
        let kind = string_field(obj, "kind")?;
        let label = string_field(obj, "label")?;
        let count = obj.get("count").and_then(Value::as_u64).unwrap_or(0);
        match kind.as_str() {
            "node" => *node_counts.entry(label).or_default() += count,
            "edge" => *edge_counts.entry(label).or_default() += count,
            other => {
                return Err(Error::Serialization(format!(
                    "unknown label-count kind: {other}"
                )))
            }
        }
    }

    let collect = |counts: BTreeMap<String, u64>| {
        counts
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect()
    };
    Ok((collect(node_counts), collect(edge_counts)))
}
