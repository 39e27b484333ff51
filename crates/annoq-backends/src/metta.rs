//! Symbolic-store backend.
//!
//! Compiles requests into s-expression match queries against an in-memory
//! symbolic space and parses the store's s-expression output. Count
//! variants wrap the same match pattern in a collapsing aggregate form the
//! store evaluates into two structured records.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use annoq_core::models::{
    short_id, AnnotationRequest, BackendKind, CanonicalGraph, CompiledQuery, GraphCounts,
    LabelCount, NodeMap,
};
use annoq_core::{CancelToken, Error, Result, SchemaRegistry};

use crate::backend::{ExecuteOptions, GraphBackend};
use crate::pattern;
use crate::sexpr::{self, SExpr};
use crate::unify::{self, MatchRow, PropRequest};

/// Session handle onto a symbolic store. Queries go in as s-expression
/// text, results come back as s-expression text.
#[async_trait]
pub trait MettaClient: Send + Sync {
    async fn run(&self, query: &str) -> Result<String>;
}

/// Compiler/executor/unifier for the symbolic store.
pub struct MettaBackend<C> {
    client: C,
    schema: Arc<SchemaRegistry>,
}

impl<C: MettaClient> MettaBackend<C> {
    pub fn new(client: C, schema: Arc<SchemaRegistry>) -> Self {
        Self { client, schema }
    }

    async fn fetch_properties(
        &self,
        rows: &[MatchRow],
        cancel: &CancelToken,
    ) -> Result<CanonicalGraph> {
        let requests = unify::property_requests(rows, &self.schema);
        if requests.is_empty() {
            return Ok(unify::graph_from_rows(rows));
        }

        let query = property_query(&requests);
        cancel.checkpoint()?;
        let raw = self.client.run(&query).await?;
        cancel.checkpoint()?;

        let triples = sexpr::tuples(&raw)?;
        if triples.is_empty() {
            // no property facts in the space; keep the identity-only graph
            debug!(backend = "metta", "property query returned nothing");
            return Ok(unify::graph_from_rows(rows));
        }
        unify::graph_from_triples(&triples)
    }
}

#[async_trait]
impl<C: MettaClient> GraphBackend for MettaBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Metta
    }

    fn compile(
        &self,
        request: &AnnotationRequest,
        node_map: &NodeMap,
        _limit: Option<u64>,
    ) -> Result<CompiledQuery> {
        if request.predicates.is_empty() {
            return Ok(compile_node_only(request));
        }

        let mut match_preds = Vec::new();
        let mut return_preds = Vec::new();
        let mut count_projection = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for predicate in &request.predicates {
            let label = pattern::edge_label(predicate);
            let mut clause = String::new();
            let source = resolve_endpoint(&predicate.source, node_map, &mut seen, &mut clause)?;
            let target = resolve_endpoint(&predicate.target, node_map, &mut seen, &mut clause)?;

            clause.push_str(&format!("({label} {source} {target})"));
            match_preds.push(clause);
            return_preds.push(format!("({label} {source} {target})"));
            count_projection.push(format!("((edge {label}) (node {source}) (node {target}))"));
        }

        let query = match_query(&match_preds, &return_preds);
        let (total_count_query, label_count_query) = count_queries(&match_preds, &count_projection);
        Ok(CompiledQuery::Metta {
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
        let CompiledQuery::Metta {
            query,
            total_count_query,
            label_count_query,
        } = compiled
        else {
            return Err(Error::Internal(
                "compiled query is not a metta artifact".to_string(),
            ));
        };

        cancel.checkpoint()?;
        let raw = self.client.run(query).await?;
        cancel.checkpoint()?;

        let rows = unify::rows_from_tuples(&sexpr::tuples(&raw)?)?;
        if rows.is_empty() {
            debug!(backend = "metta", op = "execute", "no matches");
            return Ok(CanonicalGraph::default());
        }

        let graph = if options.properties {
            self.fetch_properties(&rows, cancel).await?
        } else {
            unify::graph_from_rows(&rows)
        };

        cancel.checkpoint()?;
        let totals_raw = self.client.run(total_count_query).await?;
        cancel.checkpoint()?;
        let labels_raw = self.client.run(label_count_query).await?;
        cancel.checkpoint()?;

        let counts = parse_counts(&totals_raw, &labels_raw)?;
        debug!(
            backend = "metta",
            op = "execute",
            node_count = counts.node_count,
            edge_count = counts.edge_count,
            "unified graph"
        );
        Ok(CanonicalGraph::with_counts(graph.nodes, graph.edges, counts))
    }
}

fn compile_node_only(request: &AnnotationRequest) -> CompiledQuery {
    let mut match_preds = Vec::new();
    let mut return_preds = Vec::new();

    for node in &request.nodes {
        let term = pattern::node_term(node);
        if node.id.is_none() && !node.properties.is_empty() {
            match_preds.push(pattern::property_clauses(node).join(" "));
        } else {
            match_preds.push(term.clone());
        }
        return_preds.push(term);
    }

    let count_projection: Vec<String> =
        return_preds.iter().map(|term| format!("(node {term})")).collect();
    let query = match_query(&match_preds, &return_preds);
    let (total_count_query, label_count_query) = count_queries(&match_preds, &count_projection);
    CompiledQuery::Metta {
        query,
        total_count_query,
        label_count_query,
    }
}

/// Resolve a predicate endpoint to its clause term, inlining property
/// constraints the first time a variable node is introduced.
fn resolve_endpoint<'a>(
    node_id: &str,
    node_map: &'a NodeMap,
    seen: &mut HashSet<&'a str>,
    clause: &mut String,
) -> Result<String> {
    let node = node_map
        .get(node_id)
        .ok_or_else(|| Error::Internal(format!("unresolved predicate endpoint: {node_id}")))?;
    if node.id.is_none() && seen.insert(node.node_id.as_str()) {
        for constraint in pattern::property_clauses(node) {
            clause.push_str(&constraint);
            clause.push(' ');
        }
    }
    Ok(pattern::node_term(node))
}

fn match_query(match_preds: &[String], return_preds: &[String]) -> String {
    format!(
        "!(match &space (, {}) ({}))",
        match_preds.join(" "),
        return_preds.join(" ")
    )
}

fn count_queries(match_preds: &[String], projection: &[String]) -> (String, String) {
    let inner = format!(
        "(match &space (, {}) ({}))",
        match_preds.join(" "),
        projection.join(" ")
    );
    (
        format!("!(total_count (collapse {inner}))"),
        format!("!(label_count (collapse {inner}))"),
    )
}

/// Second-pass query asking for every requested property, one fresh
/// variable per fetch.
fn property_query(requests: &[PropRequest]) -> String {
    let mut match_clauses = String::new();
    let mut output_clauses = String::new();

    for request in requests {
        let var = short_id();
        match request {
            PropRequest::Node { property, entity } => {
                match_clauses.push_str(&format!(" ({property} ({entity}) ${var})"));
                output_clauses.push_str(&format!(" (node {property} ({entity}) ${var})"));
            }
            PropRequest::Edge {
                property,
                predicate,
                source,
                target,
            } => {
                match_clauses
                    .push_str(&format!(" ({property} ({predicate} ({source}) ({target})) ${var})"));
                output_clauses.push_str(&format!(
                    " (edge {property} ({predicate} ({source}) ({target})) ${var})"
                ));
            }
        }
    }

    format!("!(match &space (,{match_clauses}) (,{output_clauses}))")
}

fn parse_counts(totals_raw: &str, labels_raw: &str) -> Result<GraphCounts> {
    let (node_count, edge_count) = parse_total_counts(totals_raw)?;
    let (node_count_by_label, edge_count_by_label) = parse_label_counts(labels_raw)?;
    Ok(GraphCounts {
        node_count,
        edge_count,
        node_count_by_label,
        edge_count_by_label,
    })
}

/// Parse the `total_count` record, shaped `((total_nodes N) (total_edges M))`.
fn parse_total_counts(raw: &str) -> Result<(u64, u64)> {
    let mut pairs = Vec::new();
    for expr in sexpr::parse_many(raw)? {
        scan_pairs(&expr, &mut pairs);
    }

    let mut node_count = 0;
    let mut edge_count = 0;
    for (name, value) in pairs {
        let parsed = value
            .parse::<u64>()
            .map_err(|_| Error::Serialization(format!("bad count value for {name}: {value}")))?;
        match name.as_str() {
            "total_nodes" => node_count = parsed,
            "total_edges" => edge_count = parsed,
            _ => {}
        }
    }
    Ok((node_count, edge_count))
}

/// Parse the `label_count` record, shaped
/// `((node_label_count (Gene 2) …) (edge_label_count (ASSOCIATED_WITH 1) …))`.
fn parse_label_counts(raw: &str) -> Result<(Vec<LabelCount>, Vec<LabelCount>)> {
    let mut node_counts = Vec::new();
    let mut edge_counts = Vec::new();
    for expr in sexpr::parse_many(raw)? {
        scan_label_lists(&expr, &mut node_counts, &mut edge_counts)?;
    }
    Ok((node_counts, edge_counts))
}

fn scan_pairs(expr: &SExpr, out: &mut Vec<(String, String)>) {
    if let Some(items) = expr.as_list() {
        if let [SExpr::Atom(name), SExpr::Atom(value)] = items {
            out.push((name.clone(), value.clone()));
            return;
        }
        for item in items {
            scan_pairs(item, out);
        }
    }
}

fn scan_label_lists(
    expr: &SExpr,
    node_counts: &mut Vec<LabelCount>,
    edge_counts: &mut Vec<LabelCount>,
) -> Result<()> {
    let Some(items) = expr.as_list() else {
        return Ok(());
    };
    match items.first().and_then(SExpr::as_atom) {
        Some("node_label_count") => {
            for item in &items[1..] {
                node_counts.push(label_pair(item)?);
            }
        }
        Some("edge_label_count") => {
            for item in &items[1..] {
                edge_counts.push(label_pair(item)?);
            }
        }
        _ => {
            for item in items {
                scan_label_lists(item, node_counts, edge_counts)?;
            }
        }
    }
    Ok(())
}

fn label_pair(expr: &SExpr) -> Result<LabelCount> {
    if let Some([SExpr::Atom(label), SExpr::Atom(count)]) = expr.as_list() {
        let count = count
            .parse::<u64>()
            .map_err(|_| Error::Serialization(format!("bad label count for {label}: {count}")))?;
        return Ok(LabelCount {
            label: label.clone(),
            count,
        });
    }
    Err(Error::Serialization(
        "malformed label count entry".to_string(),
    ))
}
