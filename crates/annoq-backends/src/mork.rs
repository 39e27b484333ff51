//! Remote pattern-rewrite backend (MORK).
//!
//! Compilation emits a `(pattern, template)` transform rule rather than a
//! direct query. Execution is a scoped transform-and-drain protocol against
//! a remote stateful workspace: apply the transform, download matches from
//! the temporary relation, clear the relation. The workspace is shared
//! mutable remote state, so the whole sequence runs under a lease and only
//! one sequence is in flight at a time.
//!
//! The engine has no native aggregation; counts are computed from the
//! materialized canonical graph.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use annoq_core::models::{
    short_id, AnnotationRequest, BackendKind, CanonicalGraph, CompiledQuery, NodeMap,
};
use annoq_core::{defaults, CancelToken, Error, Result, SchemaRegistry};

use crate::backend::{ExecuteOptions, GraphBackend};
use crate::pattern;
use crate::sexpr;
use crate::unify::{self, MatchRow, PropRequest};

/// Client onto a remote rewrite-engine workspace. One call covers the whole
/// transform-apply-download-clear sequence; implementations must hold
/// exclusive workspace access for its duration.
#[async_trait]
pub trait MorkClient: Send + Sync {
    async fn transform_and_drain(&self, pattern: &[String], template: &[String]) -> Result<String>;
}

/// HTTP client for a remote MORK server.
pub struct HttpMorkClient {
    http: reqwest::Client,
    base_url: String,
    workspace: String,
    lease: Mutex<()>,
}

impl HttpMorkClient {
    pub fn new(base_url: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            workspace: workspace.into(),
            lease: Mutex::new(()),
        }
    }

    /// Build from `MORK_URL` / `MORK_WORKSPACE`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MORK_URL").unwrap_or_else(|_| defaults::MORK_URL.to_string());
        let workspace = std::env::var("MORK_WORKSPACE")
            .unwrap_or_else(|_| defaults::MORK_WORKSPACE.to_string());
        Self::new(base_url, workspace)
    }
}

#[async_trait]
impl MorkClient for HttpMorkClient {
    async fn transform_and_drain(&self, pattern: &[String], template: &[String]) -> Result<String> {
        // Lease held across the whole sequence so concurrent jobs never
        // observe or clear each other's intermediate bindings.
        let _lease = self.lease.lock().await;

        let url = format!("{}/transform/{}", self.base_url, self.workspace);
        debug!(backend = "mork", op = "transform", url = %url);
        self.http
            .post(&url)
            .json(&serde_json::json!({ "pattern": pattern, "template": template }))
            .send()
            .await?
            .error_for_status()?;

        let url = format!("{}/export/{}", self.base_url, self.workspace);
        let raw = self
            .http
            .get(&url)
            .query(&[
                ("pattern", format!("({} $x)", defaults::MORK_TMP_RELATION)),
                ("template", "($x)".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let url = format!(
            "{}/clear/{}/{}",
            self.base_url, self.workspace, defaults::MORK_TMP_RELATION
        );
        self.http.post(&url).send().await?.error_for_status()?;

        Ok(raw)
    }
}

/// Compiler/executor/unifier for the rewrite engine.
pub struct MorkBackend<C> {
    client: C,
    schema: Arc<SchemaRegistry>,
}

impl<C: MorkClient> MorkBackend<C> {
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

        let (pattern, template) = property_rule(&requests);
        cancel.checkpoint()?;
        let raw = self.client.transform_and_drain(&pattern, &template).await?;
        cancel.checkpoint()?;

        let triples = sexpr::tuples(&raw)?;
        if triples.is_empty() {
            debug!(backend = "mork", "property transform matched nothing");
            return Ok(unify::graph_from_rows(rows));
        }
        unify::graph_from_triples(&triples)
    }
}

#[async_trait]
impl<C: MorkClient> GraphBackend for MorkBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Mork
    }

    fn compile(
        &self,
        request: &AnnotationRequest,
        node_map: &NodeMap,
        _limit: Option<u64>,
    ) -> Result<CompiledQuery> {
        let mut pattern = Vec::new();
        let mut template = Vec::new();

        if request.predicates.is_empty() {
            for node in &request.nodes {
                let term = pattern::node_term(node);
                if node.id.is_none() && !node.properties.is_empty() {
                    pattern.extend(pattern::property_clauses(node));
                } else {
                    pattern.push(term.clone());
                }
                template.push(format!("({} {term})", defaults::MORK_TMP_RELATION));
            }
            return Ok(CompiledQuery::Mork { pattern, template });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for predicate in &request.predicates {
            let label = pattern::edge_label(predicate);
            let source = resolve_endpoint(&predicate.source, node_map, &mut seen, &mut pattern)?;
            let target = resolve_endpoint(&predicate.target, node_map, &mut seen, &mut pattern)?;

            pattern.push(format!("({label} {source} {target})"));
            template.push(format!(
                "({} ({label} {source} {target}))",
                defaults::MORK_TMP_RELATION
            ));
        }

        Ok(CompiledQuery::Mork { pattern, template })
    }

    async fn execute(
        &self,
        compiled: &CompiledQuery,
        options: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> Result<CanonicalGraph> {
        let CompiledQuery::Mork { pattern, template } = compiled else {
            return Err(Error::Internal(
                "compiled query is not a mork artifact".to_string(),
            ));
        };

        cancel.checkpoint()?;
        let raw = self.client.transform_and_drain(pattern, template).await?;
        cancel.checkpoint()?;

        let rows = unify::rows_from_tuples(&sexpr::tuples(&raw)?)?;
        if rows.is_empty() {
            debug!(backend = "mork", op = "execute", "no matches");
            return Ok(CanonicalGraph::default());
        }

        let graph = if options.properties {
            self.fetch_properties(&rows, cancel).await?
        } else {
            unify::graph_from_rows(&rows)
        };

        debug!(
            backend = "mork",
            op = "execute",
            node_count = graph.node_count,
            edge_count = graph.edge_count,
            "unified graph"
        );
        Ok(graph)
    }
}

/// Resolve a predicate endpoint to its clause term, emitting property
/// constraints as pattern entries the first time a variable node appears.
fn resolve_endpoint<'a>(
    node_id: &str,
    node_map: &'a NodeMap,
    seen: &mut HashSet<&'a str>,
    pattern_out: &mut Vec<String>,
) -> Result<String> {
    let node = node_map
        .get(node_id)
        .ok_or_else(|| Error::Internal(format!("unresolved predicate endpoint: {node_id}")))?;
    if node.id.is_none() && seen.insert(node.node_id.as_str()) {
        pattern_out.extend(pattern::property_clauses(node));
    }
    Ok(pattern::node_term(node))
}

/// Second-pass transform rule fetching every requested property into the
/// temporary relation, tagged for the pivot.
fn property_rule(requests: &[PropRequest]) -> (Vec<String>, Vec<String>) {
    let mut pattern = Vec::new();
    let mut template = Vec::new();
    let tmp = defaults::MORK_TMP_RELATION;

    for request in requests {
        let var = short_id();
        match request {
            PropRequest::Node { property, entity } => {
                pattern.push(format!("({property} ({entity}) ${var})"));
                template.push(format!("({tmp} (node {property} ({entity}) ${var}))"));
            }
            PropRequest::Edge {
                property,
                predicate,
                source,
                target,
            } => {
                pattern.push(format!(
                    "({property} ({predicate} ({source}) ({target})) ${var})"
                ));
                template.push(format!(
                    "({tmp} (edge {property} ({predicate} ({source}) ({target})) ${var}))"
                ));
            }
        }
    }
    (pattern, template)
}
