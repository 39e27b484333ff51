//! Core data models for annoq.
//!
//! These types are shared across all annoq crates and represent the
//! backend-independent request, graph, and job entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// One typed node in a subgraph request.
///
/// A node with a concrete `id` is a point lookup; without one it is a
/// pattern variable bound by its type and optional property constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identifier unique within the request, referenced by predicates.
    pub node_id: String,
    /// Node type label, must be declared in the schema registry.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Concrete entity id for a point lookup.
    #[serde(default)]
    pub id: Option<String>,
    /// Property constraints, each must be declared for the node type.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl NodeSpec {
    /// True when this node is a pattern variable rather than a point lookup.
    pub fn is_variable(&self) -> bool {
        self.id.is_none()
    }
}

/// One typed relationship between two request nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSpec {
    /// Caller-supplied predicate id; synthesized as `p0`, `p1`, … when absent.
    #[serde(default)]
    pub predicate_id: Option<String>,
    /// Edge type label, must be declared in the schema registry.
    #[serde(rename = "type")]
    pub predicate_type: String,
    /// `node_id` of the source endpoint.
    pub source: String,
    /// `node_id` of the target endpoint.
    pub target: String,
}

/// A subgraph query: ordered node specs plus ordered predicate specs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRequest {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub predicates: Vec<PredicateSpec>,
}

/// Resolved node lookup produced by validation: `node_id` → spec.
pub type NodeMap = HashMap<String, NodeSpec>;

impl AnnotationRequest {
    /// Assign synthetic predicate ids (`p0`, `p1`, …) to predicates the
    /// caller left unnamed. Existing ids are kept.
    pub fn assign_predicate_ids(&mut self) {
        for (idx, pred) in self.predicates.iter_mut().enumerate() {
            if pred.predicate_id.is_none() {
                pred.predicate_id = Some(format!("p{idx}"));
            }
        }
    }

    /// Distinct node type labels in request order.
    pub fn node_types(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for node in &self.nodes {
            if !seen.contains(&node.node_type) {
                seen.push(node.node_type.clone());
            }
        }
        seen
    }

    /// Human-readable job title derived from the requested node types.
    pub fn derive_title(&self) -> String {
        let types = self.node_types();
        if types.is_empty() {
            "Annotation".to_string()
        } else {
            format!("Annotation of {}", types.join(", "))
        }
    }
}

// =============================================================================
// COMPILED QUERIES
// =============================================================================

/// The closed set of query backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Property-graph engine queried with Cypher.
    Cypher,
    /// In-memory symbolic store queried with s-expressions.
    Metta,
    /// Remote pattern-rewrite engine driven by transform rules.
    Mork,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cypher => "cypher",
            BackendKind::Metta => "metta",
            BackendKind::Mork => "mork",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cypher" => Ok(BackendKind::Cypher),
            "metta" => Ok(BackendKind::Metta),
            "mork" => Ok(BackendKind::Mork),
            other => Err(Error::Config(format!("unknown backend: {other}"))),
        }
    }
}

/// A compiled, backend-native query artifact plus its count variants.
///
/// Opaque outside the compiler/executor pair that produced it. The MORK
/// variant carries no separate count queries: the rewrite engine has no
/// native aggregation, so counts are computed from the materialized graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CompiledQuery {
    Cypher {
        query: String,
        total_count_query: String,
        label_count_query: String,
    },
    Metta {
        query: String,
        total_count_query: String,
        label_count_query: String,
    },
    Mork {
        pattern: Vec<String>,
        template: Vec<String>,
    },
}

impl CompiledQuery {
    /// The backend this query was compiled for.
    pub fn kind(&self) -> BackendKind {
        match self {
            CompiledQuery::Cypher { .. } => BackendKind::Cypher,
            CompiledQuery::Metta { .. } => BackendKind::Metta,
            CompiledQuery::Mork { .. } => BackendKind::Mork,
        }
    }
}

// =============================================================================
// CANONICAL GRAPH
// =============================================================================

/// A node in the canonical graph. Its `id` is `"<type> <value>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

/// An edge in the canonical graph. `source`/`target` reference node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub label: String,
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

/// Per-label entity count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

/// Aggregate counts for a canonical graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub node_count: u64,
    pub edge_count: u64,
    pub node_count_by_label: Vec<LabelCount>,
    pub edge_count_by_label: Vec<LabelCount>,
}

/// The canonical node/edge representation all backends converge to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub node_count: u64,
    pub edge_count: u64,
    pub node_count_by_label: Vec<LabelCount>,
    pub edge_count_by_label: Vec<LabelCount>,
}

impl CanonicalGraph {
    /// Build a graph from nodes and edges, computing all four count fields
    /// from the materialized entities.
    pub fn with_computed_counts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let counts = compute_counts(&nodes, &edges);
        Self::with_counts(nodes, edges, counts)
    }

    /// Build a graph from nodes, edges, and externally supplied counts.
    pub fn with_counts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>, counts: GraphCounts) -> Self {
        Self {
            nodes,
            edges,
            node_count: counts.node_count,
            edge_count: counts.edge_count,
            node_count_by_label: counts.node_count_by_label,
            edge_count_by_label: counts.edge_count_by_label,
        }
    }

    /// The aggregate counts carried by this graph.
    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            node_count: self.node_count,
            edge_count: self.edge_count,
            node_count_by_label: self.node_count_by_label.clone(),
            edge_count_by_label: self.edge_count_by_label.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Convert to the persisted artifact document format
    /// (`{nodes: [{data: …}], edges: [{data: …}]}`).
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.iter().cloned().map(|n| Data { data: n }).collect(),
            edges: self.edges.iter().cloned().map(|e| Data { data: e }).collect(),
        }
    }

    /// Rebuild a graph from a persisted artifact document, recomputing counts.
    pub fn from_document(doc: GraphDocument) -> Self {
        let nodes = doc.nodes.into_iter().map(|d| d.data).collect();
        let edges = doc.edges.into_iter().map(|d| d.data).collect();
        Self::with_computed_counts(nodes, edges)
    }
}

/// Compute the four aggregate count fields from materialized entities.
///
/// Used directly by backends without native aggregation and when rebuilding
/// a graph from a persisted artifact.
pub fn compute_counts(nodes: &[GraphNode], edges: &[GraphEdge]) -> GraphCounts {
    let mut node_by_label: BTreeMap<&str, u64> = BTreeMap::new();
    for node in nodes {
        *node_by_label.entry(node.node_type.as_str()).or_default() += 1;
    }
    let mut edge_by_label: BTreeMap<&str, u64> = BTreeMap::new();
    for edge in edges {
        *edge_by_label.entry(edge.label.as_str()).or_default() += 1;
    }

    GraphCounts {
        node_count: nodes.len() as u64,
        edge_count: edges.len() as u64,
        node_count_by_label: node_by_label
            .into_iter()
            .map(|(label, count)| LabelCount {
                label: label.to_string(),
                count,
            })
            .collect(),
        edge_count_by_label: edge_by_label
            .into_iter()
            .map(|(label, count)| LabelCount {
                label: label.to_string(),
                count,
            })
            .collect(),
    }
}

/// `{data: …}` wrapper used by the artifact document format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

/// Persisted artifact document: nodes and edges with `data` wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Data<GraphNode>>,
    pub edges: Vec<Data<GraphEdge>>,
}

/// Generate a short random identifier fragment for canonical edge ids and
/// fresh pattern variables in property queries.
pub fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Annotation job lifecycle state. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Complete,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of a tracked annotation execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationJob {
    pub id: Uuid,
    pub request: AnnotationRequest,
    pub compiled: CompiledQuery,
    pub title: String,
    pub node_types: Vec<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<GraphCounts>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnnotationJob {
    /// Create a new job record in `Running` state for a compiled request.
    pub fn new(request: AnnotationRequest, compiled: CompiledQuery) -> Self {
        let now = Utc::now();
        let title = request.derive_title();
        let node_types = request.node_types();
        Self {
            id: Uuid::new_v4(),
            request,
            compiled,
            title,
            node_types,
            status: JobStatus::Running,
            summary: None,
            counts: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cached `{status, graph}` pair for fast status lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedStatus {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<CanonicalGraph>,
}

/// Handle returned to the caller on asynchronous submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub title: String,
    pub status: JobStatus,
}

/// Status view returned by job lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub title: String,
    pub request: AnnotationRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<GraphCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<CanonicalGraph>,
}

/// Summary row for job history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub title: String,
    pub node_types: Vec<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AnnotationJob> for JobSummary {
    fn from(job: &AnnotationJob) -> Self {
        Self {
            job_id: job.id,
            title: job.title.clone(),
            node_types: job.node_types.clone(),
            status: job.status,
            node_count: job.counts.as_ref().map(|c| c.node_count),
            edge_count: job.counts.as_ref().map(|c| c.edge_count),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene_disease_request() -> AnnotationRequest {
        AnnotationRequest {
            nodes: vec![
                NodeSpec {
                    node_id: "n1".to_string(),
                    node_type: "Gene".to_string(),
                    id: None,
                    properties: BTreeMap::new(),
                },
                NodeSpec {
                    node_id: "n2".to_string(),
                    node_type: "Disease".to_string(),
                    id: None,
                    properties: BTreeMap::new(),
                },
            ],
            predicates: vec![PredicateSpec {
                predicate_id: None,
                predicate_type: "ASSOCIATED_WITH".to_string(),
                source: "n1".to_string(),
                target: "n2".to_string(),
            }],
        }
    }

    #[test]
    fn test_request_deserializes_wire_format() {
        let raw = r#"{
            "nodes": [
                {"node_id": "n1", "type": "Gene", "id": null, "properties": {}},
                {"node_id": "n2", "type": "Disease", "id": null, "properties": {}}
            ],
            "predicates": [
                {"type": "ASSOCIATED_WITH", "source": "n1", "target": "n2"}
            ]
        }"#;
        let req: AnnotationRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req, gene_disease_request());
    }

    #[test]
    fn test_request_predicates_default_empty() {
        let raw = r#"{"nodes": [{"node_id": "n1", "type": "Gene"}]}"#;
        let req: AnnotationRequest = serde_json::from_str(raw).unwrap();
        assert!(req.predicates.is_empty());
        assert!(req.nodes[0].id.is_none());
        assert!(req.nodes[0].properties.is_empty());
    }

    #[test]
    fn test_assign_predicate_ids() {
        let mut req = gene_disease_request();
        req.predicates.push(PredicateSpec {
            predicate_id: Some("custom".to_string()),
            predicate_type: "ASSOCIATED_WITH".to_string(),
            source: "n2".to_string(),
            target: "n1".to_string(),
        });
        req.assign_predicate_ids();
        assert_eq!(req.predicates[0].predicate_id.as_deref(), Some("p0"));
        assert_eq!(req.predicates[1].predicate_id.as_deref(), Some("custom"));
    }

    #[test]
    fn test_node_types_dedup_preserves_order() {
        let mut req = gene_disease_request();
        req.nodes.push(NodeSpec {
            node_id: "n3".to_string(),
            node_type: "Gene".to_string(),
            id: None,
            properties: BTreeMap::new(),
        });
        assert_eq!(req.node_types(), vec!["Gene", "Disease"]);
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(
            gene_disease_request().derive_title(),
            "Annotation of Gene, Disease"
        );
    }

    #[test]
    fn test_backend_kind_round_trip() {
        for kind in [BackendKind::Cypher, BackendKind::Metta, BackendKind::Mork] {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert!("neo4j".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_compiled_query_kind() {
        let q = CompiledQuery::Mork {
            pattern: vec!["(Gene $n1)".to_string()],
            template: vec!["(tmp (Gene $n1))".to_string()],
        };
        assert_eq!(q.kind(), BackendKind::Mork);
    }

    #[test]
    fn test_compiled_query_serde_round_trip() {
        let q = CompiledQuery::Metta {
            query: "!(match &space (, (Gene $n1)) ((Gene $n1)))".to_string(),
            total_count_query: "!(total_count (collapse …))".to_string(),
            label_count_query: "!(label_count (collapse …))".to_string(),
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains(r#""backend":"metta"#));
        let back: CompiledQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn test_compute_counts() {
        let nodes = vec![
            GraphNode {
                id: "Gene g1".to_string(),
                node_type: "Gene".to_string(),
                properties: BTreeMap::new(),
            },
            GraphNode {
                id: "Gene g2".to_string(),
                node_type: "Gene".to_string(),
                properties: BTreeMap::new(),
            },
            GraphNode {
                id: "Disease d1".to_string(),
                node_type: "Disease".to_string(),
                properties: BTreeMap::new(),
            },
        ];
        let edges = vec![GraphEdge {
            id: "e1".to_string(),
            label: "ASSOCIATED_WITH".to_string(),
            source: "Gene g1".to_string(),
            target: "Disease d1".to_string(),
            properties: BTreeMap::new(),
        }];

        let counts = compute_counts(&nodes, &edges);
        assert_eq!(counts.node_count, 3);
        assert_eq!(counts.edge_count, 1);
        assert_eq!(
            counts.node_count_by_label,
            vec![
                LabelCount {
                    label: "Disease".to_string(),
                    count: 1
                },
                LabelCount {
                    label: "Gene".to_string(),
                    count: 2
                },
            ]
        );
        assert_eq!(counts.edge_count_by_label.len(), 1);
        assert_eq!(counts.edge_count_by_label[0].count, 1);
    }

    #[test]
    fn test_canonical_graph_counts_match_lengths() {
        let graph = CanonicalGraph::with_computed_counts(
            vec![GraphNode {
                id: "Gene g1".to_string(),
                node_type: "Gene".to_string(),
                properties: BTreeMap::new(),
            }],
            vec![],
        );
        assert_eq!(graph.node_count, graph.nodes.len() as u64);
        assert_eq!(graph.edge_count, graph.edges.len() as u64);
    }

    #[test]
    fn test_graph_document_round_trip() {
        let mut props = BTreeMap::new();
        props.insert("gene_name".to_string(), "TP53".to_string());
        let graph = CanonicalGraph::with_computed_counts(
            vec![GraphNode {
                id: "Gene ENSG00000141510".to_string(),
                node_type: "Gene".to_string(),
                properties: props,
            }],
            vec![GraphEdge {
                id: "ab12cd34".to_string(),
                label: "ASSOCIATED_WITH".to_string(),
                source: "Gene ENSG00000141510".to_string(),
                target: "Disease MONDO:0007254".to_string(),
                properties: BTreeMap::new(),
            }],
        );

        let doc = graph.to_document();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["nodes"][0]["data"]["type"], "Gene");
        assert_eq!(json["nodes"][0]["data"]["gene_name"], "TP53");
        assert_eq!(json["edges"][0]["data"]["label"], "ASSOCIATED_WITH");

        let back = CanonicalGraph::from_document(serde_json::from_value(json).unwrap());
        assert_eq!(back, graph);
    }

    #[test]
    fn test_job_status_serde_and_terminal() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            r#""RUNNING""#
        );
        assert_eq!(
            serde_json::from_str::<JobStatus>(r#""CANCELLED""#).unwrap(),
            JobStatus::Cancelled
        );
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_annotation_job_new() {
        let req = gene_disease_request();
        let job = AnnotationJob::new(
            req.clone(),
            CompiledQuery::Mork {
                pattern: vec![],
                template: vec![],
            },
        );
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.title, "Annotation of Gene, Disease");
        assert_eq!(job.node_types, vec!["Gene", "Disease"]);
        assert!(job.counts.is_none());
        assert_eq!(job.request, req);
    }

    #[test]
    fn test_job_summary_from_job() {
        let mut job = AnnotationJob::new(
            gene_disease_request(),
            CompiledQuery::Mork {
                pattern: vec![],
                template: vec![],
            },
        );
        job.counts = Some(GraphCounts {
            node_count: 7,
            edge_count: 3,
            ..Default::default()
        });
        let summary = JobSummary::from(&job);
        assert_eq!(summary.node_count, Some(7));
        assert_eq!(summary.edge_count, Some(3));
        assert_eq!(summary.status, JobStatus::Running);
    }

    #[test]
    fn test_short_id_length() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert_ne!(short_id(), short_id());
    }
}
