//! Schema registry: node and edge type definitions for a data source.
//!
//! Loaded once per data-source selection from a description document with
//! `vertex_labels` and `edge_labels` sections. Read-only after load, so
//! concurrent reads need no locking.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};

/// A declared node type: label plus its declared property names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNodeType {
    pub label: String,
    pub properties: BTreeSet<String>,
}

/// A declared edge type: label, property names, and endpoint type labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEdgeType {
    pub label: String,
    pub properties: BTreeSet<String>,
    pub source_label: String,
    pub target_label: String,
}

/// Raw schema description wire format.
#[derive(Debug, Deserialize)]
struct SchemaDescription {
    vertex_labels: Option<Vec<VertexLabel>>,
    edge_labels: Option<Vec<EdgeLabel>>,
}

#[derive(Debug, Deserialize)]
struct VertexLabel {
    name: String,
    #[serde(default)]
    properties: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EdgeLabel {
    name: String,
    #[serde(default)]
    properties: Vec<String>,
    source_label: String,
    target_label: String,
}

/// Immutable registry of node and edge types for the active data source.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    nodes: HashMap<String, SchemaNodeType>,
    edges: HashMap<String, SchemaEdgeType>,
}

impl SchemaRegistry {
    /// Parse a registry from a JSON schema description.
    ///
    /// Fails with [`Error::SchemaLoad`] when either the `vertex_labels` or
    /// `edge_labels` section is missing.
    pub fn from_description(raw: &str) -> Result<Self> {
        let description: SchemaDescription =
            serde_json::from_str(raw).map_err(|e| Error::SchemaLoad(e.to_string()))?;

        let vertex_labels = description
            .vertex_labels
            .ok_or_else(|| Error::SchemaLoad("vertex_labels section is missing".to_string()))?;
        let edge_labels = description
            .edge_labels
            .ok_or_else(|| Error::SchemaLoad("edge_labels section is missing".to_string()))?;

        let mut nodes = HashMap::new();
        for vertex in vertex_labels {
            nodes.insert(
                vertex.name.clone(),
                SchemaNodeType {
                    label: vertex.name,
                    properties: vertex.properties.into_iter().collect(),
                },
            );
        }

        let mut edges = HashMap::new();
        for edge in edge_labels {
            edges.insert(
                edge.name.clone(),
                SchemaEdgeType {
                    label: edge.name,
                    properties: edge.properties.into_iter().collect(),
                    source_label: edge.source_label,
                    target_label: edge.target_label,
                },
            );
        }

        Ok(Self { nodes, edges })
    }

    /// Declared property names for a node type, if the type exists.
    pub fn type_properties(&self, node_type: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(node_type).map(|n| &n.properties)
    }

    /// Declared property names for an edge label, if the label exists.
    pub fn edge_properties(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(label).map(|e| &e.properties)
    }

    /// Declared `(source, target)` node-type labels for an edge label.
    pub fn edge_endpoints(&self, label: &str) -> Option<(&str, &str)> {
        self.edges
            .get(label)
            .map(|e| (e.source_label.as_str(), e.target_label.as_str()))
    }

    pub fn has_type(&self, node_type: &str) -> bool {
        self.nodes.contains_key(node_type)
    }

    pub fn has_edge(&self, label: &str) -> bool {
        self.edges.contains_key(label)
    }

    pub fn node_type_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_type_count(&self) -> usize {
        self.edges.len()
    }
}
