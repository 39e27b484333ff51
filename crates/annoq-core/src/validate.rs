//! Request validation against the schema registry.
//!
//! Validation runs before any compilation. A failed request never reaches a
//! backend compiler and is surfaced as a client error, not a server fault.

use crate::error::{Error, Result};
use crate::models::{AnnotationRequest, NodeMap};
use crate::schema::SchemaRegistry;

/// Validate a request against the registry and produce the resolved node map.
///
/// Checks, in order:
/// - every node type exists and every node property is declared for it,
/// - node ids are unique within the request,
/// - every predicate type is a known edge label,
/// - predicate endpoints resolve to declared node ids whose types match the
///   edge's declared endpoint types.
pub fn validate_request(request: &AnnotationRequest, schema: &SchemaRegistry) -> Result<NodeMap> {
    if request.nodes.is_empty() {
        return Err(Error::Validation("request contains no nodes".to_string()));
    }

    let mut node_map = NodeMap::new();

    for node in &request.nodes {
        let Some(declared) = schema.type_properties(&node.node_type) else {
            return Err(Error::Validation(format!(
                "node '{}': unknown node type '{}'",
                node.node_id, node.node_type
            )));
        };

        for key in node.properties.keys() {
            if !declared.contains(key) {
                return Err(Error::Validation(format!(
                    "node '{}': property '{}' is not declared for type '{}'",
                    node.node_id, key, node.node_type
                )));
            }
        }

        if node_map.insert(node.node_id.clone(), node.clone()).is_some() {
            return Err(Error::Validation(format!(
                "duplicate node_id '{}'",
                node.node_id
            )));
        }
    }

    for predicate in &request.predicates {
        let Some((source_label, target_label)) = schema.edge_endpoints(&predicate.predicate_type)
        else {
            return Err(Error::Validation(format!(
                "unknown predicate type '{}'",
                predicate.predicate_type
            )));
        };

        let source = node_map.get(&predicate.source).ok_or_else(|| {
            Error::Validation(format!(
                "predicate '{}': source '{}' is not a declared node id",
                predicate.predicate_type, predicate.source
            ))
        })?;
        let target = node_map.get(&predicate.target).ok_or_else(|| {
            Error::Validation(format!(
                "predicate '{}': target '{}' is not a declared node id",
                predicate.predicate_type, predicate.target
            ))
        })?;

        if source.node_type != source_label {
            return Err(Error::Validation(format!(
                "predicate '{}': source type '{}' does not match declared source '{}'",
                predicate.predicate_type, source.node_type, source_label
            )));
        }
        if target.node_type != target_label {
            return Err(Error::Validation(format!(
                "predicate '{}': target type '{}' does not match declared target '{}'",
                predicate.predicate_type, target.node_type, target_label
            )));
        }
    }

    Ok(node_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeSpec, PredicateSpec};
    use std::collections::BTreeMap;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::from_description(crate::schema::tests::DESCRIPTION).unwrap()
    }

    fn node(node_id: &str, node_type: &str) -> NodeSpec {
        NodeSpec {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            id: None,
            properties: BTreeMap::new(),
        }
    }

    fn predicate(predicate_type: &str, source: &str, target: &str) -> PredicateSpec {
        PredicateSpec {
            predicate_id: None,
            predicate_type: predicate_type.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn test_valid_request_yields_exact_node_map() {
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Gene"), node("n2", "Disease")],
            predicates: vec![predicate("ASSOCIATED_WITH", "n1", "n2")],
        };
        let node_map = validate_request(&request, &schema()).unwrap();
        assert_eq!(node_map.len(), 2);
        assert!(node_map.contains_key("n1"));
        assert!(node_map.contains_key("n2"));
        assert_eq!(node_map["n1"].node_type, "Gene");
    }

    #[test]
    fn test_empty_request_rejected() {
        let request = AnnotationRequest {
            nodes: vec![],
            predicates: vec![],
        };
        assert!(matches!(
            validate_request(&request, &schema()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_node_type_rejected() {
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Protein")],
            predicates: vec![],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(err.to_string().contains("Protein"));
    }

    #[test]
    fn test_undeclared_property_rejected() {
        let mut n = node("n1", "Gene");
        n.properties
            .insert("molecular_weight".to_string(), "53".to_string());
        let request = AnnotationRequest {
            nodes: vec![n],
            predicates: vec![],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(err.to_string().contains("molecular_weight"));
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Gene"), node("n1", "Disease")],
            predicates: vec![],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_predicate_type_rejected() {
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Gene"), node("n2", "Disease")],
            predicates: vec![predicate("INTERACTS_WITH", "n1", "n2")],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(err.to_string().contains("INTERACTS_WITH"));
    }

    #[test]
    fn test_predicate_with_undeclared_endpoint_rejected() {
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Gene"), node("n2", "Disease")],
            predicates: vec![predicate("ASSOCIATED_WITH", "n1", "n9")],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(err.to_string().contains("n9"));
    }

    #[test]
    fn test_endpoint_type_mismatch_reported() {
        // ASSOCIATED_WITH declares Gene -> Disease; flipping the endpoints
        // must be reported, not coerced.
        let request = AnnotationRequest {
            nodes: vec![node("n1", "Gene"), node("n2", "Disease")],
            predicates: vec![predicate("ASSOCIATED_WITH", "n2", "n1")],
        };
        let err = validate_request(&request, &schema()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("does not match"));
    }
}
