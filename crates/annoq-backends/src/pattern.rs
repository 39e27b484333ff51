//! Pattern-clause construction shared by the s-expression backends.

use annoq_core::models::{NodeSpec, PredicateSpec};

/// Render the clause term for a node: a literal for point lookups, a
/// pattern variable named after the request `node_id` otherwise.
pub(crate) fn node_term(node: &NodeSpec) -> String {
    match &node.id {
        Some(id) => format!("({} {})", node.node_type, id),
        None => format!("({} ${})", node.node_type, node.node_id),
    }
}

/// One match clause per property constraint, binding the property name
/// against the node's term.
pub(crate) fn property_clauses(node: &NodeSpec) -> Vec<String> {
    let term = node_term(node);
    node.properties
        .iter()
        .map(|(key, value)| format!("({key} {term} {value})"))
        .collect()
}

/// Edge labels may not contain spaces in clause position.
pub(crate) fn edge_label(predicate: &PredicateSpec) -> String {
    predicate.predicate_type.replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn gene(id: Option<&str>) -> NodeSpec {
        NodeSpec {
            node_id: "n1".to_string(),
            node_type: "Gene".to_string(),
            id: id.map(str::to_string),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_node_term() {
        assert_eq!(node_term(&gene(None)), "(Gene $n1)");
        assert_eq!(node_term(&gene(Some("ENSG123"))), "(Gene ENSG123)");
    }

    #[test]
    fn test_property_clauses_bind_the_node_term() {
        let mut node = gene(None);
        node.properties
            .insert("gene_name".to_string(), "BRCA1".to_string());
        node.properties.insert("chr".to_string(), "17".to_string());
        assert_eq!(
            property_clauses(&node),
            vec!["(chr (Gene $n1) 17)", "(gene_name (Gene $n1) BRCA1)"]
        );
    }

    #[test]
    fn test_edge_label_sanitizes_spaces() {
        let pred = PredicateSpec {
            predicate_id: None,
            predicate_type: "associated with".to_string(),
            source: "n1".to_string(),
            target: "n2".to_string(),
        };
        assert_eq!(edge_label(&pred), "associated_with");
    }
}
