//! Knowledge-base access.
//!
//! The resolution pipeline only talks to the knowledge base through the
//! [`KnowledgeBase`] trait: point lookups of phrases, schema questions
//! (domain, range, specificity, hierarchy) and execution of the synthesized
//! SPARQL. [`OntologyGraph`] is the bundled implementation: a petgraph
//! taxonomy for hierarchy walks, dual-indexed with an oxigraph store that
//! answers the formal queries.

pub mod graph;
pub mod synonyms;

use std::collections::BTreeMap;

use crate::error::OntologyResult;
use crate::model::{ResourceKind, Triple};

pub use graph::OntologyGraph;
pub use synonyms::{StaticSynonyms, SynonymSource};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_SUBPROPERTY_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subPropertyOf";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";

/// Fallback resources offered in every dialog, with their kinds.
pub const GENERIC_RESOURCES: &[(&str, ResourceKind)] = &[
    (RDF_TYPE, ResourceKind::ObjectProperty),
    (RDFS_LABEL, ResourceKind::DatatypeProperty),
    (OWL_THING, ResourceKind::Class),
];

/// One result row: `(variable, value)` pairs.
pub type Row = Vec<(String, String)>;

/// Interface of the knowledge-graph store.
pub trait KnowledgeBase {
    /// Resources whose label matches `text`, at most one per kind.
    fn lookup(&self, text: &str) -> BTreeMap<ResourceKind, String>;

    fn kind_of(&self, uri: &str) -> Option<ResourceKind>;

    /// Human-readable labels, best first.
    fn labels(&self, uri: &str) -> Vec<String>;

    /// Depth of a class or property below its topmost ancestor.
    fn specificity_of(&self, uri: &str) -> f64;

    /// Classes of an individual, most specific first.
    fn classes_of(&self, instance: &str) -> Vec<String>;

    fn domain_of(&self, property: &str) -> Vec<String>;

    fn range_of(&self, property: &str) -> Vec<String>;

    /// Triples whose object is the literal `value`.
    fn literal_triples(&self, value: &str) -> Vec<Triple>;

    /// Direct superclasses or superproperties.
    fn parents(&self, uri: &str) -> Vec<String>;

    /// Topmost ancestors; a resource without parents is its own top.
    fn top_elements(&self, uri: &str) -> Vec<String>;

    /// Properties whose domain or range contains the class.
    fn properties_touching(&self, class: &str) -> Vec<String>;

    /// Classes one property hop away from the class.
    fn neighbor_classes(&self, class: &str) -> Vec<String>;

    /// Classes and properties without parents.
    fn top_level_resources(&self) -> Vec<String>;

    fn is_instance_of(&self, instance: &str, class: &str) -> bool;

    /// `(prefix, namespace)` pairs emitted in front of every query.
    fn namespaces(&self) -> Vec<(String, String)>;

    /// Texts currently shown to the user (chart labels, legends).
    fn displayed_texts(&self) -> Vec<String> {
        Vec::new()
    }

    fn execute(&self, sparql: &str) -> OntologyResult<Vec<Row>>;
}

/// Readable label derived from a URI fragment: `populationTotal` -> `population total`.
pub fn label_from_uri(uri: &str) -> String {
    let local = crate::model::element::local_name(uri);
    let mut out = String::with_capacity(local.len() + 4);
    let mut prev_lower = false;
    for ch in local.chars() {
        if ch == '_' || ch == '-' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.extend(ch.to_lowercase());
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_from_fragments() {
        assert_eq!(label_from_uri("http://example.org/geo#populationTotal"), "population total");
        assert_eq!(label_from_uri("http://example.org/geo#City"), "city");
        assert_eq!(label_from_uri("http://example.org/geo/located_in"), "located in");
        assert_eq!(label_from_uri(RDF_TYPE), "type");
    }
}
