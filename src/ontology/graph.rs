//! In-memory ontology backed by petgraph (taxonomy) and oxigraph (SPARQL).
//!
//! The ontology is loaded from a JSON document:
//!
//! ```json
//! {
//!   "prefixes": { "geo": "http://example.org/geo#" },
//!   "classes": [{ "uri": "http://example.org/geo#City", "labels": ["city"], "parents": ["http://example.org/geo#Place"] }],
//!   "object_properties": [{ "uri": "http://example.org/geo#locatedIn", "domain": ["..."], "range": ["..."] }],
//!   "datatype_properties": [{ "uri": "http://example.org/geo#population", "domain": ["..."] }],
//!   "individuals": [{ "uri": "http://example.org/geo#Vienna", "types": ["..."], "labels": ["Vienna"],
//!                     "values": [{ "property": "http://example.org/geo#population", "value": "1897491" }],
//!                     "links": [{ "property": "http://example.org/geo#locatedIn", "object": "http://example.org/geo#Austria" }] }]
//! }
//! ```
//!
//! Lookups, hierarchy walks and schema questions are answered from the
//! in-memory indexes; every fact is also mirrored into an oxigraph store so
//! synthesized SPARQL can be executed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use oxigraph::model::{GraphNameRef, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

use crate::error::{OntologyError, OntologyResult};
use crate::model::annotation::quick_norm;
use crate::model::{ResourceKind, Triple};

use super::{
    KnowledgeBase, Row, OWL_CLASS, OWL_DATATYPE_PROPERTY, OWL_NS, OWL_OBJECT_PROPERTY,
    RDFS_DOMAIN, RDFS_LABEL, RDFS_NS, RDFS_RANGE, RDFS_SUBCLASS_OF, RDFS_SUBPROPERTY_OF, RDF_NS,
    RDF_TYPE, XSD_NS, label_from_uri,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyDocument {
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub object_properties: Vec<PropertyDef>,
    #[serde(default)]
    pub datatype_properties: Vec<PropertyDef>,
    #[serde(default)]
    pub individuals: Vec<IndividualDef>,
    #[serde(default)]
    pub displayed_texts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDef {
    pub uri: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDef {
    pub uri: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub range: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndividualDef {
    pub uri: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub values: Vec<ValueDef>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueDef {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDef {
    pub property: String,
    pub object: String,
}

/// Dual-indexed ontology: petgraph taxonomy plus oxigraph triple store.
pub struct OntologyGraph {
    prefixes: Vec<(String, String)>,
    kinds: HashMap<String, ResourceKind>,
    labels: HashMap<String, Vec<String>>,
    /// Normalized label to resources, in declaration order.
    label_index: HashMap<String, Vec<String>>,
    /// Edges point from child to parent.
    hierarchy: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    domains: HashMap<String, Vec<String>>,
    ranges: HashMap<String, Vec<String>>,
    types: HashMap<String, Vec<String>>,
    literals: Vec<Triple>,
    literal_index: HashMap<String, Vec<usize>>,
    displayed: Vec<String>,
    store: Store,
}

impl OntologyGraph {
    /// Load a JSON ontology document from disk.
    pub fn load(path: &Path) -> OntologyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OntologyError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> OntologyResult<Self> {
        let document: OntologyDocument =
            serde_json::from_str(content).map_err(|e| OntologyError::Parse {
                message: e.to_string(),
            })?;
        Self::from_document(&document)
    }

    pub fn from_document(document: &OntologyDocument) -> OntologyResult<Self> {
        let store = Store::new().map_err(|e| OntologyError::Sparql {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        let mut graph = Self {
            prefixes: document
                .prefixes
                .iter()
                .map(|(p, ns)| (p.clone(), ns.clone()))
                .collect(),
            kinds: HashMap::new(),
            labels: HashMap::new(),
            label_index: HashMap::new(),
            hierarchy: DiGraph::new(),
            nodes: HashMap::new(),
            domains: HashMap::new(),
            ranges: HashMap::new(),
            types: HashMap::new(),
            literals: Vec::new(),
            literal_index: HashMap::new(),
            displayed: document.displayed_texts.clone(),
            store,
        };

        for class in &document.classes {
            graph.declare(&class.uri, ResourceKind::Class, &class.labels)?;
            graph.insert(&class.uri, RDF_TYPE, Term::from(iri(OWL_CLASS)?))?;
            for parent in &class.parents {
                graph.declare_parent(&class.uri, parent, ResourceKind::Class)?;
                graph.insert(&class.uri, RDFS_SUBCLASS_OF, Term::from(iri(parent)?))?;
            }
        }

        let properties = document
            .object_properties
            .iter()
            .map(|p| (p, ResourceKind::ObjectProperty, OWL_OBJECT_PROPERTY))
            .chain(
                document
                    .datatype_properties
                    .iter()
                    .map(|p| (p, ResourceKind::DatatypeProperty, OWL_DATATYPE_PROPERTY)),
            );
        for (property, kind, owl_type) in properties {
            graph.declare(&property.uri, kind, &property.labels)?;
            graph.insert(&property.uri, RDF_TYPE, Term::from(iri(owl_type)?))?;
            for parent in &property.parents {
                graph.declare_parent(&property.uri, parent, kind)?;
                graph.insert(&property.uri, RDFS_SUBPROPERTY_OF, Term::from(iri(parent)?))?;
            }
            for class in &property.domain {
                graph.insert(&property.uri, RDFS_DOMAIN, Term::from(iri(class)?))?;
            }
            for class in &property.range {
                graph.insert(&property.uri, RDFS_RANGE, Term::from(iri(class)?))?;
            }
            graph
                .domains
                .insert(property.uri.clone(), property.domain.clone());
            graph.ranges.insert(property.uri.clone(), property.range.clone());
        }

        for individual in &document.individuals {
            graph.declare(&individual.uri, ResourceKind::Individual, &individual.labels)?;
            graph
                .types
                .insert(individual.uri.clone(), individual.types.clone());
            for class in &individual.types {
                graph.insert(&individual.uri, RDF_TYPE, Term::from(iri(class)?))?;
            }
            for value in &individual.values {
                graph.insert(
                    &individual.uri,
                    &value.property,
                    Term::from(Literal::new_simple_literal(value.value.clone())),
                )?;
                let index = graph.literals.len();
                graph.literals.push([
                    individual.uri.clone(),
                    value.property.clone(),
                    value.value.clone(),
                ]);
                graph
                    .literal_index
                    .entry(quick_norm(&value.value))
                    .or_default()
                    .push(index);
            }
            for link in &individual.links {
                graph.insert(&individual.uri, &link.property, Term::from(iri(&link.object)?))?;
            }
        }

        tracing::debug!(
            resources = graph.kinds.len(),
            literals = graph.literals.len(),
            "ontology loaded"
        );
        Ok(graph)
    }

    fn declare(&mut self, uri: &str, kind: ResourceKind, labels: &[String]) -> OntologyResult<()> {
        iri(uri)?;
        self.kinds.insert(uri.to_string(), kind);
        if kind != ResourceKind::Individual {
            self.node(uri);
        }
        let mut all_labels = labels.to_vec();
        let derived = label_from_uri(uri);
        if !all_labels.iter().any(|l| quick_norm(l) == derived) {
            all_labels.push(derived);
        }
        for label in &all_labels {
            let uris = self.label_index.entry(quick_norm(label)).or_default();
            if !uris.iter().any(|u| u == uri) {
                uris.push(uri.to_string());
            }
        }
        for label in labels {
            self.insert(uri, RDFS_LABEL, Term::from(Literal::new_simple_literal(label.clone())))?;
        }
        self.labels.insert(uri.to_string(), all_labels);
        Ok(())
    }

    fn declare_parent(&mut self, child: &str, parent: &str, kind: ResourceKind) -> OntologyResult<()> {
        if !self.kinds.contains_key(parent) {
            iri(parent)?;
            self.kinds.insert(parent.to_string(), kind);
            self.labels
                .insert(parent.to_string(), vec![label_from_uri(parent)]);
        }
        let c = self.node(child);
        let p = self.node(parent);
        if !self.hierarchy.contains_edge(c, p) {
            self.hierarchy.add_edge(c, p, ());
        }
        Ok(())
    }

    fn node(&mut self, uri: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(uri) {
            return idx;
        }
        let idx = self.hierarchy.add_node(uri.to_string());
        self.nodes.insert(uri.to_string(), idx);
        idx
    }

    fn insert(&self, subject: &str, predicate: &str, object: Term) -> OntologyResult<()> {
        let quad = Quad::new(iri(subject)?, iri(predicate)?, object, GraphNameRef::DefaultGraph);
        self.store.insert(&quad).map_err(|e| OntologyError::Sparql {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    fn depth(&self, idx: NodeIndex, seen: &mut HashSet<NodeIndex>) -> usize {
        if !seen.insert(idx) {
            return 0;
        }
        self.hierarchy
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|parent| 1 + self.depth(parent, seen))
            .max()
            .unwrap_or(0)
    }

    fn ancestors(&self, uri: &str) -> Vec<String> {
        let Some(&start) = self.nodes.get(uri) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut dfs = Dfs::new(&self.hierarchy, start);
        while let Some(idx) = dfs.next(&self.hierarchy) {
            if idx != start {
                out.push(self.hierarchy[idx].clone());
            }
        }
        out
    }

    /// Number of declared resources (classes, properties, individuals).
    pub fn resource_count(&self) -> usize {
        self.kinds.len()
    }

    fn sorted_by_specificity(&self, mut uris: Vec<String>) -> Vec<String> {
        uris.sort_by(|a, b| {
            self.specificity_of(b)
                .total_cmp(&self.specificity_of(a))
                .then_with(|| a.cmp(b))
        });
        uris
    }
}

fn iri(uri: &str) -> OntologyResult<NamedNode> {
    NamedNode::new(uri).map_err(|e| OntologyError::InvalidIri {
        iri: uri.to_string(),
        message: e.to_string(),
    })
}

fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        #[allow(unreachable_patterns)]
        _ => term.to_string(),
    }
}

impl KnowledgeBase for OntologyGraph {
    fn lookup(&self, text: &str) -> BTreeMap<ResourceKind, String> {
        let norm = quick_norm(text);
        let mut found = BTreeMap::new();
        if norm.is_empty() {
            return found;
        }
        if let Some(uris) = self.label_index.get(&norm) {
            for uri in uris {
                if let Some(&kind) = self.kinds.get(uri) {
                    found.entry(kind).or_insert_with(|| uri.clone());
                }
            }
        }
        if let Some(&first) = self.literal_index.get(&norm).and_then(|v| v.first()) {
            found
                .entry(ResourceKind::Literal)
                .or_insert_with(|| self.literals[first][2].clone());
        }
        found
    }

    fn kind_of(&self, uri: &str) -> Option<ResourceKind> {
        self.kinds.get(uri).copied()
    }

    fn labels(&self, uri: &str) -> Vec<String> {
        self.labels
            .get(uri)
            .cloned()
            .unwrap_or_else(|| vec![label_from_uri(uri)])
    }

    fn specificity_of(&self, uri: &str) -> f64 {
        self.nodes
            .get(uri)
            .map(|&idx| self.depth(idx, &mut HashSet::new()) as f64)
            .unwrap_or(0.0)
    }

    fn classes_of(&self, instance: &str) -> Vec<String> {
        let direct = self.types.get(instance).cloned().unwrap_or_default();
        let mut classes = self.sorted_by_specificity(direct);
        let mut inherited = Vec::new();
        for class in &classes {
            for ancestor in self.ancestors(class) {
                if !classes.contains(&ancestor) && !inherited.contains(&ancestor) {
                    inherited.push(ancestor);
                }
            }
        }
        classes.extend(inherited);
        classes
    }

    fn domain_of(&self, property: &str) -> Vec<String> {
        self.domains.get(property).cloned().unwrap_or_default()
    }

    fn range_of(&self, property: &str) -> Vec<String> {
        self.ranges.get(property).cloned().unwrap_or_default()
    }

    fn literal_triples(&self, value: &str) -> Vec<Triple> {
        self.literal_index
            .get(&quick_norm(value))
            .map(|indices| indices.iter().map(|&i| self.literals[i].clone()).collect())
            .unwrap_or_default()
    }

    fn parents(&self, uri: &str) -> Vec<String> {
        let Some(&idx) = self.nodes.get(uri) else {
            return Vec::new();
        };
        let mut parents: Vec<String> = self
            .hierarchy
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|p| self.hierarchy[p].clone())
            .collect();
        parents.sort();
        parents
    }

    fn top_elements(&self, uri: &str) -> Vec<String> {
        let Some(&start) = self.nodes.get(uri) else {
            return vec![uri.to_string()];
        };
        let mut tops = Vec::new();
        let mut dfs = Dfs::new(&self.hierarchy, start);
        while let Some(idx) = dfs.next(&self.hierarchy) {
            let is_top = self
                .hierarchy
                .neighbors_directed(idx, Direction::Outgoing)
                .next()
                .is_none();
            if is_top {
                tops.push(self.hierarchy[idx].clone());
            }
        }
        tops.sort();
        tops
    }

    fn properties_touching(&self, class: &str) -> Vec<String> {
        let mut properties: Vec<String> = self
            .domains
            .keys()
            .filter(|p| {
                self.domain_of(p).iter().any(|c| c == class)
                    || self.range_of(p).iter().any(|c| c == class)
            })
            .cloned()
            .collect();
        properties.sort();
        properties
    }

    fn neighbor_classes(&self, class: &str) -> Vec<String> {
        let mut neighbors = Vec::new();
        for property in self.properties_touching(class) {
            let domain = self.domain_of(&property);
            let range = self.range_of(&property);
            let other = if domain.iter().any(|c| c == class) {
                range
            } else {
                domain
            };
            for candidate in other {
                if self.kinds.get(&candidate) == Some(&ResourceKind::Class)
                    && !neighbors.contains(&candidate)
                {
                    neighbors.push(candidate);
                }
            }
        }
        neighbors
    }

    fn top_level_resources(&self) -> Vec<String> {
        let mut tops: Vec<String> = self
            .hierarchy
            .node_indices()
            .filter(|&idx| {
                self.hierarchy
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| self.hierarchy[idx].clone())
            .collect();
        tops.sort();
        tops
    }

    fn is_instance_of(&self, instance: &str, class: &str) -> bool {
        self.classes_of(instance).iter().any(|c| c == class)
    }

    fn namespaces(&self) -> Vec<(String, String)> {
        let mut namespaces = vec![
            ("rdf".to_string(), RDF_NS.to_string()),
            ("rdfs".to_string(), RDFS_NS.to_string()),
            ("owl".to_string(), OWL_NS.to_string()),
            ("xsd".to_string(), XSD_NS.to_string()),
        ];
        for (prefix, ns) in &self.prefixes {
            if !namespaces.iter().any(|(p, _)| p == prefix) {
                namespaces.push((prefix.clone(), ns.clone()));
            }
        }
        namespaces
    }

    fn displayed_texts(&self) -> Vec<String> {
        self.displayed.clone()
    }

    fn execute(&self, sparql: &str) -> OntologyResult<Vec<Row>> {
        let results = self.store.query(sparql).map_err(|e| OntologyError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| OntologyError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    let row = solution
                        .iter()
                        .map(|(var, term)| (var.as_str().to_string(), term_value(term)))
                        .collect();
                    rows.push(row);
                }
                Ok(rows)
            }
            QueryResults::Boolean(b) => Ok(vec![vec![("result".to_string(), b.to_string())]]),
            QueryResults::Graph(_) => Err(OntologyError::Sparql {
                message: "CONSTRUCT/DESCRIBE queries are not produced by the synthesizer".into(),
            }),
        }
    }
}

impl std::fmt::Debug for OntologyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyGraph")
            .field("resources", &self.kinds.len())
            .field("literals", &self.literals.len())
            .finish()
    }
}
