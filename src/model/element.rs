//! Ontology elements: knowledge-graph resources bound to an annotation.
//!
//! One struct carries the fields every element shares; [`ElementKind`] holds
//! the kind-specific payload. Serialized elements are tagged by `type`, so a
//! stored element is restored into the right variant without a lookup table.

use serde::{Deserialize, Serialize};

use super::annotation::{Annotation, Triple};

/// Domain, range and match scores of a property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub range: Vec<String>,
    #[serde(default)]
    pub specificity: f64,
    #[serde(default)]
    pub distance_score: f64,
    #[serde(default)]
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    /// A class.
    Entity { specificity: f64 },
    /// One or more individuals sharing a class set.
    Instance {
        uris: Vec<String>,
        class_uris: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direct_class_uri: Option<String>,
    },
    ObjectProperty {
        property: PropertyInfo,
    },
    DatatypeProperty {
        property: PropertyInfo,
        /// Span of the concept this property describes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        governor: Option<(usize, usize)>,
    },
    /// A literal value, grounded by the triples it occurs in.
    Literal {
        triples: Vec<Triple>,
        #[serde(default)]
        user_label: bool,
    },
    /// Explicit "none of these" choice.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyElement {
    pub uri: String,
    pub annotation: Annotation,
    /// Introduced by the system rather than read from the question.
    #[serde(default)]
    pub added: bool,
    #[serde(default)]
    pub main_subject: bool,
    pub kind: ElementKind,
}

impl OntologyElement {
    fn with_kind(annotation: &Annotation, uri: &str, kind: ElementKind) -> Self {
        Self {
            uri: uri.to_string(),
            annotation: annotation.clone(),
            added: false,
            main_subject: false,
            kind,
        }
    }

    pub fn entity(annotation: &Annotation, uri: &str, specificity: f64) -> Self {
        Self::with_kind(annotation, uri, ElementKind::Entity { specificity })
    }

    pub fn instance(
        annotation: &Annotation,
        uri: &str,
        class_uris: Vec<String>,
        direct_class_uri: Option<String>,
    ) -> Self {
        Self::with_kind(
            annotation,
            uri,
            ElementKind::Instance {
                uris: vec![uri.to_string()],
                class_uris,
                direct_class_uri,
            },
        )
    }

    pub fn object_property(annotation: &Annotation, uri: &str, property: PropertyInfo) -> Self {
        Self::with_kind(annotation, uri, ElementKind::ObjectProperty { property })
    }

    pub fn datatype_property(
        annotation: &Annotation,
        uri: &str,
        property: PropertyInfo,
        governor: Option<(usize, usize)>,
    ) -> Self {
        Self::with_kind(
            annotation,
            uri,
            ElementKind::DatatypeProperty { property, governor },
        )
    }

    pub fn literal(annotation: &Annotation, uri: &str, triples: Vec<Triple>, user_label: bool) -> Self {
        Self::with_kind(annotation, uri, ElementKind::Literal { triples, user_label })
    }

    pub fn none(annotation: &Annotation) -> Self {
        Self::with_kind(annotation, "", ElementKind::None)
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, ElementKind::None)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.kind, ElementKind::Entity { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, ElementKind::Instance { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ElementKind::Literal { .. })
    }

    pub fn is_datatype_property(&self) -> bool {
        matches!(self.kind, ElementKind::DatatypeProperty { .. })
    }

    pub fn is_property(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::ObjectProperty { .. } | ElementKind::DatatypeProperty { .. }
        )
    }

    /// Classes, instances and literals fill subject/object roles.
    pub fn is_concept(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Entity { .. } | ElementKind::Instance { .. } | ElementKind::Literal { .. }
        )
    }

    pub fn property(&self) -> Option<&PropertyInfo> {
        match &self.kind {
            ElementKind::ObjectProperty { property }
            | ElementKind::DatatypeProperty { property, .. } => Some(property),
            _ => None,
        }
    }

    pub fn property_mut(&mut self) -> Option<&mut PropertyInfo> {
        match &mut self.kind {
            ElementKind::ObjectProperty { property }
            | ElementKind::DatatypeProperty { property, .. } => Some(property),
            _ => None,
        }
    }

    pub fn governor(&self) -> Option<(usize, usize)> {
        match &self.kind {
            ElementKind::DatatypeProperty { governor, .. } => *governor,
            _ => None,
        }
    }

    /// Every resource the element stands for.
    pub fn uris(&self) -> Vec<String> {
        match &self.kind {
            ElementKind::Instance { uris, .. } => uris.clone(),
            ElementKind::None => Vec::new(),
            _ => vec![self.uri.clone()],
        }
    }

    /// The identifier shown to users and used to de-duplicate candidates.
    ///
    /// Grouped instances print only their first URI.
    pub fn print_uri(&self) -> &str {
        &self.uri
    }

    pub fn class_uris(&self) -> &[String] {
        match &self.kind {
            ElementKind::Instance { class_uris, .. } => class_uris,
            _ => &[],
        }
    }

    pub fn triples(&self) -> &[Triple] {
        match &self.kind {
            ElementKind::Literal { triples, .. } => triples,
            _ => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ElementKind::Entity { .. } => "entity",
            ElementKind::Instance { .. } => "instance",
            ElementKind::ObjectProperty { .. } => "objectProperty",
            ElementKind::DatatypeProperty { .. } => "datatypeProperty",
            ElementKind::Literal { .. } => "literal",
            ElementKind::None => "none",
        }
    }

    /// Part of the URI before its `#` fragment (or last `/`).
    pub fn namespace(&self) -> Option<&str> {
        namespace_of(&self.uri)
    }
}

/// Namespace of a resource URI.
pub fn namespace_of(uri: &str) -> Option<&str> {
    if let Some(idx) = uri.find('#') {
        return Some(&uri[..idx]);
    }
    uri.rfind('/').map(|idx| &uri[..idx])
}

/// Fragment or last path segment of a URI.
pub fn local_name(uri: &str) -> &str {
    uri.rsplit(['#', '/']).next().unwrap_or(uri)
}
