//! Ranked interpretations of a span and the wildcard placeholders that fill
//! missing query roles.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::element::OntologyElement;

/// One interpretation of a span.
///
/// Interpretations of the same span are kept together in an overlap group
/// (`Vec<SemanticConcept>`); the first member represents the group in
/// document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConcept {
    pub element: OntologyElement,
    /// Confirmed by the user or by consolidation.
    #[serde(default)]
    pub verified: bool,
    /// Learned score, when the reward model knew this candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Aggregation task attached to the interpretation (`max`, `avg`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Query variable assigned during synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SemanticConcept {
    pub fn new(element: OntologyElement) -> Self {
        Self {
            element,
            verified: false,
            score: None,
            task: None,
            id: None,
        }
    }

    pub fn none(annotation: &Annotation) -> Self {
        Self::new(OntologyElement::none(annotation))
    }

    pub fn annotation(&self) -> &Annotation {
        &self.element.annotation
    }

    pub fn span(&self) -> (usize, usize) {
        self.element.annotation.span()
    }

    pub fn is_none(&self) -> bool {
        self.element.is_none()
    }

    pub fn set_position(&mut self, index: usize) {
        self.id = Some(format!("oc{index}"));
    }

    /// Identity used to match a candidate against learned votes.
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}",
            self.element.kind_name(),
            self.element.print_uri(),
            self.task.as_deref().unwrap_or("")
        )
    }
}

/// Roles a [`Joker`] may stand in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Class,
    Instance,
    Literal,
    Property,
}

/// Wildcard placeholder for a missing query role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joker {
    pub accepts: Vec<Slot>,
    pub id: String,
}

impl Joker {
    pub fn new(accepts: &[Slot], id: impl Into<String>) -> Self {
        Self {
            accepts: accepts.to_vec(),
            id: id.into(),
        }
    }

    /// Stands in for a property between two concepts.
    pub fn is_property(&self) -> bool {
        self.accepts.contains(&Slot::Property)
    }
}

/// One position of a query prepared for synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "camelCase")]
pub enum QueryItem {
    Concepts { group: Vec<SemanticConcept> },
    Joker { joker: Joker },
}

impl QueryItem {
    pub fn first(&self) -> Option<&SemanticConcept> {
        match self {
            Self::Concepts { group } => group.first(),
            Self::Joker { .. } => None,
        }
    }

    pub fn joker(&self) -> Option<&Joker> {
        match self {
            Self::Joker { joker } => Some(joker),
            Self::Concepts { .. } => None,
        }
    }

    /// A real property, or a joker standing in for one.
    pub fn is_property(&self) -> bool {
        match self {
            Self::Concepts { group } => group.first().is_some_and(|sc| sc.element.is_property()),
            Self::Joker { joker } => joker.is_property(),
        }
    }

    pub fn is_real_property(&self) -> bool {
        self.first().is_some_and(|sc| sc.element.is_property())
    }

    pub fn is_real_concept(&self) -> bool {
        self.first().is_some_and(|sc| sc.element.is_concept())
    }

    /// Query variable name without the leading `?`.
    pub fn var(&self) -> String {
        match self {
            Self::Concepts { group } => group
                .first()
                .and_then(|sc| sc.id.clone())
                .unwrap_or_else(|| "oc".to_string()),
            Self::Joker { joker } => joker.id.clone(),
        }
    }
}
