//! A question moving through the resolution pipeline.

use serde::{Deserialize, Serialize};

use crate::nlp::tree::ParseTree;

use super::annotation::Annotation;
use super::concept::SemanticConcept;
use super::filter::QueryFilter;
use super::poc::Poc;

/// Whether the focus phrase asks for the answer itself or only scopes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusPriority {
    Max,
    #[default]
    Min,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub tree: ParseTree,
    #[serde(default)]
    pub pocs: Vec<Poc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<Poc>,
    #[serde(default)]
    pub priority: FocusPriority,
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Overlap groups in document order.
    #[serde(default)]
    pub semantic_concepts: Vec<Vec<SemanticConcept>>,
    /// Aggregation chosen through a task vote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Personalization labels declared for the session.
    #[serde(default)]
    pub user_labels: Vec<String>,
}

impl Query {
    pub fn new(tree: ParseTree) -> Self {
        Self {
            text: tree.text(),
            tree,
            pocs: Vec::new(),
            focus: None,
            priority: FocusPriority::Min,
            filters: Vec::new(),
            annotations: Vec::new(),
            semantic_concepts: Vec::new(),
            task: None,
            user_labels: Vec::new(),
        }
    }

    /// Tree-path distance between two spans of this question.
    pub fn distance(&self, a: (usize, usize), b: (usize, usize)) -> usize {
        self.tree.span_distance(a, b)
    }

    /// Groups that still hold at least one interpretation.
    pub fn resolved_groups(&self) -> impl Iterator<Item = &Vec<SemanticConcept>> {
        self.semantic_concepts.iter().filter(|g| !g.is_empty())
    }
}
