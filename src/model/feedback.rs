//! Disambiguation feedback: live dialog votes and persisted rewards.

use serde::{Deserialize, Serialize};

use super::annotation::Triple;
use super::concept::SemanticConcept;
use super::poc::Poc;

/// Placeholder element id for dialogs without neighbor context.
pub const NEIGHBORS_NONE: &str = "Neighbors_None";

/// Identity of a dialog context in the learning store.
///
/// `oe_id` is a generalized resource (topmost class or property), so rewards
/// learned for one phrase transfer to phrases near similar resources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub text: String,
    pub oe_id: String,
    #[serde(default)]
    pub triples: Vec<Triple>,
}

impl Key {
    pub fn new(text: impl Into<String>, oe_id: impl Into<String>, triples: Vec<Triple>) -> Self {
        Self {
            text: text.into(),
            oe_id: oe_id.into(),
            triples,
        }
    }

    pub fn without_neighbors(text: impl Into<String>) -> Self {
        Self::new(text, NEIGHBORS_NONE, Vec::new())
    }

    /// The JSON string used as the key in the learning store file.
    pub fn to_store_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{}|{}", self.text, self.oe_id))
    }

    pub fn from_store_key(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// One ranked candidate of a live dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub score: f64,
    pub candidate: SemanticConcept,
}

impl Vote {
    pub fn new(candidate: SemanticConcept, score: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            score,
            candidate,
        }
    }

    pub fn is_none(&self) -> bool {
        self.candidate.is_none() && self.candidate.task.is_none()
    }
}

/// A persisted reward record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningVote {
    pub id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub identifier: SemanticConcept,
}

impl From<&Vote> for LearningVote {
    fn from(vote: &Vote) -> Self {
        Self {
            id: vote.id.clone(),
            score: vote.score,
            task: vote.candidate.task.clone(),
            identifier: vote.candidate.clone(),
        }
    }
}

/// The phrase under discussion and the concepts it is ranked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionKey {
    pub text: String,
    #[serde(default)]
    pub neighbors: Vec<SemanticConcept>,
}

/// A live dialog: its context, the ranked votes, and what it resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionPair {
    pub key: SuggestionKey,
    pub votes: Vec<Vote>,
    /// Index of the overlap group a disambiguation dialog resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    /// Set when the dialog maps an ungrounded phrase instead of an overlap group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Poc>,
}

impl SuggestionPair {
    pub fn vote(&self, id: &str) -> Option<&Vote> {
        self.votes.iter().find(|v| v.id == id)
    }
}
