//! Potential ontology concepts: phrases not yet grounded in the knowledge base.

use serde::{Deserialize, Serialize};

use crate::nlp::tree::ParseTree;

use super::annotation::Annotation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poc {
    pub start: usize,
    pub end: usize,
    pub raw_text: String,
    pub tree: ParseTree,
    /// Head noun sub-phrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<ParseTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ParseTree>,
}

impl Poc {
    pub fn new(start: usize, end: usize, tree: ParseTree) -> Self {
        Self {
            start,
            end,
            raw_text: tree.text(),
            tree,
            head: None,
            modifiers: Vec::new(),
        }
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// An ungrounded annotation over the same span, used when the POC enters a dialog.
    pub fn to_annotation(&self) -> Annotation {
        Annotation::new(self.start, self.end, self.tree.clone())
    }
}
