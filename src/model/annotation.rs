//! Text spans that are candidates for knowledge-graph grounding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::nlp::tree::ParseTree;

/// Kind of knowledge-graph resource a span can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Class,
    Individual,
    ObjectProperty,
    DatatypeProperty,
    Literal,
}

impl ResourceKind {
    pub fn is_property(self) -> bool {
        matches!(self, Self::ObjectProperty | Self::DatatypeProperty)
    }
}

/// A grounding triple `[subject, predicate, object]` for a literal.
pub type Triple = [String; 3];

/// Lookup side-information attached to an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideInfo {
    /// Depth of a class below its topmost ancestor.
    #[serde(default)]
    pub class_specificity: f64,
    /// Classes of a matched individual.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_uris: Vec<String>,
    /// Most specific class of a matched individual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_class_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub range: Vec<String>,
    #[serde(default)]
    pub property_specificity: f64,
    /// How far the matched property label is from the raw text (1.0 = identical).
    #[serde(default)]
    pub property_distance: f64,
    /// Span of the concept a datatype property is governed by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor: Option<(usize, usize)>,
    /// Triples a matched literal occurs in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triples: Vec<Triple>,
}

/// A token span of the question with its lookup results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// First token offset.
    pub start: usize,
    /// Last token offset (inclusive).
    pub end: usize,
    pub raw_text: String,
    pub tree: ParseTree,
    /// Span was looked up in singular form.
    #[serde(default)]
    pub stem: bool,
    /// Text that actually matched: the raw text, its singular, or a synonym.
    pub text: String,
    #[serde(default)]
    pub oc_types: BTreeMap<ResourceKind, String>,
    #[serde(default)]
    pub extra: SideInfo,
}

impl Annotation {
    pub fn new(start: usize, end: usize, tree: ParseTree) -> Self {
        let raw_text = tree.text();
        Self {
            start,
            end,
            text: raw_text.clone(),
            raw_text,
            tree,
            stem: false,
            oc_types: BTreeMap::new(),
            extra: SideInfo::default(),
        }
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Strict containment: `other` lies inside this span and shares neither boundary.
    pub fn overlaps(&self, other: &Annotation) -> bool {
        self.overlaps_with(other, true)
    }

    /// Containment of `other` in this span. Non-strict containment admits
    /// shared boundaries but never an identical span.
    pub fn overlaps_with(&self, other: &Annotation, strict: bool) -> bool {
        if strict {
            other.start > self.start && other.end < self.end
        } else {
            other.start >= self.start && other.end <= self.end && other.span() != self.span()
        }
    }

    /// Same span and same text, ignoring case.
    pub fn equals_non_strict(&self, other: &Annotation) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.raw_text.to_lowercase() == other.raw_text.to_lowercase()
    }

    /// Whether the span was found in the knowledge base.
    pub fn in_ontology(&self) -> bool {
        !self.oc_types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty()
    }
}

/// Document order: start ascending, longer span first on ties.
pub fn compare_offsets(a: &Annotation, b: &Annotation) -> std::cmp::Ordering {
    a.start.cmp(&b.start).then(b.end.cmp(&a.end))
}

/// NFKC-normalized, lower-cased, whitespace-collapsed form of a phrase.
pub fn quick_norm(text: &str) -> String {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}
