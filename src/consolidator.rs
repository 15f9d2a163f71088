//! Consolidation of POCs and overlap groups.
//!
//! Runs after the element builder and before any dialog: POCs that mix
//! adjectives with other material are split, leading function words are
//! stripped, the group repeating a max-priority focus is dropped, and a
//! grounded group (or cardinal filter) lying inside a POC is subtracted from
//! it. Every step is idempotent.

use crate::builder::compare_groups;
use crate::model::annotation::quick_norm;
use crate::model::{Annotation, FocusPriority, Poc, Query, ResourceKind};
use crate::nlp::tags::{ADJECTIVE_TAGS, TOKEN_IGNORE_CONSOLIDATION, USELESS_TAGS, has_label};
use crate::nlp::tree::ParseTree;
use crate::ontology::KnowledgeBase;

pub struct Consolidator<'a> {
    kb: &'a dyn KnowledgeBase,
}

impl<'a> Consolidator<'a> {
    pub fn new(kb: &'a dyn KnowledgeBase) -> Self {
        Self { kb }
    }

    /// Drop class annotations sitting right next to one of their own
    /// instances ("the Danube river") and the matching part of any POC.
    pub fn pre_consolidate(&self, query: &mut Query) {
        let removed = self.instance_neighbor_classes(&query.annotations);
        if removed.is_empty() {
            return;
        }
        query.annotations.retain(|a| !removed.contains(&a.span()));
        let leaves: Vec<&str> = query.tree.leaves();
        let mut pocs = Vec::new();
        for poc in std::mem::take(&mut query.pocs) {
            let mut remaining = Some(poc);
            for span in &removed {
                remaining = remaining.and_then(|p| subtract_span(p, *span, &leaves));
            }
            pocs.extend(remaining);
        }
        query.pocs = pocs;
        tracing::debug!(removed = removed.len(), "classes next to their instances pruned");
    }

    fn instance_neighbor_classes(&self, annotations: &[Annotation]) -> Vec<(usize, usize)> {
        let mut removed = Vec::new();
        for class in annotations {
            let Some(class_uri) = class.oc_types.get(&ResourceKind::Class) else {
                continue;
            };
            let shadowed = annotations.iter().any(|inst| {
                let adjacent = inst.start == class.end + 1 || class.start == inst.end + 1;
                adjacent
                    && inst
                        .oc_types
                        .get(&ResourceKind::Individual)
                        .is_some_and(|i| self.kb.is_instance_of(i, class_uri))
            });
            if shadowed && !removed.contains(&class.span()) {
                removed.push(class.span());
            }
        }
        removed
    }

    /// Full consolidation pass over a query with built overlap groups.
    pub fn consolidate(&self, query: &mut Query) {
        clean_semantic_concepts(query);
        let leaves: Vec<&str> = query.tree.leaves();
        let pocs = separate_pocs_with_adjectives(std::mem::take(&mut query.pocs), &leaves);
        let pocs = remove_useless_tokens(pocs, &leaves);

        let mut covered: Vec<(usize, usize)> = query
            .resolved_groups()
            .filter_map(|g| g.first().map(|sc| sc.span()))
            .collect();
        covered.extend(query.filters.iter().map(|f| f.span()));
        query.pocs = consolidate_pocs_with_ocs(pocs, &covered, &leaves);
        tracing::debug!(
            pocs = query.pocs.len(),
            groups = query.semantic_concepts.len(),
            "query consolidated"
        );
    }
}

/// Token offsets of each leaf of a POC, matched in order inside its span.
fn leaf_offsets(poc: &Poc, leaves: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut cursor = poc.start;
    for word in poc.tree.leaves() {
        let found = (cursor..=poc.end).find(|&i| leaves.get(i) == Some(&word));
        let offset = found.unwrap_or(cursor.min(poc.end));
        offsets.push(offset);
        cursor = offset + 1;
    }
    offsets
}

/// A POC over part of another one's material.
fn derived_poc(original: &Poc, tree: ParseTree, offsets: &[usize]) -> Option<Poc> {
    let start = *offsets.iter().min()?;
    let end = *offsets.iter().max()?;
    let mut poc = Poc::new(start, end, tree);
    poc.head = original.head.clone();
    poc.modifiers = original.modifiers.clone();
    Some(poc)
}

/// Split POCs mixing adjectival and other word material into two POCs.
pub fn separate_pocs_with_adjectives(pocs: Vec<Poc>, leaves: &[&str]) -> Vec<Poc> {
    let mut out = Vec::new();
    for poc in pocs {
        let tree = &poc.tree;
        let preterminals = tree.preterminals(tree.root());
        let is_adjective = |&p: &usize| has_label(tree.label(p), ADJECTIVE_TAGS);
        let adjectives = preterminals.iter().filter(|p| is_adjective(*p)).count();
        if preterminals.len() <= 1 || adjectives == 0 || adjectives == preterminals.len() {
            out.push(poc);
            continue;
        }

        let offsets = leaf_offsets(&poc, leaves);
        let label = tree.root_label().to_string();
        let mut pieces = Vec::new();
        for want_adjective in [false, true] {
            let mut parts = Vec::new();
            let mut part_offsets = Vec::new();
            for (index, p) in preterminals.iter().enumerate() {
                if is_adjective(p) != want_adjective {
                    continue;
                }
                if let Ok(part) = tree.subtree(*p) {
                    parts.push(part);
                    part_offsets.push(offsets.get(index).copied().unwrap_or(poc.start));
                }
            }
            let piece = ParseTree::from_children(&label, &parts);
            pieces.extend(derived_poc(&poc, piece, &part_offsets));
        }
        out.extend(pieces);
    }
    out
}

/// Strip leading stop-word and pronoun children; emptied POCs are dropped.
pub fn remove_useless_tokens(pocs: Vec<Poc>, leaves: &[&str]) -> Vec<Poc> {
    let mut out = Vec::new();
    for poc in pocs {
        let tree = &poc.tree;
        if tree.is_preterminal(tree.root()) {
            if !has_label(tree.root_label(), USELESS_TAGS) {
                out.push(poc);
            }
            continue;
        }
        let children = tree.child_trees();
        let strip = children
            .iter()
            .take_while(|c| has_label(c.root_label(), USELESS_TAGS))
            .count();
        if strip == 0 {
            out.push(poc);
            continue;
        }
        if strip == children.len() {
            continue;
        }
        let dropped_leaves: usize = children[..strip].iter().map(ParseTree::leaf_count).sum();
        let offsets = leaf_offsets(&poc, leaves);
        let kept = ParseTree::from_children(tree.root_label(), &children[strip..]);
        out.extend(derived_poc(&poc, kept, offsets.get(dropped_leaves..).unwrap_or(&[])));
    }
    out
}

/// Drop the group spanning exactly a max-priority focus, then restore
/// document order. Nested groups are left for the dialogs to settle.
pub fn clean_semantic_concepts(query: &mut Query) {
    if query.priority == FocusPriority::Max
        && let Some(focus) = &query.focus
    {
        let focus_span = focus.span();
        query
            .semantic_concepts
            .retain(|g| g.first().is_none_or(|sc| sc.span() != focus_span));
    }
    query.semantic_concepts.sort_by(|a, b| compare_groups(a, b));
}

/// Remove the tokens of `span` from a POC. `None` when `span` covers the
/// whole POC; a span only partly overlapping the POC leaves it unchanged.
pub fn subtract_span(poc: Poc, span: (usize, usize), leaves: &[&str]) -> Option<Poc> {
    let (start, end) = span;
    if start <= poc.start && poc.end <= end {
        return None;
    }
    if start < poc.start || end > poc.end {
        return Some(poc);
    }
    let offsets = leaf_offsets(&poc, leaves);
    let inside: Vec<usize> = offsets
        .iter()
        .enumerate()
        .filter(|(_, o)| **o >= start && **o <= end)
        .map(|(i, _)| i)
        .collect();
    let (Some(&first), Some(&last)) = (inside.first(), inside.last()) else {
        return Some(poc);
    };
    let tree = poc.tree.without_leaves(first, last)?;
    let remaining: Vec<usize> = offsets
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < first || *i > last)
        .map(|(_, o)| *o)
        .collect();
    derived_poc(&poc, tree, &remaining)
}

/// Subtract covered spans from every POC; POCs left with nothing but
/// question words are dropped too.
pub fn consolidate_pocs_with_ocs(pocs: Vec<Poc>, covered: &[(usize, usize)], leaves: &[&str]) -> Vec<Poc> {
    let mut out: Vec<Poc> = Vec::new();
    for poc in pocs {
        let mut remaining = Some(poc);
        for span in covered {
            remaining = remaining.and_then(|p| subtract_span(p, *span, leaves));
        }
        let Some(poc) = remaining else {
            continue;
        };
        let ignorable = poc
            .tree
            .leaves()
            .iter()
            .all(|w| TOKEN_IGNORE_CONSOLIDATION.contains(&quick_norm(w).as_str()));
        if !ignorable && !out.iter().any(|p| p.span() == poc.span() && p.raw_text == poc.raw_text) {
            out.push(poc);
        }
    }
    out
}
