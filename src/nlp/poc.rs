//! Extraction of potential ontology concepts (POCs) and the question focus.
//!
//! A POC is the lowest noun-phrase-like constituent that holds a noun, or a
//! stray noun outside any such phrase. The focus is the first POC that names
//! what the question is about; its priority says whether the answer should
//! be that thing itself (`max`) or something scoped by it (`min`).

use crate::error::TreeResult;
use crate::model::annotation::quick_norm;
use crate::model::{FocusPriority, Poc, Query};

use super::tags::{
    FOCUS_LABELS, FUNCTION_TAGS, MAX_PRIORITY_OPENERS, NOUN_TAGS, QUANTITY_PHRASES, has_label,
};
use super::tree::{NodeId, ParseTree};

const PHRASE_LABELS: &[&str] = &["NP", "NX", "WHNP"];
const PRONOUN_TAGS: &[&str] = &["PRP", "PRP$", "EX"];

/// POCs of a question in document order.
pub fn extract_pocs(tree: &ParseTree) -> TreeResult<Vec<Poc>> {
    let mut pocs = Vec::new();
    let mut covered = vec![false; tree.leaf_count()];

    for node in tree.preorder(tree.root()) {
        if tree.is_leaf(node) || !has_label(tree.label(node), PHRASE_LABELS) {
            continue;
        }
        let nested_phrase = tree
            .preorder(node)
            .into_iter()
            .skip(1)
            .any(|n| !tree.is_leaf(n) && has_label(tree.label(n), PHRASE_LABELS));
        if nested_phrase || !holds_noun(tree, node) || holds_pronoun(tree, node) {
            continue;
        }
        let (start, end) = tree.span(node);
        covered[start..=end].iter_mut().for_each(|c| *c = true);
        pocs.push(build_poc(tree, node)?);
    }

    for node in tree.preterminals(tree.root()) {
        let (start, end) = tree.span(node);
        if !covered[start] && has_label(tree.label(node), NOUN_TAGS) {
            pocs.push(Poc::new(start, end, tree.subtree(node)?));
        }
    }

    pocs.sort_by_key(|p| (p.start, std::cmp::Reverse(p.end)));
    Ok(pocs)
}

fn holds_noun(tree: &ParseTree, node: NodeId) -> bool {
    tree.preterminals(node)
        .into_iter()
        .any(|n| has_label(tree.label(n), NOUN_TAGS))
}

fn holds_pronoun(tree: &ParseTree, node: NodeId) -> bool {
    tree.children(node)
        .iter()
        .any(|&c| has_label(tree.label(c), PRONOUN_TAGS))
}

fn build_poc(tree: &ParseTree, node: NodeId) -> TreeResult<Poc> {
    let (start, end) = tree.span(node);
    let mut poc = Poc::new(start, end, tree.subtree(node)?);

    let children = tree.children(node);
    let head = children
        .iter()
        .rev()
        .copied()
        .find(|&c| has_label(tree.label(c), NOUN_TAGS));
    if let Some(head) = head {
        poc.head = Some(tree.subtree(head)?);
    }
    for &child in children {
        if Some(child) == head || has_label(tree.label(child), FUNCTION_TAGS) {
            continue;
        }
        poc.modifiers.push(tree.subtree(child)?);
    }
    Ok(poc)
}

/// Attach POCs, focus and priority to a query.
pub fn annotate_focus(query: &mut Query) -> TreeResult<()> {
    query.pocs = extract_pocs(&query.tree)?;
    query.focus = query
        .pocs
        .iter()
        .find(|poc| {
            has_label(poc.tree.root_label(), FOCUS_LABELS)
                && !QUANTITY_PHRASES.contains(&quick_norm(&poc.raw_text).as_str())
        })
        .cloned();
    query.priority = query
        .focus
        .as_ref()
        .map(|focus| priority_of(&focus.raw_text))
        .unwrap_or_default();
    if let Some(focus) = &query.focus {
        tracing::debug!(focus = %focus.raw_text, priority = ?query.priority, "question focus");
    }
    Ok(())
}

/// `max` for focus phrases opening with how/where/when/since/who/list/show/tell.
pub fn priority_of(text: &str) -> FocusPriority {
    let lower = text.trim_start().to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    if MAX_PRIORITY_OPENERS.contains(&first) {
        FocusPriority::Max
    } else {
        FocusPriority::Min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_noun_phrases_become_pocs() {
        let tree = ParseTree::parse(
            "(ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN population)) (PP (IN of) (NP (NNP Vienna)))))))",
        )
        .unwrap();
        let pocs = extract_pocs(&tree).unwrap();
        let texts: Vec<&str> = pocs.iter().map(|p| p.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["the population", "Vienna"]);
        assert_eq!(pocs[0].span(), (2, 3));
        assert_eq!(pocs[0].head.as_ref().unwrap().to_string(), "(NN population)");
        assert!(pocs[0].modifiers.is_empty());
    }

    #[test]
    fn modifiers_exclude_determiners() {
        let tree = ParseTree::parse("(NP (DT the) (JJ largest) (NN city))").unwrap();
        let pocs = extract_pocs(&tree).unwrap();
        assert_eq!(pocs.len(), 1);
        assert_eq!(pocs[0].modifiers.len(), 1);
        assert_eq!(pocs[0].modifiers[0].to_string(), "(JJ largest)");
    }

    #[test]
    fn pronoun_phrases_are_skipped() {
        let tree = ParseTree::parse("(S (NP (PRP it)) (VP (VBZ has) (NP (NNS rivers))))").unwrap();
        let pocs = extract_pocs(&tree).unwrap();
        assert_eq!(pocs.len(), 1);
        assert_eq!(pocs[0].raw_text, "rivers");
    }

    #[test]
    fn focus_skips_quantity_phrases() {
        let tree = ParseTree::parse(
            "(ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN number)) (PP (IN of) (NP (NNS cities)))))))",
        )
        .unwrap();
        let mut query = Query::new(tree);
        annotate_focus(&mut query).unwrap();
        assert_eq!(query.focus.as_ref().unwrap().raw_text, "cities");
        assert_eq!(query.priority, FocusPriority::Min);
    }

    #[test]
    fn openers_set_priority() {
        assert_eq!(priority_of("How many rivers"), FocusPriority::Max);
        assert_eq!(priority_of("List cities"), FocusPriority::Max);
        assert_eq!(priority_of("Which city"), FocusPriority::Min);
    }

    #[test]
    fn wh_phrase_focus_has_max_priority() {
        let tree = ParseTree::parse(
            "(ROOT (SBARQ (WHNP (WHADJP (WRB How) (JJ many)) (NNS rivers)) (SQ (VBP flow) (PP (IN through) (NP (NNP Austria))))))",
        )
        .unwrap();
        let mut query = Query::new(tree);
        annotate_focus(&mut query).unwrap();
        assert_eq!(query.focus.as_ref().unwrap().span(), (0, 2));
        assert_eq!(query.priority, FocusPriority::Max);
    }
}
