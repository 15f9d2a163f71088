//! Cardinal filter extraction from comparative phrases.
//!
//! Constituents labelled PP, ADJP, QP, VP or FRAG are scanned for a
//! comparator word, a numeric operand, an optional negation and an optional
//! "or" conjunction ("50 or more" reads as `>= 50`). Nested constituents that
//! describe the same comparison yield one filter.

use crate::model::filter::parse_number;
use crate::model::{Annotation, CardinalOp, QueryFilter};

use super::tags::{
    EQ_TOKENS, FILTER_COMPARATOR_TAGS, FILTER_CONJUNCTION_TAGS, FILTER_OPERAND_TAGS,
    FILTER_TOP_LABELS, GEQ_TOKENS, GT_TOKENS, LEQ_TOKENS, LT_TOKENS, NEGATION_TOKENS, SIM_TOKENS,
    has_label,
};
use super::tree::{NodeId, ParseTree};

/// Cardinal filters found in a question tree.
pub fn extract_filters(tree: &ParseTree, tolerance: f64) -> Vec<QueryFilter> {
    let mut filters: Vec<QueryFilter> = Vec::new();
    for node in tree.preorder(tree.root()) {
        if tree.is_leaf(node) || !has_label(tree.label(node), FILTER_TOP_LABELS) {
            continue;
        }
        let Some(filter) = filter_for(tree, node, tolerance) else {
            continue;
        };
        let duplicate = filters
            .iter()
            .any(|f| f.span() == filter.span() && f.kind == filter.kind);
        if !duplicate {
            tracing::debug!(operands = ?filter.operands, span = ?filter.span(), "cardinal filter");
            filters.push(filter);
        }
    }
    filters
}

fn filter_for(tree: &ParseTree, node: NodeId, tolerance: f64) -> Option<QueryFilter> {
    let words: Vec<(usize, String, &str)> = tree
        .preterminals(node)
        .into_iter()
        .map(|p| {
            let offset = tree.span(p).0;
            let word = tree.text_of(p).to_lowercase();
            (offset, word, tree.label(p))
        })
        .collect();

    let mut ops: Vec<(usize, CardinalOp)> = Vec::new();
    let mut operands: Vec<(usize, String)> = Vec::new();
    let mut negate = false;
    let mut disjunction = false;

    for (i, (offset, word, tag)) in words.iter().enumerate() {
        let previous = i.checked_sub(1).map(|j| words[j].1.as_str());
        if NEGATION_TOKENS.contains(&word.as_str()) {
            negate = true;
            continue;
        }
        if has_label(tag, FILTER_CONJUNCTION_TAGS) {
            disjunction |= word == "or";
            continue;
        }
        if has_label(tag, FILTER_OPERAND_TAGS) {
            if let Some(value) = parse_number(word) {
                operands.push((*offset, value.to_string()));
            }
            continue;
        }
        if !has_label(tag, FILTER_COMPARATOR_TAGS) {
            continue;
        }
        let op = if GT_TOKENS.contains(&word.as_str()) {
            Some(CardinalOp::Gt)
        } else if LT_TOKENS.contains(&word.as_str()) {
            Some(CardinalOp::Lt)
        } else if EQ_TOKENS.contains(&word.as_str()) {
            Some(CardinalOp::Eq)
        } else if SIM_TOKENS.contains(&word.as_str()) {
            Some(CardinalOp::Sim)
        } else if GEQ_TOKENS.contains(&word.as_str()) && previous == Some("at") {
            Some(CardinalOp::Geq)
        } else if LEQ_TOKENS.contains(&word.as_str()) && previous == Some("at") {
            Some(CardinalOp::Leq)
        } else {
            None
        };
        if let Some(op) = op {
            let start = if matches!(op, CardinalOp::Geq | CardinalOp::Leq) {
                offset - 1
            } else {
                *offset
            };
            ops.push((start, op));
        }
    }

    let (first_op_at, first_op) = *ops.first()?;
    if operands.is_empty() {
        return None;
    }
    let has = |wanted: CardinalOp| ops.iter().any(|(_, op)| *op == wanted);
    let op = if disjunction && has(CardinalOp::Eq) && has(CardinalOp::Gt) {
        CardinalOp::Geq
    } else if disjunction && has(CardinalOp::Eq) && has(CardinalOp::Lt) {
        CardinalOp::Leq
    } else {
        first_op
    };

    let offsets = ops
        .iter()
        .map(|(o, _)| *o)
        .chain(operands.iter().map(|(o, _)| *o));
    let start = offsets.clone().min().unwrap_or(first_op_at);
    let end = offsets.max().unwrap_or(first_op_at);

    let (node_start, node_end) = tree.span(node);
    let annotation = Annotation::new(node_start, node_end, tree.subtree(node).ok()?);
    let mut filter = QueryFilter::cardinal(
        annotation,
        (start, end),
        op,
        operands.into_iter().map(|(_, v)| v).collect(),
        tolerance,
    );
    filter.negate = negate;
    Some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(tree: &str) -> Vec<QueryFilter> {
        extract_filters(&ParseTree::parse(tree).unwrap(), 0.1)
    }

    #[test]
    fn more_than() {
        let found = filters(
            "(ROOT (NP (NP (NNS cities)) (PP (IN with) (NP (QP (JJR more) (IN than) (CD 50)) (NNS inhabitants)))))",
        );
        assert_eq!(found.len(), 1);
        let f = &found[0];
        assert_eq!(f.span(), (2, 4));
        assert_eq!(f.operands, vec!["50".to_string()]);
        assert!(matches!(f.kind, crate::model::FilterKind::Cardinal { op: CardinalOp::Gt, .. }));
        // governing constituent is the PP, wider than the comparison
        assert_eq!(f.annotation.span(), (1, 5));
        assert!(f.assert_filter(51.0));
    }

    #[test]
    fn or_equal_becomes_inclusive() {
        let found = filters("(ROOT (QP (CD 50) (CC or) (JJR more)))");
        let f = &found[0];
        assert!(matches!(f.kind, crate::model::FilterKind::Cardinal { op: CardinalOp::Gt, .. }));

        let found = filters("(ROOT (QP (JJ equal) (CC or) (JJR less) (IN than) (CD 7)))");
        assert!(matches!(found[0].kind, crate::model::FilterKind::Cardinal { op: CardinalOp::Leq, .. }));
    }

    #[test]
    fn at_least_and_negation() {
        let found = filters("(ROOT (ADJP (RB not) (QP (IN at) (JJS least) (CD 1,000))))");
        assert_eq!(found.len(), 1);
        let f = &found[0];
        assert!(matches!(f.kind, crate::model::FilterKind::Cardinal { op: CardinalOp::Geq, .. }));
        assert!(f.negate);
        assert!(f.assert_filter(999.0));
        assert!(!f.assert_filter(1_000.0));
    }

    #[test]
    fn superlatives_without_operands_are_ignored() {
        assert!(filters("(ROOT (NP (DT the) (ADJP (JJS largest)) (NN city)))").is_empty());
    }
}
