//! Grounds question phrases in the knowledge base.
//!
//! Candidate spans are the content words and the phrases of the parse tree
//! (with leading function words stripped). Each span is looked up verbatim,
//! in singular form when its head is plural, and finally through its
//! synonyms. A miss is not an error: the span stays ungrounded and may still
//! surface later as a POC dialog.

use crate::dialog::similarity::jaro_winkler;
use crate::model::annotation::{compare_offsets, quick_norm};
use crate::model::{Annotation, Query, ResourceKind};
use crate::nlp::tags::{
    CLAUSE_LABELS, FUNCTION_TAGS, PLURAL_TAGS, TOKEN_IGNORE_CONSOLIDATION, has_label, singularize,
};
use crate::nlp::tree::{NodeId, ParseTree};
use crate::ontology::{KnowledgeBase, SynonymSource};

/// Largest tree distance at which a concept still governs a datatype property.
const GOVERNOR_MAX_DISTANCE: usize = 6;

pub struct Mapper<'a> {
    kb: &'a dyn KnowledgeBase,
    synonyms: &'a dyn SynonymSource,
}

impl<'a> Mapper<'a> {
    pub fn new(kb: &'a dyn KnowledgeBase, synonyms: &'a dyn SynonymSource) -> Self {
        Self { kb, synonyms }
    }

    /// Fill `query.annotations` with every grounded span, in document order.
    pub fn annotate(&self, query: &mut Query) {
        let filter_spans: Vec<(usize, usize)> = query.filters.iter().map(|f| f.span()).collect();
        let mut annotations: Vec<Annotation> = candidate_spans(&query.tree)
            .into_iter()
            .filter(|a| {
                !filter_spans
                    .iter()
                    .any(|(s, e)| a.start >= *s && a.end <= *e)
            })
            .filter_map(|a| self.resolve(a))
            .collect();
        attach_governors(&mut annotations, &query.tree);
        annotations.sort_by(compare_offsets);
        tracing::debug!(count = annotations.len(), "annotations grounded");
        query.annotations = annotations;
    }

    /// Look a span up, falling back to its singular form and then its synonyms.
    pub fn resolve(&self, mut annotation: Annotation) -> Option<Annotation> {
        let raw = quick_norm(&annotation.raw_text);
        let mut attempts: Vec<String> = Vec::new();
        if annotation.stem {
            attempts.push(singular_phrase(&raw));
        }
        attempts.push(raw.clone());

        let mut hit = attempts
            .iter()
            .find_map(|text| self.found(text).map(|kinds| (text.clone(), kinds)));
        if hit.is_none() {
            hit = attempts
                .iter()
                .flat_map(|text| self.synonyms.synonyms(text))
                .find_map(|syn| self.found(&syn).map(|kinds| (syn, kinds)));
        }
        let (text, kinds) = hit?;

        annotation.text = text;
        annotation.oc_types = kinds;
        self.attach_side_info(&mut annotation, &raw);
        Some(annotation)
    }

    fn found(&self, text: &str) -> Option<std::collections::BTreeMap<ResourceKind, String>> {
        let kinds = self.kb.lookup(text);
        (!kinds.is_empty()).then_some(kinds)
    }

    fn attach_side_info(&self, annotation: &mut Annotation, raw: &str) {
        let kinds = annotation.oc_types.clone();
        for (kind, uri) in &kinds {
            match kind {
                ResourceKind::Class => {
                    annotation.extra.class_specificity = self.kb.specificity_of(uri);
                }
                ResourceKind::Individual => {
                    let classes = self.kb.classes_of(uri);
                    annotation.extra.direct_class_uri = classes.first().cloned();
                    annotation.extra.class_uris = classes;
                }
                ResourceKind::ObjectProperty | ResourceKind::DatatypeProperty => {
                    annotation.extra.domain = self.kb.domain_of(uri);
                    annotation.extra.range = self.kb.range_of(uri);
                    annotation.extra.property_specificity = self.kb.specificity_of(uri);
                    annotation.extra.property_distance =
                        jaro_winkler(raw, &quick_norm(&annotation.text));
                }
                ResourceKind::Literal => {
                    annotation.extra.triples = self.kb.literal_triples(uri);
                }
            }
        }
    }
}

/// Content words and phrases worth looking up, one per span.
pub fn candidate_spans(tree: &ParseTree) -> Vec<Annotation> {
    let mut out: Vec<Annotation> = Vec::new();
    let mut push = |annotation: Annotation| {
        let ignored = TOKEN_IGNORE_CONSOLIDATION.contains(&quick_norm(&annotation.raw_text).as_str());
        if !ignored && !out.iter().any(|a| a.span() == annotation.span()) {
            out.push(annotation);
        }
    };

    for node in tree.preorder(tree.root()) {
        if tree.is_leaf(node) {
            continue;
        }
        if tree.is_preterminal(node) {
            if !has_label(tree.label(node), FUNCTION_TAGS) {
                if let Some(annotation) = span_annotation(tree, node, &[node]) {
                    push(annotation);
                }
            }
            continue;
        }
        let label = tree.label(node);
        if has_label(label, CLAUSE_LABELS) || has_label(label, &["VP"]) || node == tree.root() {
            continue;
        }
        let content: Vec<NodeId> = tree
            .children(node)
            .iter()
            .copied()
            .skip_while(|&c| has_label(tree.label(c), FUNCTION_TAGS))
            .collect();
        let single_word = content.len() == 1 && tree.is_preterminal(content[0]);
        if content.is_empty() || single_word {
            continue;
        }
        if let Some(annotation) = span_annotation(tree, node, &content) {
            push(annotation);
        }
    }
    out
}

fn span_annotation(tree: &ParseTree, node: NodeId, content: &[NodeId]) -> Option<Annotation> {
    let first = *content.first()?;
    let last = *content.last()?;
    let start = tree.span(first).0;
    let end = tree.span(last).1;
    let subtree = if content.len() == 1 && content[0] == node {
        tree.subtree(node).ok()?
    } else {
        let children: Vec<ParseTree> = content.iter().filter_map(|&c| tree.subtree(c).ok()).collect();
        ParseTree::from_children(tree.label(node), &children)
    };
    let mut annotation = Annotation::new(start, end, subtree);
    annotation.stem = tree
        .preterminals(last)
        .last()
        .is_some_and(|&p| has_label(tree.label(p), PLURAL_TAGS));
    Some(annotation)
}

/// Singular form of a phrase's last word.
fn singular_phrase(phrase: &str) -> String {
    match phrase.rsplit_once(' ') {
        Some((head, last)) => format!("{head} {}", singularize(last)),
        None => singularize(phrase),
    }
}

/// Bind each datatype property to the nearest class or individual span.
fn attach_governors(annotations: &mut [Annotation], tree: &ParseTree) {
    let concepts: Vec<(usize, usize)> = annotations
        .iter()
        .filter(|a| {
            a.oc_types.contains_key(&ResourceKind::Class)
                || a.oc_types.contains_key(&ResourceKind::Individual)
        })
        .map(Annotation::span)
        .collect();
    for annotation in annotations.iter_mut() {
        if !annotation.oc_types.contains_key(&ResourceKind::DatatypeProperty) {
            continue;
        }
        let span = annotation.span();
        annotation.extra.governor = concepts
            .iter()
            .filter(|c| c.1 < span.0 || c.0 > span.1)
            .map(|&c| (tree.span_distance(span, c), c))
            .filter(|(d, _)| *d <= GOVERNOR_MAX_DISTANCE)
            .min_by_key(|(d, c)| (*d, std::cmp::Reverse(c.0)))
            .map(|(_, c)| c);
    }
}
