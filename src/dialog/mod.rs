//! Disambiguation and mapping dialogs.
//!
//! When an overlap group still holds several unverified interpretations the
//! user is asked to pick one. The group nearest to the question focus goes
//! first, and the concepts nearest to it serve as ranking context and as the
//! neighbor keys of the learning model. Once nothing is ambiguous, phrases
//! that matched nothing (POCs) are offered the same way so the user can map
//! them to a resource, a task, or nothing.

pub mod learning;
pub mod similarity;
pub mod suggestion;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::compare_groups;
use crate::config::EngineConfig;
use crate::model::{
    Annotation, ElementKind, OntologyElement, Poc, Query, SemanticConcept, SuggestionKey, SuggestionPair, Vote,
};
use crate::ontology::{KnowledgeBase, SynonymSource};

use learning::{LearningStore, apply_learned_scores, learning_keys, learning_votes};
use suggestion::{SuggestionGenerator, finalize_votes};

/// Whether an overlap group was already settled.
pub fn group_verified(group: &[SemanticConcept]) -> bool {
    group.iter().any(|sc| sc.verified)
}

fn is_ambiguous(group: &[SemanticConcept]) -> bool {
    group.len() > 1 && !group_verified(group)
}

/// True iff some overlap group has several members and none is verified.
pub fn disambiguation_required(query: &Query) -> bool {
    query.semantic_concepts.iter().any(|g| is_ambiguous(g))
}

/// Index of the ambiguous group to resolve next.
///
/// With a focus, the ambiguous group closest to it in the parse tree;
/// without one, the first ambiguous group in document order.
pub fn next_ambiguous_group(query: &Query) -> Option<usize> {
    let ambiguous = query
        .semantic_concepts
        .iter()
        .enumerate()
        .filter(|(_, g)| is_ambiguous(g));
    match &query.focus {
        None => ambiguous.map(|(i, _)| i).next(),
        Some(focus) => ambiguous
            .filter_map(|(i, g)| g.first().map(|sc| (i, query.distance(sc.span(), focus.span()))))
            .min_by_key(|&(i, d)| (d, i))
            .map(|(i, _)| i),
    }
}

/// Concepts of other groups at minimal tree distance from the group, excluding "none".
pub fn nearest_neighbors(query: &Query, group: usize) -> Vec<SemanticConcept> {
    let Some(first) = query.semantic_concepts.get(group).and_then(|g| g.first()) else {
        return Vec::new();
    };
    let others = query
        .semantic_concepts
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != group)
        .flat_map(|(_, g)| g.iter());
    nearest(query, first.span(), others)
}

/// Concepts at minimal tree distance from a POC, excluding "none".
pub fn nearest_to_poc(query: &Query, poc: &Poc) -> Vec<SemanticConcept> {
    nearest(query, poc.span(), query.semantic_concepts.iter().flatten())
}

fn nearest<'q>(
    query: &Query,
    span: (usize, usize),
    candidates: impl Iterator<Item = &'q SemanticConcept>,
) -> Vec<SemanticConcept> {
    let mut best = usize::MAX;
    let mut out: Vec<SemanticConcept> = Vec::new();
    for sc in candidates.filter(|sc| !sc.is_none()) {
        let distance = query.distance(span, sc.span());
        if distance < best {
            best = distance;
            out = vec![sc.clone()];
        } else if distance == best {
            out.push(sc.clone());
        }
    }
    out
}

/// Index of the POC to map next: the one closest to its nearest concept,
/// preferring the later POC on ties, or the first POC when no concept exists.
pub fn next_poc(query: &Query) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, poc) in query.pocs.iter().enumerate() {
        let Some(neighbor) = nearest_to_poc(query, poc).into_iter().next() else {
            continue;
        };
        let distance = query.distance(poc.span(), neighbor.span());
        let better = match best {
            None => true,
            Some((b, d)) => distance < d || (distance == d && poc.start > query.pocs[b].start),
        };
        if better {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
        .or_else(|| (!query.pocs.is_empty()).then_some(0))
}

/// One choice as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogVote {
    pub candidate: String,
    pub id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// The phrase under discussion and its ranked choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogOutput {
    pub text: String,
    pub votes: Vec<DialogVote>,
}

impl fmt::Display for DialogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "What do you mean by \"{}\"?", self.text)?;
        for vote in &self.votes {
            writeln!(f, "  [{}] {} ({:.3})", vote.id, vote.candidate, vote.score)?;
        }
        Ok(())
    }
}

/// Builds dialogs for a query and applies the user's choices.
pub struct DialogHandler<'a> {
    kb: &'a dyn KnowledgeBase,
    synonyms: &'a dyn SynonymSource,
    config: &'a EngineConfig,
    store: Option<&'a LearningStore>,
}

impl<'a> DialogHandler<'a> {
    pub fn new(kb: &'a dyn KnowledgeBase, synonyms: &'a dyn SynonymSource, config: &'a EngineConfig) -> Self {
        Self {
            kb,
            synonyms,
            config,
            store: None,
        }
    }

    /// Read and write learned rewards through `store`.
    pub fn with_store(mut self, store: &'a LearningStore) -> Self {
        self.store = Some(store);
        self
    }

    fn learning_store(&self) -> Option<&LearningStore> {
        self.store.filter(|_| self.config.learning.enabled)
    }

    /// The next dialog the query needs, if any.
    pub fn generate_dialog(&self, query: &Query) -> Option<SuggestionPair> {
        if disambiguation_required(query) {
            return self.disambiguation_dialog(query);
        }
        if self.config.dialog.resolve_pocs {
            return self.mapping_dialog(query);
        }
        None
    }

    /// Dialog over the ambiguous group nearest to the focus.
    pub fn disambiguation_dialog(&self, query: &Query) -> Option<SuggestionPair> {
        let index = next_ambiguous_group(query)?;
        let group = &query.semantic_concepts[index];
        let first = group.iter().find(|sc| !sc.is_none()).or(group.first())?;
        let annotation = first.annotation().clone();
        let key = SuggestionKey {
            text: annotation.raw_text.clone(),
            neighbors: nearest_neighbors(query, index),
        };

        let mut votes: Vec<Vote> = group
            .iter()
            .filter(|sc| !sc.is_none())
            .map(|sc| Vote::new(sc.clone(), sc.score.unwrap_or(1.0)))
            .collect();
        let skip: Vec<String> = group.iter().map(|sc| sc.element.print_uri().to_string()).collect();
        let generator = SuggestionGenerator::new(self.kb, self.synonyms, self.config);
        votes.extend(generator.create_votes(&annotation, &key.neighbors, &skip));

        let votes = self.rank(&key, votes, &annotation);
        tracing::info!(text = %key.text, votes = votes.len(), "disambiguation dialog");
        Some(SuggestionPair {
            key,
            votes,
            group: Some(index),
            subject: None,
        })
    }

    /// Dialog mapping the next ungrounded phrase to a resource.
    pub fn mapping_dialog(&self, query: &Query) -> Option<SuggestionPair> {
        let poc = &query.pocs[next_poc(query)?];
        let annotation = poc.to_annotation();
        let key = SuggestionKey {
            text: poc.raw_text.clone(),
            neighbors: nearest_to_poc(query, poc),
        };
        let generator = SuggestionGenerator::new(self.kb, self.synonyms, self.config);
        let votes = generator.create_votes(&annotation, &key.neighbors, &[]);

        let votes = self.rank(&key, votes, &annotation);
        tracing::info!(text = %key.text, votes = votes.len(), "mapping dialog");
        Some(SuggestionPair {
            key,
            votes,
            group: None,
            subject: Some(poc.clone()),
        })
    }

    /// Apply learned scores when the model knows this context, otherwise seed
    /// it with the computed ones; then cut to size with "none" last.
    fn rank(&self, key: &SuggestionKey, mut votes: Vec<Vote>, annotation: &Annotation) -> Vec<Vote> {
        let Some(store) = self.learning_store() else {
            return finalize_votes(votes, annotation, self.config.dialog.max_suggestions);
        };
        let keys = learning_keys(self.kb, key);
        let learned = store.votes_for(&keys);
        if learned.is_empty() {
            let votes = finalize_votes(votes, annotation, self.config.dialog.max_suggestions);
            let records = learning_votes(&votes);
            let entries: Vec<_> = keys.into_iter().map(|k| (k, records.clone())).collect();
            store.record(&entries);
            votes
        } else {
            let updated = apply_learned_scores(&mut votes, &learned);
            tracing::debug!(updated, "learned scores applied");
            finalize_votes(votes, annotation, self.config.dialog.max_suggestions)
        }
    }

    /// Presentable form of a dialog.
    pub fn format(&self, pair: &SuggestionPair) -> DialogOutput {
        DialogOutput {
            text: pair.key.text.clone(),
            votes: pair
                .votes
                .iter()
                .take(self.config.dialog.max_suggestions)
                .map(|vote| DialogVote {
                    candidate: self.candidate_label(&vote.candidate),
                    id: vote.id.clone(),
                    score: vote.score,
                    task: vote.candidate.task.clone(),
                })
                .collect(),
        }
    }

    fn first_label(&self, uri: &str) -> String {
        self.kb
            .labels(uri)
            .into_iter()
            .next()
            .unwrap_or_else(|| uri.to_string())
    }

    /// Label of a candidate: instances as "a, b (class)", tasks by name.
    pub fn candidate_label(&self, candidate: &SemanticConcept) -> String {
        let label = element_label(candidate, |uri| self.first_label(uri));
        match (&candidate.task, candidate.is_none()) {
            (Some(task), false) => format!("{label} ({task})"),
            _ => label,
        }
    }
}

fn element_label(candidate: &SemanticConcept, label_of: impl Fn(&str) -> String) -> String {
    let element: &OntologyElement = &candidate.element;
    match &element.kind {
        ElementKind::Instance {
            uris,
            class_uris,
            direct_class_uri,
        } => {
            let names: Vec<String> = uris.iter().map(|u| label_of(u)).collect();
            let classes: Vec<String> = match direct_class_uri {
                Some(direct) => vec![label_of(direct)],
                None => class_uris.iter().map(|c| label_of(c)).collect(),
            };
            if classes.is_empty() {
                names.join(", ")
            } else {
                format!("{} ({})", names.join(", "), classes.join(", "))
            }
        }
        ElementKind::Literal { .. } => element.uri.clone(),
        ElementKind::None => candidate
            .task
            .clone()
            .unwrap_or_else(|| "None of these".to_string()),
        _ => label_of(&element.uri),
    }
}

/// Apply a chosen vote to the query it was generated for.
pub fn apply_choice(query: &mut Query, pair: &SuggestionPair, chosen: &Vote) {
    let mut candidate = chosen.candidate.clone();
    candidate.verified = true;
    let task_only = candidate.is_none() && candidate.task.is_some();
    if task_only {
        query.task = candidate.task.clone();
    }

    if let Some(poc) = &pair.subject {
        query.pocs.retain(|p| p.span() != poc.span());
        if candidate.is_none() {
            tracing::debug!(poc = %poc.raw_text, "phrase dropped");
            return;
        }
        if candidate.element.is_datatype_property() && candidate.task.is_some() {
            let existing = query.semantic_concepts.iter_mut().find(|g| {
                g.first()
                    .is_some_and(|sc| sc.element.uri == candidate.element.uri)
            });
            if let Some(group) = existing {
                if let Some(first) = group.first_mut() {
                    first.task = candidate.task.clone();
                    first.verified = true;
                }
                return;
            }
        }
        query.semantic_concepts.push(vec![candidate]);
        query.semantic_concepts.sort_by(|a, b| compare_groups(a, b));
        return;
    }

    if let Some(group) = pair.group.and_then(|i| query.semantic_concepts.get_mut(i)) {
        *group = vec![candidate];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyInfo;
    use crate::nlp::tree::ParseTree;
    use crate::ontology::StaticSynonyms;
    use crate::ontology::graph::tests::geo;

    const GEO: &str = "http://example.org/geo#";
    const QUESTION: &str = "(ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN population)) (PP (IN of) (NP (NNP Vienna)))))))";

    fn annotation(tree: &ParseTree, start: usize, end: usize) -> Annotation {
        let node = tree.covering_node(start, end);
        Annotation::new(start, end, tree.subtree(node).unwrap())
    }

    /// "population" is read both as the property and as a class; Vienna is settled.
    fn ambiguous_query() -> Query {
        let tree = ParseTree::parse(QUESTION).unwrap();
        let mut q = Query::new(tree.clone());
        let population = annotation(&tree, 3, 3);
        let vienna = annotation(&tree, 5, 5);
        q.semantic_concepts = vec![
            vec![
                SemanticConcept::new(OntologyElement::datatype_property(
                    &population,
                    &format!("{GEO}population"),
                    PropertyInfo {
                        domain: vec![format!("{GEO}Place")],
                        ..Default::default()
                    },
                    Some((5, 5)),
                )),
                SemanticConcept::new(OntologyElement::entity(&population, &format!("{GEO}Place"), 0.0)),
            ],
            vec![SemanticConcept::new(OntologyElement::instance(
                &vienna,
                &format!("{GEO}Vienna"),
                vec![format!("{GEO}Capital"), format!("{GEO}City"), format!("{GEO}Place")],
                Some(format!("{GEO}Capital")),
            ))],
        ];
        q.focus = Some(Poc::new(2, 3, tree.subtree(tree.covering_node(2, 3)).unwrap()));
        q
    }

    #[test]
    fn ambiguity_requires_unverified_alternatives() {
        let mut q = ambiguous_query();
        assert!(disambiguation_required(&q));
        q.semantic_concepts[0][1].verified = true;
        assert!(!disambiguation_required(&q));
        q.semantic_concepts[0].truncate(1);
        q.semantic_concepts[0][0].verified = false;
        assert!(!disambiguation_required(&q));
    }

    #[test]
    fn next_group_and_its_neighbors() {
        let q = ambiguous_query();
        assert_eq!(next_ambiguous_group(&q), Some(0));
        let neighbors = nearest_neighbors(&q, 0);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].element.uri, format!("{GEO}Vienna"));

        let mut unfocused = q.clone();
        unfocused.focus = None;
        assert_eq!(next_ambiguous_group(&unfocused), Some(0));
        unfocused.semantic_concepts.swap(0, 1);
        assert_eq!(next_ambiguous_group(&unfocused), Some(1));
    }

    #[test]
    fn ambiguous_span_yields_ranked_votes_and_a_final_none() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let handler = DialogHandler::new(&kb, &syn, &config);
        let q = ambiguous_query();

        let pair = handler.generate_dialog(&q).unwrap();
        assert_eq!(pair.group, Some(0));
        assert_eq!(pair.key.text, "population");
        assert!(pair.votes.len() >= 3);
        let last = pair.votes.last().unwrap();
        assert!(last.is_none());
        assert_eq!(last.score, -1.0);
        let ranked = &pair.votes[..pair.votes.len() - 1];
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        for uri in ["population", "Place"] {
            assert!(ranked.iter().any(|v| v.candidate.element.uri == format!("{GEO}{uri}")));
        }
        assert!(pair.votes.len() <= config.dialog.max_suggestions);
    }

    #[test]
    fn two_classes_on_one_span_need_a_dialog() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let handler = DialogHandler::new(&kb, &syn, &config);

        let tree = ParseTree::parse("(ROOT (NP (NP (DT the) (NN town)) (PP (IN in) (NP (NNP Austria)))))").unwrap();
        let mut q = Query::new(tree.clone());
        let town = annotation(&tree, 1, 1);
        let austria = annotation(&tree, 3, 3);
        q.semantic_concepts = vec![
            vec![
                SemanticConcept::new(OntologyElement::entity(&town, &format!("{GEO}City"), 1.0)),
                SemanticConcept::new(OntologyElement::entity(&town, &format!("{GEO}Capital"), 2.0)),
            ],
            vec![SemanticConcept::new(OntologyElement::instance(
                &austria,
                &format!("{GEO}Austria"),
                vec![format!("{GEO}Country"), format!("{GEO}Place")],
                Some(format!("{GEO}Country")),
            ))],
        ];
        assert!(disambiguation_required(&q));

        let pair = handler.generate_dialog(&q).unwrap();
        assert_eq!(pair.group, Some(0));
        let ranked = &pair.votes[..pair.votes.len() - 1];
        for class in ["City", "Capital"] {
            assert!(ranked.iter().any(|v| v.candidate.element.uri == format!("{GEO}{class}")));
        }
        let last = pair.votes.last().unwrap();
        assert!(last.is_none());
        assert_eq!(last.score, -1.0);
    }

    #[test]
    fn learned_rewards_reorder_the_next_dialog() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let dir = tempfile::TempDir::new().unwrap();
        let store = LearningStore::new(dir.path().join("votes.json"));
        let handler = DialogHandler::new(&kb, &syn, &config).with_store(&store);
        let q = ambiguous_query();

        let mut pair = handler.generate_dialog(&q).unwrap();
        assert!(!store.entries().unwrap().is_empty());
        let place = pair
            .votes
            .iter()
            .find(|v| v.candidate.element.uri == format!("{GEO}Place"))
            .unwrap()
            .id
            .clone();
        for _ in 0..3 {
            learning::update_vote_scores(&mut pair, &place, &config.learning);
        }
        assert!(learning::update_learning_model(&store, &kb, &pair));

        let again = handler.generate_dialog(&q).unwrap();
        assert_eq!(again.votes[0].candidate.element.uri, format!("{GEO}Place"));
        assert!(again.votes[0].score > 3.0);
    }

    #[test]
    fn choosing_a_vote_settles_the_group() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let handler = DialogHandler::new(&kb, &syn, &config);
        let mut q = ambiguous_query();
        let pair = handler.generate_dialog(&q).unwrap();
        let chosen = pair
            .votes
            .iter()
            .find(|v| v.candidate.element.uri == format!("{GEO}population") && v.candidate.task.is_none())
            .unwrap()
            .clone();
        apply_choice(&mut q, &pair, &chosen);
        assert_eq!(q.semantic_concepts[0].len(), 1);
        assert!(q.semantic_concepts[0][0].verified);
        assert!(!disambiguation_required(&q));
        assert!(handler.disambiguation_dialog(&q).is_none());
    }

    #[test]
    fn ungrounded_phrases_get_mapping_dialogs() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let handler = DialogHandler::new(&kb, &syn, &config);

        let tree = ParseTree::parse(
            "(ROOT (NP (NP (DT the) (JJS largest) (NN city)) (PP (IN in) (NP (NNP Austria)))))",
        )
        .unwrap();
        let mut q = Query::new(tree.clone());
        let city = annotation(&tree, 2, 2);
        let austria = annotation(&tree, 4, 4);
        q.semantic_concepts = vec![
            vec![SemanticConcept::new(OntologyElement::entity(&city, &format!("{GEO}City"), 1.0))],
            vec![SemanticConcept::new(OntologyElement::instance(
                &austria,
                &format!("{GEO}Austria"),
                vec![format!("{GEO}Country"), format!("{GEO}Place")],
                Some(format!("{GEO}Country")),
            ))],
        ];
        q.pocs = vec![Poc::new(1, 1, ParseTree::parse("(JJS largest)").unwrap())];
        assert_eq!(next_poc(&q), Some(0));

        let pair = handler.generate_dialog(&q).unwrap();
        assert_eq!(pair.subject.as_ref().map(|p| p.span()), Some((1, 1)));
        let quick = pair
            .votes
            .iter()
            .find(|v| {
                v.candidate.element.uri == format!("{GEO}population")
                    && v.candidate.task.as_deref() == Some("max")
            })
            .unwrap()
            .clone();
        apply_choice(&mut q, &pair, &quick);
        assert!(q.pocs.is_empty());
        assert_eq!(q.semantic_concepts.len(), 3);
        assert_eq!(q.semantic_concepts[1][0].element.uri, format!("{GEO}population"));
        assert_eq!(q.semantic_concepts[1][0].task.as_deref(), Some("max"));
        assert!(handler.generate_dialog(&q).is_none());
    }

    #[test]
    fn none_drops_the_phrase_and_tasks_set_the_query_task() {
        let tree = ParseTree::parse("(ROOT (NP (JJ average) (NN population)))").unwrap();
        let mut q = Query::new(tree);
        let poc = Poc::new(0, 0, ParseTree::parse("(JJ average)").unwrap());
        q.pocs = vec![poc.clone()];
        let annotation = poc.to_annotation();
        let mut task = SemanticConcept::none(&annotation);
        task.task = Some("avg".into());
        let pair = SuggestionPair {
            key: SuggestionKey {
                text: "average".into(),
                neighbors: vec![],
            },
            votes: vec![Vote::new(task, 0.9), Vote::new(SemanticConcept::none(&annotation), -1.0)],
            group: None,
            subject: Some(poc),
        };
        let mut dropped = q.clone();
        apply_choice(&mut dropped, &pair, &pair.votes[1]);
        assert!(dropped.pocs.is_empty());
        assert!(dropped.task.is_none());
        assert!(dropped.semantic_concepts.is_empty());

        apply_choice(&mut q, &pair, &pair.votes[0]);
        assert_eq!(q.task.as_deref(), Some("avg"));
        assert!(q.semantic_concepts.is_empty());
    }

    #[test]
    fn candidate_labels() {
        let kb = geo();
        let syn = StaticSynonyms::new();
        let config = EngineConfig::default();
        let handler = DialogHandler::new(&kb, &syn, &config);
        let a = Annotation::new(0, 0, ParseTree::parse("(NNS cities)").unwrap());

        let mut cities = OntologyElement::instance(
            &a,
            &format!("{GEO}Graz"),
            vec![format!("{GEO}City"), format!("{GEO}Place")],
            Some(format!("{GEO}City")),
        );
        if let ElementKind::Instance { uris, .. } = &mut cities.kind {
            uris.push(format!("{GEO}Linz"));
        }
        assert_eq!(handler.candidate_label(&SemanticConcept::new(cities)), "Graz, Linz (city)");

        let mut population = SemanticConcept::new(OntologyElement::datatype_property(
            &a,
            &format!("{GEO}population"),
            PropertyInfo::default(),
            None,
        ));
        population.task = Some("max".into());
        assert_eq!(handler.candidate_label(&population), "population (max)");
        assert_eq!(handler.candidate_label(&SemanticConcept::none(&a)), "None of these");

        let output = handler.format(&SuggestionPair {
            key: SuggestionKey {
                text: "cities".into(),
                neighbors: vec![],
            },
            votes: vec![Vote::new(population, 0.5)],
            group: None,
            subject: None,
        });
        assert_eq!(output.votes[0].task.as_deref(), Some("max"));
        assert!(output.to_string().contains("population (max)"));
    }
}
