//! Candidate universe and vote creation for dialogs.
//!
//! Candidates come from the schema around the neighbor concepts (properties
//! touching their classes, classes one property away), or from the generic
//! fallback resources when no neighbor offers any, from aggregation tasks whose verbalizations match the
//! phrase, and from the texts currently displayed to the user. Every
//! candidate is scored against the phrase with [`Scorer`].

use crate::config::EngineConfig;
use crate::model::annotation::quick_norm;
use crate::model::{Annotation, ElementKind, OntologyElement, PropertyInfo, ResourceKind, SemanticConcept, Vote};
use crate::nlp::tags::QUICK_MODIFIER_TAGS;
use crate::ontology::{GENERIC_RESOURCES, KnowledgeBase, SynonymSource};

use super::similarity::{Scorer, monge_elkan};

/// Score of the explicit "none of these" vote.
pub const NONE_SCORE: f64 = -1.0;

pub struct SuggestionGenerator<'a> {
    kb: &'a dyn KnowledgeBase,
    scorer: Scorer<'a>,
    config: &'a EngineConfig,
}

impl<'a> SuggestionGenerator<'a> {
    pub fn new(kb: &'a dyn KnowledgeBase, synonyms: &'a dyn SynonymSource, config: &'a EngineConfig) -> Self {
        Self {
            kb,
            scorer: Scorer::new(synonyms, &config.dialog),
            config,
        }
    }

    /// Ranked votes for the phrase of `annotation`, without the "none" vote.
    ///
    /// Candidates whose printable URI is in `skip` are left out.
    pub fn create_votes(
        &self,
        annotation: &Annotation,
        neighbors: &[SemanticConcept],
        skip: &[String],
    ) -> Vec<Vote> {
        let text = annotation.raw_text.as_str();
        let mut candidates: Vec<(String, ResourceKind)> = Vec::new();
        for neighbor in neighbors {
            for candidate in self.find_candidate_elements(neighbor) {
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates.retain(|(uri, _)| !skip.contains(uri));
        if candidates.is_empty() {
            candidates = self.generic_candidates();
        }

        let quick = annotation.tree.contains_label(annotation.tree.root(), QUICK_MODIFIER_TAGS);
        let mut votes: Vec<Vote> = Vec::new();
        for (uri, kind) in candidates {
            if skip.contains(&uri) {
                continue;
            }
            let score = self.scorer.best_score(text, &self.kb.labels(&uri));
            let element = self.element_for(annotation, &uri, kind);
            if quick && element.is_datatype_property() {
                for task in &self.config.tasks.quick_tasks {
                    let mut candidate = SemanticConcept::new(element.clone());
                    candidate.task = Some(task.clone());
                    votes.push(Vote::new(candidate, score));
                }
            }
            votes.push(Vote::new(SemanticConcept::new(element), score));
        }
        votes.extend(self.task_votes(annotation));
        votes.extend(self.literal_votes(annotation, skip));

        let mut votes = dedupe(votes);
        sort_votes(&mut votes);
        tracing::debug!(text, votes = votes.len(), "candidate votes created");
        votes
    }

    /// Properties and classes adjacent to the classes of a neighbor concept.
    pub fn find_candidate_elements(&self, neighbor: &SemanticConcept) -> Vec<(String, ResourceKind)> {
        let element = &neighbor.element;
        let class_uris: Vec<String> = match &element.kind {
            ElementKind::Instance { class_uris, .. } => class_uris.clone(),
            ElementKind::Entity { .. } => vec![element.uri.clone()],
            ElementKind::Literal { triples, .. } => triples
                .iter()
                .flat_map(|t| self.kb.classes_of(&t[0]))
                .collect(),
            ElementKind::ObjectProperty { property } | ElementKind::DatatypeProperty { property, .. } => {
                property.domain.iter().chain(&property.range).cloned().collect()
            }
            ElementKind::None => Vec::new(),
        };

        let mut out: Vec<(String, ResourceKind)> = Vec::new();
        let push = |uri: String, out: &mut Vec<(String, ResourceKind)>| {
            let Some(kind) = self.kb.kind_of(&uri) else {
                return;
            };
            if !out.iter().any(|(u, _)| *u == uri) {
                out.push((uri, kind));
            }
        };
        for class in &class_uris {
            let mut to_consider = vec![class.clone()];
            if self.config.dialog.force_parents {
                to_consider.extend(self.kb.parents(class));
            }
            for c in &to_consider {
                for property in self.kb.properties_touching(c) {
                    push(property, &mut out);
                }
                for neighbor_class in self.kb.neighbor_classes(c) {
                    push(neighbor_class, &mut out);
                }
            }
        }
        out
    }

    /// Generic resources and every top-level class or property.
    fn generic_candidates(&self) -> Vec<(String, ResourceKind)> {
        let mut out: Vec<(String, ResourceKind)> = GENERIC_RESOURCES
            .iter()
            .map(|(uri, kind)| (uri.to_string(), *kind))
            .collect();
        for uri in self.kb.top_level_resources() {
            if out.iter().any(|(u, _)| *u == uri) {
                continue;
            }
            if let Some(kind) = self.kb.kind_of(&uri) {
                out.push((uri, kind));
            }
        }
        out
    }

    /// A bare element for a candidate URI, with schema side-info filled in.
    fn element_for(&self, annotation: &Annotation, uri: &str, kind: ResourceKind) -> OntologyElement {
        let mut element = match kind {
            ResourceKind::Class => OntologyElement::entity(annotation, uri, self.kb.specificity_of(uri)),
            ResourceKind::Individual => {
                let classes = self.kb.classes_of(uri);
                let direct = classes.first().cloned();
                OntologyElement::instance(annotation, uri, classes, direct)
            }
            ResourceKind::ObjectProperty | ResourceKind::DatatypeProperty => {
                let property = PropertyInfo {
                    domain: self.kb.domain_of(uri),
                    range: self.kb.range_of(uri),
                    specificity: self.kb.specificity_of(uri),
                    ..Default::default()
                };
                if kind == ResourceKind::ObjectProperty {
                    OntologyElement::object_property(annotation, uri, property)
                } else {
                    OntologyElement::datatype_property(annotation, uri, property, None)
                }
            }
            ResourceKind::Literal => OntologyElement::literal(annotation, uri, self.kb.literal_triples(uri), false),
        };
        element.added = true;
        element
    }

    /// Aggregation tasks whose verbalizations resemble the phrase.
    pub fn task_votes(&self, annotation: &Annotation) -> Vec<Vote> {
        let text = quick_norm(&annotation.raw_text);
        let floor = self.config.dialog.task_similarity_floor;
        let mut votes = Vec::new();
        for (task, verbalizations) in &self.config.tasks.verbalizations {
            let best = verbalizations
                .iter()
                .map(|v| monge_elkan(&text, &quick_norm(v)))
                .fold(0.0, f64::max);
            if best >= floor {
                let mut candidate = SemanticConcept::none(annotation);
                candidate.task = Some(task.clone());
                votes.push(Vote::new(candidate, best));
            }
        }
        votes
    }

    /// Displayed texts resembling the phrase, offered as literal values.
    pub fn literal_votes(&self, annotation: &Annotation, skip: &[String]) -> Vec<Vote> {
        let text = quick_norm(&annotation.raw_text);
        let floor = self.config.dialog.literal_similarity_floor;
        self.kb
            .displayed_texts()
            .into_iter()
            .filter(|shown| !skip.contains(shown))
            .filter_map(|shown| {
                let similarity = monge_elkan(&text, &quick_norm(&shown));
                (similarity >= floor).then(|| {
                    let triples = self.kb.literal_triples(&shown);
                    let mut element = OntologyElement::literal(annotation, &shown, triples, false);
                    element.added = true;
                    Vote::new(SemanticConcept::new(element), similarity)
                })
            })
            .collect()
    }
}

/// Keep the best-scored vote per printable URI and task.
pub fn dedupe(votes: Vec<Vote>) -> Vec<Vote> {
    let mut out: Vec<Vote> = Vec::new();
    for vote in votes {
        let same = out.iter().position(|v| {
            v.candidate.element.print_uri() == vote.candidate.element.print_uri()
                && v.candidate.task == vote.candidate.task
        });
        match same {
            Some(idx) if out[idx].score < vote.score => out[idx] = vote,
            Some(_) => {}
            None => out.push(vote),
        }
    }
    out
}

/// Descending by score; the "none" vote always sorts last.
pub fn sort_votes(votes: &mut [Vote]) {
    votes.sort_by(|a, b| {
        a.is_none()
            .cmp(&b.is_none())
            .then(b.score.total_cmp(&a.score))
    });
}

/// Cut a ranked list to `max` entries, then append the "none" vote.
pub fn finalize_votes(mut votes: Vec<Vote>, annotation: &Annotation, max: usize) -> Vec<Vote> {
    votes.retain(|v| !v.is_none());
    votes = dedupe(votes);
    sort_votes(&mut votes);
    votes.truncate(max.saturating_sub(1).max(1));
    votes.push(Vote::new(SemanticConcept::none(annotation), NONE_SCORE));
    votes
}
