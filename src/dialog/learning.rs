//! Reward model for dialog choices.
//!
//! Every resolved dialog rewards the chosen vote and penalizes the rest. The
//! updated vote list is persisted per neighbor context under a [`Key`] whose
//! element id is generalized to the topmost class or property, so a reward
//! learned next to "Capital" also applies next to "City".
//!
//! The store is one JSON file mapping serialized keys to vote lists,
//! re-read, merged and rewritten on every update. Nothing locks the file:
//! two sessions resolving dialogs at once may lose one side's update.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::LearningConfig;
use crate::error::{LearningError, LearningResult};
use crate::model::{
    ElementKind, Key, LearningVote, OntologyElement, ResourceKind, SemanticConcept, SuggestionKey,
    SuggestionPair, Vote,
};
use crate::ontology::KnowledgeBase;

/// Serialized key to learned votes.
pub type LearningModel = BTreeMap<String, Vec<LearningVote>>;

/// Reward the chosen vote and penalize every other one.
///
/// Returns the chosen votes with their updated scores.
pub fn update_vote_scores(pair: &mut SuggestionPair, chosen_id: &str, config: &LearningConfig) -> Vec<Vote> {
    let mut chosen = Vec::new();
    for vote in &mut pair.votes {
        if vote.id == chosen_id {
            vote.score += config.chosen_reward;
            chosen.push(vote.clone());
        } else {
            vote.score += config.negative_reward;
        }
    }
    chosen
}

/// The topmost ancestor of a class or property, or the resource itself.
fn top_of(kb: &dyn KnowledgeBase, uri: &str) -> String {
    kb.top_elements(uri)
        .into_iter()
        .next()
        .unwrap_or_else(|| uri.to_string())
}

/// Generic class of an individual: the top of its most specific class.
fn generic_of_classes(kb: &dyn KnowledgeBase, classes: &[String], fallback: &str) -> String {
    let mut best: Option<(&String, f64)> = None;
    for class in classes {
        let specificity = kb.specificity_of(class);
        if best.is_none_or(|(_, s)| specificity > s) {
            best = Some((class, specificity));
        }
    }
    match best {
        Some((class, _)) => top_of(kb, class),
        None => fallback.to_string(),
    }
}

/// Generic element of any resource known to the knowledge base.
pub fn generic_of_uri(kb: &dyn KnowledgeBase, uri: &str) -> String {
    match kb.kind_of(uri) {
        Some(ResourceKind::Class | ResourceKind::ObjectProperty | ResourceKind::DatatypeProperty) => {
            top_of(kb, uri)
        }
        Some(ResourceKind::Individual) => generic_of_classes(kb, &kb.classes_of(uri), uri),
        _ => uri.to_string(),
    }
}

/// Resource a dialog context is generalized to in the learning store.
///
/// Classes and properties map to their topmost ancestor, instances to the top
/// of their most specific class, literals to the generic element of the
/// subject of their first triple.
pub fn generic_element(kb: &dyn KnowledgeBase, element: &OntologyElement) -> String {
    match &element.kind {
        ElementKind::Entity { .. } | ElementKind::ObjectProperty { .. } | ElementKind::DatatypeProperty { .. } => {
            top_of(kb, &element.uri)
        }
        ElementKind::Instance { class_uris, .. } => generic_of_classes(kb, class_uris, &element.uri),
        ElementKind::Literal { triples, .. } => match triples.first() {
            Some(triple) if !triple[0].is_empty() => generic_of_uri(kb, &triple[0]),
            _ => element.uri.clone(),
        },
        ElementKind::None => element.uri.clone(),
    }
}

/// One learning key per neighbor, or a single neighbor-less key.
pub fn learning_keys(kb: &dyn KnowledgeBase, key: &SuggestionKey) -> Vec<Key> {
    if key.neighbors.is_empty() {
        return vec![Key::without_neighbors(key.text.clone())];
    }
    key.neighbors
        .iter()
        .map(|sc| {
            let triples = sc.element.triples().to_vec();
            Key::new(key.text.clone(), generic_element(kb, &sc.element), triples)
        })
        .collect()
}

/// Replace computed scores with learned ones, averaged over every learned
/// record of the same candidate. Returns how many votes were updated.
pub fn apply_learned_scores(votes: &mut [Vote], learned: &[LearningVote]) -> usize {
    let mut updated = 0;
    for vote in votes.iter_mut() {
        let identity = vote.candidate.identity();
        let scores: Vec<f64> = learned
            .iter()
            .filter(|lv| lv.identifier.identity() == identity)
            .map(|lv| lv.score)
            .collect();
        if !scores.is_empty() {
            vote.score = scores.iter().sum::<f64>() / scores.len() as f64;
            vote.candidate.score = Some(vote.score);
            updated += 1;
        }
    }
    updated
}

/// Learned records for a list of votes, with session-specific fields cleared.
pub fn learning_votes(votes: &[Vote]) -> Vec<LearningVote> {
    votes
        .iter()
        .map(|vote| {
            let mut record = LearningVote::from(vote);
            record.identifier = SemanticConcept {
                id: None,
                verified: false,
                ..record.identifier
            };
            record
        })
        .collect()
}

/// Persist the rewards of a resolved dialog under each of its learning keys.
pub fn update_learning_model(store: &LearningStore, kb: &dyn KnowledgeBase, pair: &SuggestionPair) -> bool {
    let records = learning_votes(&pair.votes);
    let entries: Vec<(Key, Vec<LearningVote>)> = learning_keys(kb, &pair.key)
        .into_iter()
        .map(|key| (key, records.clone()))
        .collect();
    store.record(&entries)
}

/// JSON file holding the learning model.
#[derive(Debug, Clone)]
pub struct LearningStore {
    path: PathBuf,
}

impl LearningStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole model. A missing file is an empty model.
    pub fn load(&self) -> LearningResult<LearningModel> {
        if !self.path.exists() {
            return Ok(LearningModel::new());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| LearningError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        if data.trim().is_empty() {
            return Ok(LearningModel::new());
        }
        serde_json::from_str(&data).map_err(|e| LearningError::Serialization {
            message: format!("parse {}: {e}", self.path.display()),
        })
    }

    /// Overwrite the whole model.
    pub fn save(&self, model: &LearningModel) -> LearningResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LearningError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(model).map_err(|e| LearningError::Serialization {
            message: format!("serialize learning model: {e}"),
        })?;
        std::fs::write(&self.path, json).map_err(|e| LearningError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Read, replace the given entries, and rewrite the file.
    pub fn merge(&self, entries: &[(Key, Vec<LearningVote>)]) -> LearningResult<()> {
        let mut model = self.load()?;
        for (key, votes) in entries {
            model.insert(key.to_store_key(), votes.clone());
        }
        self.save(&model)
    }

    /// Learned votes stored under any of `keys`. Unreadable stores count as empty.
    pub fn votes_for(&self, keys: &[Key]) -> Vec<LearningVote> {
        match self.load() {
            Ok(model) => keys
                .iter()
                .filter_map(|k| model.get(&k.to_store_key()))
                .flatten()
                .cloned()
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "learning model could not be loaded");
                Vec::new()
            }
        }
    }

    /// Merge entries, logging instead of failing. Returns whether the save succeeded.
    pub fn record(&self, entries: &[(Key, Vec<LearningVote>)]) -> bool {
        match self.merge(entries) {
            Ok(()) => {
                tracing::debug!(keys = entries.len(), "learning model updated");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "learning model could not be stored");
                false
            }
        }
    }

    /// Decoded keys and their votes, in store order.
    pub fn entries(&self) -> LearningResult<Vec<(Key, Vec<LearningVote>)>> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|(raw, votes)| Key::from_store_key(&raw).map(|k| (k, votes)))
            .collect())
    }

    /// Delete the model file.
    pub fn clear(&self) -> LearningResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| LearningError::Io {
                path: self.path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, PropertyInfo, NEIGHBORS_NONE};
    use crate::nlp::tree::ParseTree;
    use crate::ontology::graph::tests::geo;

    const GEO: &str = "http://example.org/geo#";

    fn ann() -> Annotation {
        Annotation::new(1, 1, ParseTree::parse("(NN town)").unwrap())
    }

    fn pair() -> SuggestionPair {
        let a = ann();
        SuggestionPair {
            key: SuggestionKey {
                text: "town".into(),
                neighbors: vec![],
            },
            votes: vec![
                Vote::new(
                    SemanticConcept::new(OntologyElement::entity(&a, &format!("{GEO}City"), 1.0)),
                    0.8,
                ),
                Vote::new(
                    SemanticConcept::new(OntologyElement::datatype_property(
                        &a,
                        &format!("{GEO}population"),
                        PropertyInfo::default(),
                        None,
                    )),
                    0.5,
                ),
                Vote::new(SemanticConcept::none(&a), -1.0),
            ],
            group: Some(0),
            subject: None,
        }
    }

    #[test]
    fn chosen_vote_is_rewarded_and_others_penalized() {
        let mut p = pair();
        let before: Vec<f64> = p.votes.iter().map(|v| v.score).collect();
        let chosen_id = p.votes[1].id.clone();
        let chosen = update_vote_scores(&mut p, &chosen_id, &LearningConfig::default());

        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].id, chosen_id);
        assert!((p.votes[1].score - (before[1] + 1.0)).abs() < 1e-9);
        assert!((p.votes[0].score - (before[0] - 0.1)).abs() < 1e-9);
        assert!((p.votes[2].score - (before[2] - 0.1)).abs() < 1e-9);
    }

    #[test]
    fn unknown_vote_changes_only_penalties() {
        let mut p = pair();
        let chosen = update_vote_scores(&mut p, "no-such-vote", &LearningConfig::default());
        assert!(chosen.is_empty());
        assert!((p.votes[0].score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn generic_elements_climb_to_the_top() {
        let kb = geo();
        let a = ann();
        let capital = OntologyElement::entity(&a, &format!("{GEO}Capital"), 2.0);
        assert_eq!(generic_element(&kb, &capital), format!("{GEO}Place"));

        let vienna = OntologyElement::instance(
            &a,
            &format!("{GEO}Vienna"),
            vec![format!("{GEO}Capital"), format!("{GEO}City"), format!("{GEO}Place")],
            None,
        );
        assert_eq!(generic_element(&kb, &vienna), format!("{GEO}Place"));

        let length = OntologyElement::literal(
            &a,
            "2850",
            vec![[format!("{GEO}Danube"), format!("{GEO}length"), "2850".into()]],
            false,
        );
        assert_eq!(generic_element(&kb, &length), format!("{GEO}River"));

        let bare = OntologyElement::literal(&a, "Upper Austria", vec![], true);
        assert_eq!(generic_element(&kb, &bare), "Upper Austria");
    }

    #[test]
    fn keys_per_neighbor_or_sentinel() {
        let kb = geo();
        let a = ann();
        let mut key = SuggestionKey {
            text: "largest".into(),
            neighbors: vec![],
        };
        let keys = learning_keys(&kb, &key);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].oe_id, NEIGHBORS_NONE);

        key.neighbors = vec![
            SemanticConcept::new(OntologyElement::entity(&a, &format!("{GEO}City"), 1.0)),
            SemanticConcept::new(OntologyElement::literal(
                &a,
                "2850",
                vec![[format!("{GEO}Danube"), format!("{GEO}length"), "2850".into()]],
                false,
            )),
        ];
        let keys = learning_keys(&kb, &key);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].oe_id, format!("{GEO}Place"));
        assert_eq!(keys[1].triples.len(), 1);
    }

    #[test]
    fn learned_scores_replace_computed_ones() {
        let mut p = pair();
        let mut learned = learning_votes(&p.votes);
        learned[0].score = 3.0;
        let mut second = learned[0].clone();
        second.score = 1.0;
        learned.push(second);

        let mut votes = p.votes.clone();
        votes[1].score = 0.0;
        learned.remove(1);
        let updated = apply_learned_scores(&mut votes, &learned);
        assert_eq!(updated, 2);
        assert!((votes[0].score - 2.0).abs() < 1e-9);
        assert_eq!(votes[1].score, 0.0);
        p.votes = votes;
        assert_eq!(p.votes[0].candidate.score, Some(2.0));
    }

    #[test]
    fn store_merges_and_survives_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LearningStore::new(dir.path().join("nested").join("votes.json"));
        assert!(store.load().unwrap().is_empty());

        let p = pair();
        let first = Key::without_neighbors("town");
        let second = Key::new("town", format!("{GEO}Place"), vec![]);
        assert!(store.record(&[(first.clone(), learning_votes(&p.votes))]));
        assert!(store.record(&[(second.clone(), learning_votes(&p.votes[..1]))]));

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(store.votes_for(&[first.clone()]).len(), 3);
        assert_eq!(store.votes_for(&[first, second]).len(), 4);

        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.votes_for(&[Key::without_neighbors("town")]).is_empty());
        assert!(matches!(store.load(), Err(LearningError::Serialization { .. })));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn model_update_uses_every_learning_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LearningStore::new(dir.path().join("votes.json"));
        let kb = geo();
        let mut p = pair();
        let a = ann();
        p.key.neighbors = vec![
            SemanticConcept::new(OntologyElement::entity(&a, &format!("{GEO}Capital"), 2.0)),
            SemanticConcept::new(OntologyElement::entity(&a, &format!("{GEO}River"), 0.0)),
        ];
        assert!(update_learning_model(&store, &kb, &p));
        let keys: Vec<String> = store.entries().unwrap().into_iter().map(|(k, _)| k.oe_id).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&format!("{GEO}Place")));
        assert!(keys.contains(&format!("{GEO}River")));
    }
}
