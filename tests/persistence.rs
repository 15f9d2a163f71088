//! Persistence tests: the learning model and file-backed sessions survive
//! process boundaries.

use conceptq::config::EngineConfig;
use conceptq::dialog::learning::LearningStore;
use conceptq::model::{Annotation, Key, LearningVote, OntologyElement, SemanticConcept, Vote};
use conceptq::nlp::tree::ParseTree;
use conceptq::ontology::{OntologyGraph, StaticSynonyms};
use conceptq::pipeline::{Outcome, Request, Resolver};
use conceptq::session::{FileSessionStore, MemorySessionStore, SessionStore};

const GEO: &str = r#"{
  "prefixes": { "geo": "http://example.org/geo#" },
  "classes": [
    { "uri": "http://example.org/geo#Place", "labels": ["place"] },
    { "uri": "http://example.org/geo#City", "labels": ["city", "town"], "parents": ["http://example.org/geo#Place"] },
    { "uri": "http://example.org/geo#Country", "labels": ["country"], "parents": ["http://example.org/geo#Place"] }
  ],
  "object_properties": [
    { "uri": "http://example.org/geo#locatedIn", "labels": ["located in"],
      "domain": ["http://example.org/geo#City"], "range": ["http://example.org/geo#Country"] }
  ],
  "datatype_properties": [
    { "uri": "http://example.org/geo#population", "labels": ["population", "inhabitants"],
      "domain": ["http://example.org/geo#Place"] }
  ],
  "individuals": [
    { "uri": "http://example.org/geo#Vienna", "labels": ["Vienna"], "types": ["http://example.org/geo#City"],
      "values": [{ "property": "http://example.org/geo#population", "value": "1897491" }],
      "links": [{ "property": "http://example.org/geo#locatedIn", "object": "http://example.org/geo#Austria" }] },
    { "uri": "http://example.org/geo#Graz", "labels": ["Graz"], "types": ["http://example.org/geo#City"],
      "values": [{ "property": "http://example.org/geo#population", "value": "291072" }],
      "links": [{ "property": "http://example.org/geo#locatedIn", "object": "http://example.org/geo#Austria" }] },
    { "uri": "http://example.org/geo#Austria", "labels": ["Austria"], "types": ["http://example.org/geo#Country"],
      "values": [{ "property": "http://example.org/geo#population", "value": "9104772" }] }
  ]
}"#;

const LARGEST_CITY: &str = "(ROOT (SBARQ (WHNP (WDT Which) (NN city)) (SQ (VBZ has) (NP (DT the) (JJS largest) (NN population)))))";

fn learning_vote(uri: &str, score: f64) -> LearningVote {
    let tree = ParseTree::parse("(ROOT (NP (NN population)))").unwrap();
    let annotation = Annotation::new(0, 0, tree);
    let candidate = SemanticConcept::new(OntologyElement::entity(&annotation, uri, 1.0));
    LearningVote::from(&Vote::new(candidate, score))
}

#[test]
fn learning_model_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("model").join("learning.json");

    let literal_key = Key::new(
        "2850",
        "http://example.org/geo#River",
        vec![
            [
                "http://example.org/geo#Danube".into(),
                "http://example.org/geo#length".into(),
                "2850".into(),
            ],
            [
                "http://example.org/geo#Rhine".into(),
                "http://example.org/geo#elevation".into(),
                "2850".into(),
            ],
        ],
    );
    let plain_key = Key::without_neighbors("largest");

    {
        let store = LearningStore::new(&path);
        assert!(store.entries().unwrap().is_empty());
        store
            .merge(&[
                (literal_key.clone(), vec![learning_vote("http://example.org/geo#length", 0.8)]),
                (plain_key.clone(), vec![learning_vote("http://example.org/geo#population", 1.2)]),
            ])
            .unwrap();
    }

    let reopened = LearningStore::new(&path);
    let entries = reopened.entries().unwrap();
    assert_eq!(entries.len(), 2);
    let (_, votes) = entries.iter().find(|(k, _)| *k == literal_key).expect("literal key");
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].score, 0.8);
    assert_eq!(reopened.votes_for(&[plain_key.clone()])[0].score, 1.2);

    // merging replaces only the given key
    reopened
        .merge(&[(plain_key.clone(), vec![learning_vote("http://example.org/geo#population", 2.2)])])
        .unwrap();
    assert_eq!(reopened.votes_for(&[plain_key])[0].score, 2.2);
    assert_eq!(reopened.votes_for(&[literal_key]).len(), 1);

    reopened.clear().unwrap();
    assert!(!path.exists());
    assert!(reopened.entries().unwrap().is_empty());
}

#[test]
fn corrupt_learning_model_is_treated_as_empty_for_lookups() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("learning.json");
    std::fs::write(&path, "[ broken").unwrap();

    let store = LearningStore::new(&path);
    assert!(store.entries().is_err());
    assert!(store.votes_for(&[Key::without_neighbors("largest")]).is_empty());
}

#[test]
fn chosen_candidate_ranks_first_next_time() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("learning.json");
    let kb = OntologyGraph::from_json(GEO).unwrap();
    let synonyms = StaticSynonyms::new();
    let config = EngineConfig::default();

    let chosen_label = {
        let store = LearningStore::new(&path);
        let sessions = MemorySessionStore::new();
        let resolver = Resolver::new(&kb, &synonyms, &config, &sessions).with_learning(&store);
        let outcome = resolver.respond("first", Request::Ask(LARGEST_CITY.into()));
        let dialog = outcome.dialog().expect("dialog expected").clone();
        let pick = if dialog.votes.len() >= 3 { 1 } else { 0 };
        let vote = &dialog.votes[pick];
        resolver.respond("first", Request::Vote(vote.id.clone()));
        vote.candidate.clone()
    };

    let store = LearningStore::new(&path);
    let sessions = MemorySessionStore::new();
    let resolver = Resolver::new(&kb, &synonyms, &config, &sessions).with_learning(&store);
    let outcome = resolver.respond("second", Request::Ask(LARGEST_CITY.into()));
    let dialog = outcome.dialog().expect("dialog expected");
    assert_eq!(dialog.votes[0].candidate, chosen_label, "{dialog}");
}

#[test]
fn file_sessions_carry_a_dialog_across_resolvers() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = OntologyGraph::from_json(GEO).unwrap();
    let synonyms = StaticSynonyms::new();
    let config = EngineConfig::default();

    let vote_id = {
        let sessions = FileSessionStore::new(dir.path());
        let resolver = Resolver::new(&kb, &synonyms, &config, &sessions);
        let outcome = resolver.respond("cli", Request::Ask(LARGEST_CITY.into()));
        let dialog = outcome.dialog().expect("dialog expected");
        dialog.votes.last().unwrap().id.clone()
    };
    assert!(dir.path().join("cli.json").exists());

    let sessions = FileSessionStore::new(dir.path());
    assert!(sessions.get("cli").unwrap().is_some_and(|c| c.pair.is_some()));
    let resolver = Resolver::new(&kb, &synonyms, &config, &sessions);
    let outcome = resolver.respond("cli", Request::Vote(vote_id));
    assert!(!matches!(outcome, Outcome::Failed(_)), "{outcome:?}");
}
