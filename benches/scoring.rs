//! Benchmarks for vote scoring and question preparation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use conceptq::config::EngineConfig;
use conceptq::dialog::similarity::{monge_elkan, soundex, Scorer};
use conceptq::nlp::tree::ParseTree;
use conceptq::ontology::{OntologyGraph, StaticSynonyms};
use conceptq::pipeline::Resolver;
use conceptq::session::MemorySessionStore;

const GEO: &str = r#"{
  "prefixes": { "geo": "http://example.org/geo#" },
  "classes": [
    { "uri": "http://example.org/geo#City", "labels": ["city", "town"] },
    { "uri": "http://example.org/geo#Country", "labels": ["country"] }
  ],
  "object_properties": [
    { "uri": "http://example.org/geo#locatedIn", "labels": ["located in"],
      "domain": ["http://example.org/geo#City"], "range": ["http://example.org/geo#Country"] }
  ],
  "datatype_properties": [
    { "uri": "http://example.org/geo#population", "labels": ["population"],
      "domain": ["http://example.org/geo#City"] }
  ],
  "individuals": [
    { "uri": "http://example.org/geo#Vienna", "labels": ["Vienna"], "types": ["http://example.org/geo#City"],
      "values": [{ "property": "http://example.org/geo#population", "value": "1897491" }] }
  ]
}"#;

fn bench_monge_elkan(c: &mut Criterion) {
    c.bench_function("monge_elkan", |bench| {
        bench.iter(|| black_box(monge_elkan(black_box("largest city in austria"), black_box("biggest town"))))
    });
}

fn bench_soundex(c: &mut Criterion) {
    c.bench_function("soundex", |bench| {
        bench.iter(|| black_box(soundex(black_box("inhabitants"))))
    });
}

fn bench_scorer(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut synonyms = StaticSynonyms::new();
    synonyms.add_set(&["city", "town", "municipality"]);
    let scorer = Scorer::new(&synonyms, &config.dialog);
    let labels: Vec<String> = ["city", "capital", "country", "population", "located in"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("scorer_best_of_5", |bench| {
        bench.iter(|| black_box(scorer.best_score(black_box("towns"), &labels)))
    });
}

fn bench_prepare(c: &mut Criterion) {
    let kb = OntologyGraph::from_json(GEO).unwrap();
    let synonyms = StaticSynonyms::new();
    let config = EngineConfig::default();
    let sessions = MemorySessionStore::new();
    let resolver = Resolver::new(&kb, &synonyms, &config, &sessions);
    let tree = ParseTree::parse(
        "(ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN population)) (PP (IN of) (NP (NNP Vienna)))))))",
    )
    .unwrap();

    c.bench_function("prepare_question", |bench| {
        bench.iter(|| black_box(resolver.prepare(tree.clone()).unwrap()))
    });
}

criterion_group!(benches, bench_monge_elkan, bench_soundex, bench_scorer, bench_prepare);
criterion_main!(benches);
