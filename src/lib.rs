// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # conceptq
//!
//! Resolves natural-language questions against a knowledge graph: phrases
//! are grounded in ontology resources, competing readings are settled in
//! learning dialogs, and the resolved concepts are synthesized into SPARQL.
//!
//! ## Architecture
//!
//! - **Parse trees** (`nlp`): arena Penn trees, POC/focus and filter extraction
//! - **Data model** (`model`): annotations, ontology elements, semantic concepts, feedback
//! - **Knowledge base** (`ontology`): `KnowledgeBase` trait, petgraph + oxigraph implementation
//! - **Element builder** (`builder`) and **consolidator** (`consolidator`)
//! - **Disambiguation** (`dialog`): vote ranking, quick task votes, reward model
//! - **Synthesis** (`query`): joker insertion, property direction, SPARQL, answer text
//! - **Pipeline** (`pipeline`): the `Resolver` driving sessions through it all
//!
//! ## Library usage
//!
//! ```no_run
//! use conceptq::config::EngineConfig;
//! use conceptq::ontology::{OntologyGraph, StaticSynonyms};
//! use conceptq::pipeline::Resolver;
//! use conceptq::session::MemorySessionStore;
//!
//! let kb = OntologyGraph::load(std::path::Path::new("geo.json")).unwrap();
//! let synonyms = StaticSynonyms::new();
//! let config = EngineConfig::default();
//! let sessions = MemorySessionStore::new();
//! let resolver = Resolver::new(&kb, &synonyms, &config, &sessions);
//! let outcome = resolver
//!     .ask("demo", "(ROOT (NP (NP (NN population)) (PP (IN of) (NP (NNP Vienna)))))")
//!     .unwrap();
//! println!("{outcome}");
//! ```

pub mod builder;
pub mod config;
pub mod consolidator;
pub mod dialog;
pub mod error;
pub mod mapper;
pub mod model;
pub mod nlp;
pub mod ontology;
pub mod pipeline;
pub mod query;
pub mod session;
