//! Rich diagnostic error types for the conceptq engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Recoverable conditions (lookup misses,
//! unreadable learning stores, dangling properties) are logged and degraded
//! inside the pipeline and never reach these types.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for the conceptq engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ConceptError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Learning(#[from] LearningError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Parse tree errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TreeError {
    #[error("malformed bracketed tree at byte {position}: {message}")]
    #[diagnostic(
        code(conceptq::tree::malformed),
        help(
            "Parse trees use Penn Treebank bracket notation, e.g. \
             `(ROOT (NP (NNP Vienna)))`. Check that every label is followed \
             by children or a token and that brackets balance."
        )
    )]
    Malformed { position: usize, message: String },

    #[error("empty parse tree")]
    #[diagnostic(
        code(conceptq::tree::empty),
        help("The parser returned no nodes. Provide a tree with at least one token.")
    )]
    Empty,

    #[error("node {id} out of range (tree has {len} nodes)")]
    #[diagnostic(
        code(conceptq::tree::node_out_of_range),
        help("Node ids are only valid for the tree that produced them.")
    )]
    NodeOutOfRange { id: usize, len: usize },
}

pub type TreeResult<T> = std::result::Result<T, TreeError>;

// ---------------------------------------------------------------------------
// Ontology errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OntologyError {
    #[error("failed to read ontology document: {path}")]
    #[diagnostic(
        code(conceptq::ontology::read),
        help("Ensure the ontology file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ontology document: {message}")]
    #[diagnostic(
        code(conceptq::ontology::parse),
        help(
            "The ontology document is JSON with `classes`, `object_properties`, \
             `datatype_properties` and `individuals` arrays. Check the syntax."
        )
    )]
    Parse { message: String },

    #[error("invalid IRI \"{iri}\": {message}")]
    #[diagnostic(
        code(conceptq::ontology::invalid_iri),
        help("Resource identifiers must be absolute IRIs such as `http://example.org/geo#City`.")
    )]
    InvalidIri { iri: String, message: String },

    #[error("SPARQL query error: {message}")]
    #[diagnostic(
        code(conceptq::ontology::sparql),
        help(
            "The synthesized SPARQL query failed. Run with RUST_LOG=debug to \
             see the emitted query text."
        )
    )]
    Sparql { message: String },
}

pub type OntologyResult<T> = std::result::Result<T, OntologyError>;

// ---------------------------------------------------------------------------
// Learning store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LearningError {
    #[error("learning store I/O failed: {path}")]
    #[diagnostic(
        code(conceptq::learning::io),
        help("Check that the learning store directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("learning store is not valid JSON: {message}")]
    #[diagnostic(
        code(conceptq::learning::serde),
        help(
            "The learning store maps serialized keys to vote lists. \
             Delete the file to start with an empty model."
        )
    )]
    Serialization { message: String },
}

pub type LearningResult<T> = std::result::Result<T, LearningError>;

// ---------------------------------------------------------------------------
// Query synthesis errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("no resolved concept contributed to the formal query")]
    #[diagnostic(
        code(conceptq::query::empty),
        help("Rephrase the question so that at least one phrase matches the knowledge base.")
    )]
    Empty,

    #[error("resolved concepts span several namespaces: {namespaces:?}")]
    #[diagnostic(
        code(conceptq::query::mixed_namespaces),
        help("A single query can only address one ontology namespace.")
    )]
    MixedNamespaces { namespaces: Vec<String> },

    #[error("formal query execution failed: {message}")]
    #[diagnostic(
        code(conceptq::query::execution),
        help("The knowledge base rejected the synthesized query.")
    )]
    Execution { message: String },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("session \"{session}\" has no pending dialog")]
    #[diagnostic(
        code(conceptq::session::no_dialog),
        help("Ask a question first; votes answer the dialog it opens.")
    )]
    NoPendingDialog { session: String },

    #[error("vote \"{vote}\" is not part of the pending dialog")]
    #[diagnostic(
        code(conceptq::session::unknown_vote),
        help("Use one of the vote ids printed with the current dialog.")
    )]
    UnknownVote { vote: String },

    #[error("session store I/O failed: {path}")]
    #[diagnostic(
        code(conceptq::session::io),
        help("Check that the session directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session state is not valid JSON: {message}")]
    #[diagnostic(
        code(conceptq::session::serde),
        help("Clear the session to discard the stale state.")
    )]
    Serialization { message: String },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Convenience alias used throughout the crate.
pub type ConceptResult<T> = std::result::Result<T, ConceptError>;
