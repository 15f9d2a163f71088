//! Data model shared by every pipeline stage.

pub mod annotation;
pub mod concept;
pub mod element;
pub mod feedback;
pub mod filter;
pub mod poc;
pub mod query;

pub use annotation::{Annotation, ResourceKind, SideInfo, Triple};
pub use concept::{Joker, QueryItem, SemanticConcept, Slot};
pub use element::{ElementKind, OntologyElement, PropertyInfo};
pub use feedback::{Key, LearningVote, SuggestionKey, SuggestionPair, Vote, NEIGHBORS_NONE};
pub use filter::{CardinalOp, FilterKind, QueryFilter};
pub use poc::Poc;
pub use query::{FocusPriority, Query};
