//! Parse-tree utilities and the linguistic pre-processing of questions.
//!
//! The syntax parser itself is external: questions arrive as Penn Treebank
//! bracket strings and are held as immutable [`tree::ParseTree`] arenas.

pub mod filter;
pub mod poc;
pub mod tags;
pub mod tree;
