//! # Contexture Core
//!
//! Domain types, traits, and error definitions for the contexture context
//! assembly engine. This crate has **no engine logic**. It defines the
//! fragment model and the relationship graphs that the engine walks, plus the
//! collaborator traits a host service implements to feed it.
//!
//! ## Design Philosophy
//!
//! Everything the engine consumes is defined here and is read-only:
//! - Fragments and their visibility rules
//! - Composition (parent → child) and relationship (typed, directed) edges
//! - Source traits that supply those records from an external store
//!
//! Malformed records are rejected when the indexes are built, so the engine
//! itself never has to re-validate its inputs.

pub mod error;
pub mod fragment;
pub mod graph;
pub mod source;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, SourceError, ValidationError};
pub use fragment::{Effectiveness, Fragment, FragmentIndex, LayerType};
pub use graph::{
    CompositionEdge, CompositionGraph, RelationshipEdge, RelationshipGraph, RelationshipType,
};
pub use source::{CompositionSource, EmbeddingProvider, FragmentSource, RelationshipSource};
pub use token::{estimate_tokens, tokens_for_len};
