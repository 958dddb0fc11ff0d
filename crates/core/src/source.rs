//! Collaborator traits: where fragments, edges, and embeddings come from.
//!
//! The engine never fetches anything itself. A host service implements these
//! traits over its store (a relational database, an in-memory map, a JSON
//! snapshot), materializes the records for one request, and hands them to the
//! engine. All methods are read-only.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::fragment::{Effectiveness, Fragment};
use crate::graph::{CompositionEdge, RelationshipEdge};

/// Supplies fragment records by id.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// The source name (e.g., "in_memory", "postgres").
    fn name(&self) -> &str;

    /// Fetch the fragments with the given ids. Unknown ids are omitted.
    ///
    /// Implementations should already exclude soft-deleted and expired
    /// entries; the engine filters again regardless.
    async fn fragments(&self, ids: &[String]) -> Result<Vec<Fragment>, SourceError>;

    /// Historical effectiveness for the given ids, where known.
    async fn effectiveness(
        &self,
        _ids: &[String],
    ) -> Result<HashMap<String, Effectiveness>, SourceError> {
        Ok(HashMap::new())
    }
}

/// Supplies composition (parent → child) edges.
#[async_trait]
pub trait CompositionSource: Send + Sync {
    /// Child edges of `parent_id`, ordered by `order`.
    async fn children(&self, parent_id: &str) -> Result<Vec<CompositionEdge>, SourceError>;
}

/// Supplies typed relationship edges.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    /// Every edge whose source or target is in `ids`.
    async fn relationships(&self, ids: &[String]) -> Result<Vec<RelationshipEdge>, SourceError>;
}

/// Turns text into a fixed-length embedding vector (an external AI provider).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The provider name (e.g., "openai", "local").
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SourceError>;
}
