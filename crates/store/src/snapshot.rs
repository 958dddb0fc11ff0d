//! JSON snapshots: a whole fragment graph in one document.
//!
//! ```json
//! {
//!   "fragments":     [{ "id": "p1", "layer_type": "profile", "content": "..." }],
//!   "compositions":  [{ "parent_id": "p1", "child_id": "t1", "order": 0 }],
//!   "relationships": [{ "source_id": "t1", "type": "requires", "target_id": "s1" }],
//!   "effectiveness": { "t1": { "avg_rating": 4.5, "success_rate": 0.9 } }
//! }
//! ```
//!
//! Every section is optional.

use std::collections::HashMap;
use std::path::Path;

use contexture_core::{
    CompositionEdge, Effectiveness, Error, Fragment, RelationshipEdge, SourceError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::in_memory::InMemoryStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub compositions: Vec<CompositionEdge>,
    #[serde(default)]
    pub relationships: Vec<RelationshipEdge>,
    #[serde(default)]
    pub effectiveness: HashMap<String, Effectiveness>,
}

impl Snapshot {
    /// Read and parse a snapshot file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SourceError::NotFound(format!("snapshot {}", path.display()))
            }
            _ => SourceError::Storage(format!("Failed to read snapshot {}: {e}", path.display())),
        })?;
        let snapshot = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            fragments = snapshot.fragments.len(),
            compositions = snapshot.compositions.len(),
            relationships = snapshot.relationships.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Parse a snapshot and check its effectiveness records.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let snapshot: Self = serde_json::from_str(content)?;
        for (id, effectiveness) in &snapshot.effectiveness {
            effectiveness.validate(id)?;
        }
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Move the records into a store. Fragments without an id get a UUID.
    pub fn into_store(self) -> InMemoryStore {
        InMemoryStore::from_parts(
            self.fragments,
            self.compositions,
            self.relationships,
            self.effectiveness,
        )
    }
}
