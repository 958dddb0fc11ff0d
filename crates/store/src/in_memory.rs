//! In-memory store: useful for testing, snapshots, and ephemeral sessions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use contexture_core::{
    CompositionEdge, CompositionSource, Effectiveness, Fragment, FragmentSource,
    RelationshipEdge, RelationshipSource, SourceError,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Records {
    fragments: Vec<Fragment>,
    compositions: Vec<CompositionEdge>,
    relationships: Vec<RelationshipEdge>,
    effectiveness: HashMap<String, Effectiveness>,
}

/// Fragments and edges held in memory.
///
/// Implements every collaborator trait the context service reads from.
/// Cloning is cheap and shares the same records.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        fragments: Vec<Fragment>,
        compositions: Vec<CompositionEdge>,
        relationships: Vec<RelationshipEdge>,
        effectiveness: HashMap<String, Effectiveness>,
    ) -> Self {
        let fragments = fragments.into_iter().map(with_id).collect();
        Self {
            records: Arc::new(RwLock::new(Records {
                fragments,
                compositions,
                relationships,
                effectiveness,
            })),
        }
    }

    /// Insert a fragment, replacing any fragment with the same id.
    /// An empty id is replaced with a fresh UUID. Returns the id.
    pub async fn insert_fragment(&self, fragment: Fragment) -> String {
        let fragment = with_id(fragment);
        let id = fragment.id.clone();
        let mut records = self.records.write().await;
        match records.fragments.iter_mut().find(|f| f.id == id) {
            Some(existing) => *existing = fragment,
            None => records.fragments.push(fragment),
        }
        id
    }

    pub async fn add_composition(&self, edge: CompositionEdge) {
        self.records.write().await.compositions.push(edge);
    }

    pub async fn add_relationship(&self, edge: RelationshipEdge) {
        self.records.write().await.relationships.push(edge);
    }

    pub async fn set_effectiveness(&self, id: impl Into<String>, effectiveness: Effectiveness) {
        self.records
            .write()
            .await
            .effectiveness
            .insert(id.into(), effectiveness);
    }

    /// Soft-delete a fragment. Returns whether it existed and was live.
    pub async fn delete_fragment(&self, id: &str) -> bool {
        let mut records = self.records.write().await;
        match records
            .fragments
            .iter_mut()
            .find(|f| f.id == id && f.deleted_at.is_none())
        {
            Some(fragment) => {
                fragment.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Ids of every visible fragment, in insertion order.
    pub async fn fragment_ids(&self) -> Vec<String> {
        let now = Utc::now();
        self.records
            .read()
            .await
            .fragments
            .iter()
            .filter(|f| f.is_visible(now))
            .map(|f| f.id.clone())
            .collect()
    }

    pub async fn fragment_count(&self) -> usize {
        self.records.read().await.fragments.len()
    }
}

fn with_id(mut fragment: Fragment) -> Fragment {
    if fragment.id.is_empty() {
        fragment.id = Uuid::new_v4().to_string();
    }
    fragment
}

#[async_trait]
impl FragmentSource for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    /// Visible fragments in the order their ids were requested.
    async fn fragments(&self, ids: &[String]) -> Result<Vec<Fragment>, SourceError> {
        let now = Utc::now();
        let records = self.records.read().await;
        let by_id: HashMap<&str, &Fragment> = records
            .fragments
            .iter()
            .filter(|f| f.is_visible(now))
            .map(|f| (f.id.as_str(), f))
            .collect();

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| by_id.get(id.as_str()).map(|f| (*f).clone()))
            .collect())
    }

    async fn effectiveness(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Effectiveness>, SourceError> {
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| records.effectiveness.get(id).map(|e| (id.clone(), *e)))
            .collect())
    }
}

#[async_trait]
impl CompositionSource for InMemoryStore {
    async fn children(&self, parent_id: &str) -> Result<Vec<CompositionEdge>, SourceError> {
        let records = self.records.read().await;
        let mut edges: Vec<CompositionEdge> = records
            .compositions
            .iter()
            .filter(|e| e.parent_id == parent_id)
            .cloned()
            .collect();
        edges.sort_by_key(|e| e.order);
        Ok(edges)
    }
}

#[async_trait]
impl RelationshipSource for InMemoryStore {
    async fn relationships(&self, ids: &[String]) -> Result<Vec<RelationshipEdge>, SourceError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let records = self.records.read().await;
        Ok(records
            .relationships
            .iter()
            .filter(|e| wanted.contains(e.source_id.as_str()) || wanted.contains(e.target_id.as_str()))
            .cloned()
            .collect())
    }
}
