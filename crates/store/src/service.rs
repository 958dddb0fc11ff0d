//! The context service: fetches what a request needs, then runs the engine.
//!
//! The engine itself is synchronous and only sees materialized records. This
//! service walks the collaborators level by level (composition children for
//! assembly, relationship edges for resolution), builds the indexes, and
//! hands them over.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use contexture_config::{EngineConfig, SelectionStrategy};
use contexture_core::{
    CompositionEdge, CompositionGraph, CompositionSource, EmbeddingProvider, Error, FragmentIndex,
    FragmentSource, RelationshipEdge, RelationshipGraph, RelationshipSource, Result,
};
use contexture_engine::{
    Assembly, AssemblyOptions, ComposeRequest, ComposedContext, ContextComposer,
    DependencyResolver, HierarchicalAssembler, ResolutionResult, ResolveOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::in_memory::InMemoryStore;

/// A resolution and the context composed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub resolution: ResolutionResult,
    pub context: ComposedContext,
}

pub struct ContextService {
    fragments: Arc<dyn FragmentSource>,
    compositions: Arc<dyn CompositionSource>,
    relationships: Arc<dyn RelationshipSource>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: EngineConfig,
}

impl ContextService {
    pub fn new(
        fragments: Arc<dyn FragmentSource>,
        compositions: Arc<dyn CompositionSource>,
        relationships: Arc<dyn RelationshipSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            fragments,
            compositions,
            relationships,
            embedder: None,
            config,
        }
    }

    /// A service reading everything from one in-memory store.
    pub fn from_store(store: InMemoryStore, config: EngineConfig) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store.clone(), store, config)
    }

    /// Embed prompts with `provider` for similarity scoring.
    pub fn with_embedder(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assemble the composition tree under `root_id`.
    pub async fn assemble(&self, root_id: &str) -> Result<Assembly> {
        let max_depth = self.config.assembly.max_depth;
        let mut known: HashSet<String> = HashSet::from([root_id.to_string()]);
        let mut order = vec![root_id.to_string()];
        let mut edges: Vec<CompositionEdge> = Vec::new();
        let mut frontier = vec![root_id.to_string()];

        // One level past `max_depth`, edges only: the assembler needs to know
        // whether a node at the limit has children.
        for depth in 0..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for parent in &frontier {
                for edge in self.compositions.children(parent).await? {
                    if depth < max_depth && known.insert(edge.child_id.clone()) {
                        order.push(edge.child_id.clone());
                        next.push(edge.child_id.clone());
                    }
                    edges.push(edge);
                }
            }
            frontier = next;
        }

        let fragments = self.fragments.fragments(&order).await?;
        debug!(root = root_id, fragments = fragments.len(), edges = edges.len(), "Fetched composition tree");

        let index = FragmentIndex::new(fragments, Utc::now())?;
        let graph = CompositionGraph::new(edges)?;
        let assembler = HierarchicalAssembler::new(AssemblyOptions::from(&self.config.assembly));
        let assembly = assembler.assemble(root_id, &index, &graph)?;

        info!(
            root = root_id,
            tokens = assembly.tokens,
            diagnostics = assembly.diagnostics.len(),
            "Assembled context"
        );
        Ok(assembly)
    }

    /// Resolve the dependencies of `seed_ids`.
    pub async fn resolve(&self, seed_ids: &[String]) -> Result<ResolutionResult> {
        let max_depth = self.config.resolution.max_depth;
        let mut known: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        for id in seed_ids {
            if known.insert(id.clone()) {
                order.push(id.clone());
            }
        }

        let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();
        let mut edges: Vec<RelationshipEdge> = Vec::new();
        let mut frontier = order.clone();

        for depth in 0..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let sources: HashSet<&str> = frontier.iter().map(String::as_str).collect();
            let mut next = Vec::new();
            for edge in self.relationships.relationships(&frontier).await? {
                let key = (
                    edge.source_id.clone(),
                    edge.relationship_type.to_string(),
                    edge.target_id.clone(),
                );
                if !seen_edges.insert(key) {
                    continue;
                }
                if depth < max_depth
                    && sources.contains(edge.source_id.as_str())
                    && known.insert(edge.target_id.clone())
                {
                    order.push(edge.target_id.clone());
                    next.push(edge.target_id.clone());
                }
                edges.push(edge);
            }
            frontier = next;
        }

        let fragments = self.fragments.fragments(&order).await?;
        debug!(seeds = seed_ids.len(), fragments = fragments.len(), edges = edges.len(), "Fetched relationship graph");

        let index = FragmentIndex::new(fragments, Utc::now())?;
        let graph = RelationshipGraph::new(edges)?;
        let resolver = DependencyResolver::new(ResolveOptions::from(&self.config.resolution));
        let resolution = resolver.resolve(seed_ids, &index, &graph)?;

        info!(
            seeds = seed_ids.len(),
            resolved = resolution.resolved.len(),
            conflicts = resolution.conflicts.len(),
            "Resolved dependencies"
        );
        Ok(resolution)
    }

    /// Select and render a budgeted context from `candidate_ids`.
    pub async fn compose(
        &self,
        candidate_ids: &[String],
        prompt: Option<&str>,
        strategy: SelectionStrategy,
    ) -> Result<ComposedContext> {
        let composer = ContextComposer::from_config(&self.config).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let fragments = self.fragments.fragments(candidate_ids).await?;
        let effectiveness = self.fragments.effectiveness(candidate_ids).await?;
        for (id, record) in &effectiveness {
            record.validate(id)?;
        }
        let index = FragmentIndex::new(fragments, Utc::now())?;

        let mut request =
            ComposeRequest::new(self.config.selection.max_tokens).with_effectiveness(effectiveness);
        if strategy == SelectionStrategy::Optimal
            && let Some(embedding) = self.embed_prompt(prompt).await
        {
            request = request.with_prompt_embedding(embedding);
        }

        Ok(composer.compose(strategy, &index, &request)?)
    }

    /// Resolve `seed_ids`, then compose over the result in dependency order.
    pub async fn resolve_and_compose(
        &self,
        seed_ids: &[String],
        prompt: Option<&str>,
    ) -> Result<ResolvedContext> {
        let resolution = self.resolve(seed_ids).await?;
        let context = self
            .compose(&resolution.order, prompt, self.config.selection.strategy)
            .await?;
        Ok(ResolvedContext {
            resolution,
            context,
        })
    }

    /// Embed the prompt, or `None` when there is no prompt, no provider,
    /// or the provider fails.
    async fn embed_prompt(&self, prompt: Option<&str>) -> Option<Vec<f32>> {
        let (prompt, embedder) = (prompt?, self.embedder.as_ref()?);
        match embedder.embed(prompt).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(
                    provider = embedder.name(),
                    error = %e,
                    "Prompt embedding failed, scoring without similarity"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contexture_core::{
        Effectiveness, Fragment, LayerType, RelationshipType, SourceError, ValidationError,
    };
    use contexture_engine::Diagnostic;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, SourceError> {
            Err(SourceError::EmbeddingFailed("provider offline".into()))
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn store_with(fragments: &[(&str, &str)]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, content) in fragments {
            store
                .insert_fragment(Fragment::new(*id, LayerType::Snippet, *content))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn assembles_from_store() {
        let store = store_with(&[("root", "ROOT"), ("child1", "ONE"), ("child2", "TWO")]).await;
        store.add_composition(CompositionEdge::new("root", "child1", 0)).await;
        store
            .add_composition(CompositionEdge::new("child1", "child2", 0).optional())
            .await;

        let mut config = EngineConfig::default();
        config.assembly.include_optional = false;
        config.assembly.include_headers = false;
        let service = ContextService::from_store(store, config);

        let assembly = service.assemble("root").await.unwrap();
        assert_eq!(assembly.text, "ROOT\n\nONE");
    }

    #[tokio::test]
    async fn assembly_reports_depth_limit() {
        let store = store_with(&[("a", "A"), ("b", "B"), ("c", "C")]).await;
        store.add_composition(CompositionEdge::new("a", "b", 0)).await;
        store.add_composition(CompositionEdge::new("b", "c", 0)).await;

        let mut config = EngineConfig::default();
        config.assembly.max_depth = 1;
        let service = ContextService::from_store(store, config);

        let assembly = service.assemble("a").await.unwrap();
        assert!(!assembly.text.contains('C'));
        assert!(matches!(
            assembly.diagnostics.as_slice(),
            [Diagnostic::DepthLimitReached { .. }]
        ));
    }

    #[tokio::test]
    async fn missing_root_is_validation_error() {
        let service = ContextService::from_store(InMemoryStore::new(), EngineConfig::default());
        let err = service.assemble("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingFragment(_))
        ));
    }

    #[tokio::test]
    async fn resolves_through_store() {
        let store = store_with(&[("X", "x"), ("Y", "y"), ("Z", "z")]).await;
        store
            .add_relationship(RelationshipEdge::new("X", RelationshipType::Requires, "Y"))
            .await;
        store
            .add_relationship(RelationshipEdge::new("Y", RelationshipType::Conflicts, "Z"))
            .await;
        let service = ContextService::from_store(store, EngineConfig::default());

        let result = service.resolve(&ids(&["X", "Z"])).await.unwrap();
        assert_eq!(result.resolved, ids(&["X", "Z", "Y"]));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].fragment_id, "Y");
    }

    #[tokio::test]
    async fn resolve_and_compose_uses_dependency_order() {
        let store = store_with(&[("A", "alpha"), ("B", "beta"), ("C", "gamma")]).await;
        store
            .add_relationship(RelationshipEdge::new("A", RelationshipType::Requires, "B"))
            .await;
        store
            .add_relationship(RelationshipEdge::new("B", RelationshipType::Requires, "C"))
            .await;

        let mut config = EngineConfig::default();
        config.assembly.include_headers = false;
        let service = ContextService::from_store(store, config);

        let out = service.resolve_and_compose(&ids(&["A"]), None).await.unwrap();
        assert_eq!(out.resolution.order, ids(&["C", "B", "A"]));
        assert_eq!(out.context.text, "gamma\n\nbeta\n\nalpha");
    }

    #[tokio::test]
    async fn prompt_embedding_used_for_optimal() {
        let store = InMemoryStore::new();
        store
            .insert_fragment(
                Fragment::new("far", LayerType::Snippet, "x")
                    .with_token_count(10)
                    .with_embedding(vec![0.0, 1.0]),
            )
            .await;
        store
            .insert_fragment(
                Fragment::new("near", LayerType::Snippet, "y")
                    .with_token_count(10)
                    .with_embedding(vec![1.0, 0.0]),
            )
            .await;

        let mut config = EngineConfig::default();
        config.selection.max_tokens = 10;
        let service = ContextService::from_store(store, config)
            .with_embedder(Arc::new(FixedEmbedder(vec![1.0, 0.0])));

        let out = service
            .compose(&ids(&["far", "near"]), Some("query"), SelectionStrategy::Optimal)
            .await
            .unwrap();
        assert_eq!(out.selection.ids(), vec!["near"]);
    }

    #[tokio::test]
    async fn embedding_failure_falls_back() {
        let store = store_with(&[("a", "alpha")]).await;
        let service = ContextService::from_store(store, EngineConfig::default())
            .with_embedder(Arc::new(FailingEmbedder));

        let out = service
            .compose(&ids(&["a"]), Some("query"), SelectionStrategy::Optimal)
            .await
            .unwrap();
        assert_eq!(out.selection.ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn out_of_range_effectiveness_rejected() {
        let store = store_with(&[("a", "alpha")]).await;
        store
            .set_effectiveness(
                "a",
                Effectiveness {
                    avg_rating: 4.0,
                    success_rate: 40.0,
                },
            )
            .await;
        let service = ContextService::from_store(store, EngineConfig::default());

        let err = service
            .compose(&ids(&["a"]), None, SelectionStrategy::Optimal)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidSuccessRate { .. })
        ));
    }

    #[tokio::test]
    async fn bad_stale_window_is_config_error() {
        let store = store_with(&[("a", "alpha")]).await;
        let mut config = EngineConfig::default();
        config.scoring.stale_after_days = 9_000_000_000_000;
        let service = ContextService::from_store(store, config);

        let err = service
            .compose(&ids(&["a"]), None, SelectionStrategy::Priority)
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::Config { message } if message.contains("stale_after_days")));
    }
}
