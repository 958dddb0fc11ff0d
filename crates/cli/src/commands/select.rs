//! `contexture select`: Budgeted selection over a snapshot.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use contexture_core::{EmbeddingProvider, SourceError};

use crate::SelectArgs;

/// Serves one precomputed embedding for every prompt.
struct PrecomputedEmbedding(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for PrecomputedEmbedding {
    fn name(&self) -> &str {
        "precomputed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, SourceError> {
        Ok(self.0.clone())
    }
}

fn read_embedding(path: &Path) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let embedding: Vec<f32> = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not a JSON array of numbers: {e}", path.display()))?;
    Ok(embedding)
}

pub async fn run(config: Option<&Path>, args: SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(budget) = args.budget {
        config.selection.max_tokens = budget;
    }
    let strategy = args.strategy.unwrap_or(config.selection.strategy);

    let store = super::open_store(&args.snapshot)?;
    let ids = if args.ids.is_empty() {
        store.fragment_ids().await
    } else {
        args.ids
    };

    let mut service = contexture_store::ContextService::from_store(store, config);
    let mut prompt = args.prompt;
    if let Some(path) = &args.prompt_embedding {
        service = service.with_embedder(Arc::new(PrecomputedEmbedding(read_embedding(path)?)));
        prompt.get_or_insert_with(String::new);
    }

    let composed = service.compose(&ids, prompt.as_deref(), strategy).await?;

    super::report(&composed.diagnostics);
    tracing::info!(
        strategy = %composed.strategy,
        selected = composed.selection.selected.len(),
        tokens = composed.selection.total_tokens,
        unused = composed.selection.unused_tokens,
        score = composed.selection.total_score,
        "Selection complete"
    );
    println!("{}", composed.text);
    Ok(())
}
