//! Relevance scoring: how useful a fragment is likely to be for a prompt.
//!
//! The score is a weighted sum in `[0, 1]`, built in a fixed order:
//!
//! | Term | Contribution |
//! |------|--------------|
//! | Priority | `priority_weight · priority/10` |
//! | Similarity | `similarity_weight · cos(prompt, fragment)` when both embeddings exist |
//! | Fallback | `fallback_weight · priority/10` otherwise |
//! | Effectiveness | `effectiveness_weight · (½·rating/5 + ½·success)`, or a flat default |
//! | Usage | `usage_weight · min(uses/saturation, 1)` |
//! | Auto-include | flat bonus |
//! | Staleness | running total × penalty when unused for too long |
//!
//! Without embeddings the priority counts twice (once as itself, once as
//! the similarity proxy).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use contexture_config::{ConfigError, MAX_STALE_AFTER_DAYS, ScoringConfig};
use contexture_core::{Effectiveness, Fragment};
use serde::{Deserialize, Serialize};

use crate::selection::similarity::cosine_similarity;

/// Weights of the relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub priority: f64,
    pub similarity: f64,
    pub fallback: f64,
    pub effectiveness: f64,
    pub default_effectiveness: f64,
    pub usage: f64,
    pub usage_saturation: u64,
    pub auto_include_bonus: f64,
    pub stale_after: Duration,
    pub stale_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let config = ScoringConfig::default();
        Self::with_stale_after(&config, Duration::days(config.stale_after_days))
    }
}

impl TryFrom<&ScoringConfig> for ScoringWeights {
    type Error = ConfigError;

    /// Fails when `stale_after_days` is outside `1..=MAX_STALE_AFTER_DAYS`.
    fn try_from(config: &ScoringConfig) -> Result<Self, Self::Error> {
        let days = config.stale_after_days;
        let stale_after = Some(days)
            .filter(|d| (1..=MAX_STALE_AFTER_DAYS).contains(d))
            .and_then(Duration::try_days)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "scoring.stale_after_days must be between 1 and {MAX_STALE_AFTER_DAYS} (got {days})"
                ))
            })?;
        Ok(Self::with_stale_after(config, stale_after))
    }
}

impl ScoringWeights {
    fn with_stale_after(config: &ScoringConfig, stale_after: Duration) -> Self {
        Self {
            priority: config.priority_weight,
            similarity: config.similarity_weight,
            fallback: config.fallback_weight,
            effectiveness: config.effectiveness_weight,
            default_effectiveness: config.default_effectiveness,
            usage: config.usage_weight,
            usage_saturation: config.usage_saturation.max(1),
            auto_include_bonus: config.auto_include_bonus,
            stale_after,
            stale_penalty: config.stale_penalty,
        }
    }
}

/// A fragment paired with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f64,
}

impl ScoredFragment {
    pub fn new(fragment: Fragment, score: f64) -> Self {
        Self { fragment, score }
    }

    /// Token cost of the fragment.
    pub fn tokens(&self) -> usize {
        self.fragment.tokens()
    }
}

/// Scores fragments against an optional prompt embedding.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one fragment. Staleness is judged relative to `as_of`.
    pub fn score(
        &self,
        fragment: &Fragment,
        prompt_embedding: Option<&[f32]>,
        effectiveness: Option<&Effectiveness>,
        as_of: DateTime<Utc>,
    ) -> f64 {
        let w = &self.weights;
        let priority = f64::from(fragment.priority) / 10.0;

        let mut score = w.priority * priority;

        score += match (prompt_embedding, fragment.embedding.as_deref()) {
            (Some(prompt), Some(own)) => w.similarity * cosine_similarity(prompt, own),
            _ => w.fallback * priority,
        };

        score += match effectiveness {
            Some(e) => w.effectiveness * (0.5 * (e.avg_rating / 5.0) + 0.5 * e.success_rate),
            None => w.default_effectiveness,
        };

        let usage = (fragment.usage_count as f64 / w.usage_saturation as f64).min(1.0);
        score += w.usage * usage;

        if fragment.auto_include {
            score += w.auto_include_bonus;
        }

        if let Some(last_used) = fragment.last_used_at
            && as_of - last_used > w.stale_after
        {
            score *= w.stale_penalty;
        }

        score.clamp(0.0, 1.0)
    }

    /// Score every fragment, keeping input order.
    pub fn score_all<'a>(
        &self,
        fragments: impl IntoIterator<Item = &'a Fragment>,
        prompt_embedding: Option<&[f32]>,
        effectiveness: &HashMap<String, Effectiveness>,
        as_of: DateTime<Utc>,
    ) -> Vec<ScoredFragment> {
        fragments
            .into_iter()
            .map(|f| {
                let score = self.score(f, prompt_embedding, effectiveness.get(&f.id), as_of);
                ScoredFragment::new(f.clone(), score)
            })
            .collect()
    }
}
