//! Context composition: pick fragments for a budget and render them.
//!
//! Two strategies:
//!
//! - **Priority**: highest priority first (ties keep candidate order),
//!   skipping any fragment that would overflow the budget.
//! - **Optimal**: score every candidate, then solve the knapsack. The
//!   chosen fragments keep their candidate order.
//!
//! Both render with the same header/separator format as the assembler.

use std::collections::HashMap;

use contexture_config::{AssemblyConfig, ConfigError, EngineConfig, SelectionStrategy};
use contexture_core::{Effectiveness, FragmentIndex, ValidationError, estimate_tokens};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::render;
use crate::diagnostics::Diagnostic;
use crate::selection::{
    RelevanceScorer, ScoredFragment, ScoringWeights, SelectionResult, optimize, validate_budget,
};

/// What a composition is asked to fit and score against.
#[derive(Debug, Clone, Default)]
pub struct ComposeRequest {
    pub max_tokens: usize,
    pub prompt_embedding: Option<Vec<f32>>,
    pub effectiveness: HashMap<String, Effectiveness>,
}

impl ComposeRequest {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    pub fn with_prompt_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.prompt_embedding = Some(embedding);
        self
    }

    pub fn with_effectiveness(mut self, effectiveness: HashMap<String, Effectiveness>) -> Self {
        self.effectiveness = effectiveness;
        self
    }
}

/// Rendered context plus the selection behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedContext {
    pub text: String,
    pub strategy: SelectionStrategy,
    pub selection: SelectionResult,
    /// Estimated tokens of `text`, headers and separators included.
    pub rendered_tokens: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ContextComposer {
    scorer: RelevanceScorer,
    separator: String,
    include_headers: bool,
}

impl Default for ContextComposer {
    fn default() -> Self {
        let assembly = AssemblyConfig::default();
        Self::new(
            RelevanceScorer::default(),
            assembly.separator,
            assembly.include_headers,
        )
    }
}

impl ContextComposer {
    pub fn new(scorer: RelevanceScorer, separator: impl Into<String>, include_headers: bool) -> Self {
        Self {
            scorer,
            separator: separator.into(),
            include_headers,
        }
    }

    /// Scoring weights from `[scoring]`, rendering from `[assembly]`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            RelevanceScorer::new(ScoringWeights::try_from(&config.scoring)?),
            config.assembly.separator.clone(),
            config.assembly.include_headers,
        ))
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    /// Select from every fragment in `candidates` and render the result.
    pub fn compose(
        &self,
        strategy: SelectionStrategy,
        candidates: &FragmentIndex,
        request: &ComposeRequest,
    ) -> Result<ComposedContext, ValidationError> {
        validate_budget(request.max_tokens)?;

        let scored = self.scorer.score_all(
            candidates.iter(),
            request.prompt_embedding.as_deref(),
            &request.effectiveness,
            candidates.as_of(),
        );

        let (selection, diagnostics) = match strategy {
            SelectionStrategy::Priority => priority_fill(scored, request.max_tokens),
            SelectionStrategy::Optimal => {
                let diagnostics = scored
                    .iter()
                    .filter(|s| s.tokens() > request.max_tokens)
                    .map(|s| overflow(s, 0, request.max_tokens))
                    .collect();
                (optimize(scored, request.max_tokens)?, diagnostics)
            }
        };

        let text = render::render_fragments(
            selection.selected.iter().map(|s| &s.fragment),
            &self.separator,
            self.include_headers,
        );
        let rendered_tokens = estimate_tokens(&text);

        info!(
            strategy = %strategy,
            candidates = candidates.len(),
            selected = selection.selected.len(),
            tokens = selection.total_tokens,
            budget = request.max_tokens,
            "Composed context"
        );

        Ok(ComposedContext {
            text,
            strategy,
            selection,
            rendered_tokens,
            diagnostics,
        })
    }
}

/// Greedy fill by descending priority.
fn priority_fill(
    mut scored: Vec<ScoredFragment>,
    max_tokens: usize,
) -> (SelectionResult, Vec<Diagnostic>) {
    scored.sort_by(|a, b| b.fragment.priority.cmp(&a.fragment.priority));

    let mut used = 0usize;
    let mut selected = Vec::new();
    let mut diagnostics = Vec::new();

    for candidate in scored {
        let tokens = candidate.tokens();
        if used + tokens > max_tokens {
            debug!(fragment = %candidate.fragment.id, tokens, used, "Skipping, would overflow budget");
            diagnostics.push(overflow(&candidate, used, max_tokens));
            continue;
        }
        used += tokens;
        selected.push(candidate);
    }

    (SelectionResult::from_selected(selected, max_tokens), diagnostics)
}

fn overflow(candidate: &ScoredFragment, used: usize, budget: usize) -> Diagnostic {
    Diagnostic::BudgetOverflow {
        fragment_id: candidate.fragment.id.clone(),
        required: false,
        tokens: candidate.tokens(),
        used,
        budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contexture_core::{Fragment, LayerType};

    fn frag(id: &str, tokens: usize, priority: u8) -> Fragment {
        Fragment::new(id, LayerType::Snippet, format!("content of {id}"))
            .with_token_count(tokens)
            .with_priority(priority)
    }

    fn index(fragments: Vec<Fragment>) -> FragmentIndex {
        FragmentIndex::new(fragments, Utc::now()).unwrap()
    }

    fn scenario_a() -> FragmentIndex {
        index(vec![frag("A", 100, 9), frag("B", 50, 5), frag("C", 7000, 3)])
    }

    #[test]
    fn optimal_selects_a_and_b_under_5000() {
        let composed = ContextComposer::default()
            .compose(SelectionStrategy::Optimal, &scenario_a(), &ComposeRequest::new(5000))
            .unwrap();
        assert_eq!(composed.selection.ids(), vec!["A", "B"]);
        assert_eq!(composed.selection.total_tokens, 150);
        assert_eq!(composed.selection.unused_tokens, 4850);
        assert!(matches!(
            composed.diagnostics.as_slice(),
            [Diagnostic::BudgetOverflow { fragment_id, .. }] if fragment_id == "C"
        ));
    }

    #[test]
    fn priority_fill_skips_overflow_and_continues() {
        let candidates = index(vec![
            frag("low", 10, 2),
            frag("big", 90, 9),
            frag("mid", 20, 5),
        ]);
        let composed = ContextComposer::default()
            .compose(SelectionStrategy::Priority, &candidates, &ComposeRequest::new(100))
            .unwrap();
        // big(90) fits, mid(20) overflows, low(10) still fits.
        assert_eq!(composed.selection.ids(), vec!["big", "low"]);
        assert_eq!(composed.selection.total_tokens, 100);
        assert_eq!(composed.diagnostics.len(), 1);
    }

    #[test]
    fn priority_ties_keep_candidate_order() {
        let candidates = index(vec![frag("first", 1, 5), frag("second", 1, 5)]);
        let composed = ContextComposer::default()
            .compose(SelectionStrategy::Priority, &candidates, &ComposeRequest::new(10))
            .unwrap();
        assert_eq!(composed.selection.ids(), vec!["first", "second"]);
    }

    #[test]
    fn renders_with_headers_and_separator() {
        let candidates = index(vec![
            Fragment::new("p", LayerType::Profile, "I write Rust").with_name("Me"),
            Fragment::new("t", LayerType::Task, "Fix the parser"),
        ]);
        let composed = ContextComposer::default()
            .compose(SelectionStrategy::Priority, &candidates, &ComposeRequest::new(100))
            .unwrap();
        assert_eq!(
            composed.text,
            "[profile: Me]\nI write Rust\n\n[task: t]\nFix the parser"
        );
        assert_eq!(composed.rendered_tokens, estimate_tokens(&composed.text));
    }

    #[test]
    fn prompt_embedding_steers_optimal_choice() {
        let candidates = index(vec![
            frag("off_topic", 10, 5).with_embedding(vec![0.0, 1.0]),
            frag("on_topic", 10, 5).with_embedding(vec![1.0, 0.0]),
        ]);
        let request = ComposeRequest::new(10).with_prompt_embedding(vec![1.0, 0.0]);
        let composed = ContextComposer::default()
            .compose(SelectionStrategy::Optimal, &candidates, &request)
            .unwrap();
        assert_eq!(composed.selection.ids(), vec!["on_topic"]);
    }

    #[test]
    fn zero_budget_rejected() {
        let err = ContextComposer::default()
            .compose(SelectionStrategy::Priority, &scenario_a(), &ComposeRequest::new(0))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidBudget(0));
    }

    #[test]
    fn from_config_rejects_bad_stale_window() {
        let mut config = EngineConfig::default();
        assert!(ContextComposer::from_config(&config).is_ok());

        config.scoring.stale_after_days = i64::MAX;
        assert!(matches!(
            ContextComposer::from_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
