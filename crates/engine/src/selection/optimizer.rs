//! Budget optimizer: score-optimal fragment selection under a token budget.
//!
//! A 0/1 knapsack over token cost. The table is kept as a single row of
//! best scores per capacity plus a `keep` bit per (candidate, capacity),
//! which is enough to backtrack the chosen subset. Capacity never exceeds
//! the combined cost of the candidates, and the bit table is capped at
//! [`MAX_OPTIMIZER_CELLS`].

use contexture_core::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::selection::scorer::ScoredFragment;

/// Upper bound on the capacity the optimizer accepts.
pub const MAX_OPTIMIZER_TOKENS: usize = 1_000_000;

/// Upper bound on `candidates × (capacity + 1)`, one bit each (128 MiB).
pub const MAX_OPTIMIZER_CELLS: usize = 1 << 30;

/// The chosen fragments, in their original relative order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<ScoredFragment>,
    pub total_score: f64,
    pub total_tokens: usize,
    pub unused_tokens: usize,
}

impl SelectionResult {
    pub(crate) fn from_selected(selected: Vec<ScoredFragment>, max_tokens: usize) -> Self {
        let total_score = selected.iter().map(|s| s.score).sum();
        let total_tokens: usize = selected.iter().map(ScoredFragment::tokens).sum();
        Self {
            selected,
            total_score,
            total_tokens,
            unused_tokens: max_tokens.saturating_sub(total_tokens),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.fragment.id.as_str()).collect()
    }
}

/// Check a token budget before allocating anything for it.
pub fn validate_budget(max_tokens: usize) -> Result<(), ValidationError> {
    if max_tokens == 0 {
        return Err(ValidationError::InvalidBudget(max_tokens));
    }
    if max_tokens > MAX_OPTIMIZER_TOKENS {
        return Err(ValidationError::BudgetTooLarge {
            budget: max_tokens,
            limit: MAX_OPTIMIZER_TOKENS,
        });
    }
    Ok(())
}

/// Select the subset of `candidates` with the highest total score whose
/// total token cost fits in `max_tokens`.
pub fn optimize(
    candidates: Vec<ScoredFragment>,
    max_tokens: usize,
) -> Result<SelectionResult, ValidationError> {
    validate_budget(max_tokens)?;

    let total = candidates.len();
    let items: Vec<ScoredFragment> = candidates
        .into_iter()
        .filter(|c| c.tokens() <= max_tokens)
        .collect();
    if items.len() < total {
        debug!(
            dropped = total - items.len(),
            max_tokens, "Candidates larger than the whole budget"
        );
    }

    let combined: usize = items.iter().map(ScoredFragment::tokens).sum();
    let capacity = combined.min(max_tokens);
    let width = capacity + 1;
    if items.len().saturating_mul(width) > MAX_OPTIMIZER_CELLS {
        return Err(ValidationError::SelectionTooLarge {
            candidates: items.len(),
            capacity,
            limit: MAX_OPTIMIZER_CELLS,
        });
    }

    let mut best = vec![0.0f64; width];
    let mut keep = KeepTable::new(items.len() * width);

    for (i, item) in items.iter().enumerate() {
        let cost = item.tokens();
        for t in (cost..=capacity).rev() {
            let with = best[t - cost] + item.score;
            if with > best[t] {
                best[t] = with;
                keep.set(i * width + t);
            }
        }
    }

    let mut chosen = Vec::new();
    let mut t = capacity;
    for i in (0..items.len()).rev() {
        if keep.get(i * width + t) {
            chosen.push(i);
            t -= items[i].tokens();
        }
    }
    chosen.reverse();

    let mut slots: Vec<Option<ScoredFragment>> = items.into_iter().map(Some).collect();
    let selected: Vec<ScoredFragment> = chosen
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    let result = SelectionResult::from_selected(selected, max_tokens);
    debug!(
        candidates = total,
        selected = result.selected.len(),
        tokens = result.total_tokens,
        score = result.total_score,
        "Optimized selection"
    );
    Ok(result)
}

/// One bit per (candidate, capacity) cell.
struct KeepTable(Vec<u64>);

impl KeepTable {
    fn new(cells: usize) -> Self {
        Self(vec![0; cells.div_ceil(64)])
    }

    fn set(&mut self, cell: usize) {
        self.0[cell / 64] |= 1 << (cell % 64);
    }

    fn get(&self, cell: usize) -> bool {
        self.0[cell / 64] & (1 << (cell % 64)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contexture_core::{Fragment, LayerType};

    fn item(id: &str, tokens: usize, score: f64) -> ScoredFragment {
        ScoredFragment::new(
            Fragment::new(id, LayerType::Snippet, "x").with_token_count(tokens),
            score,
        )
    }

    #[test]
    fn picks_best_subset_not_greedy() {
        // Greedy by score takes `a` (0.9) and stops; {b, c} is worth more.
        let result = optimize(
            vec![item("a", 10, 0.9), item("b", 5, 0.6), item("c", 5, 0.6)],
            10,
        )
        .unwrap();
        assert_eq!(result.ids(), vec!["b", "c"]);
        assert!((result.total_score - 1.2).abs() < 1e-9);
        assert_eq!(result.total_tokens, 10);
        assert_eq!(result.unused_tokens, 0);
    }

    #[test]
    fn keeps_original_relative_order() {
        let result = optimize(
            vec![item("z", 1, 0.1), item("y", 1, 0.2), item("x", 1, 0.3)],
            100,
        )
        .unwrap();
        assert_eq!(result.ids(), vec!["z", "y", "x"]);
        assert_eq!(result.unused_tokens, 97);
    }

    #[test]
    fn oversized_candidate_never_selected() {
        let result = optimize(vec![item("huge", 7000, 1.0), item("ok", 100, 0.1)], 5000).unwrap();
        assert_eq!(result.ids(), vec!["ok"]);
    }

    #[test]
    fn large_item_wins_when_it_fits_and_outscores() {
        // A(100, high) + B(50, mid) + C(4000, low) all fit within 5000.
        let result = optimize(
            vec![item("A", 100, 0.8), item("B", 50, 0.5), item("C", 4000, 0.3)],
            5000,
        )
        .unwrap();
        assert_eq!(result.ids(), vec!["A", "B", "C"]);
        assert_eq!(result.total_tokens, 4150);
    }

    #[test]
    fn empty_candidates_give_empty_selection() {
        let result = optimize(vec![], 10).unwrap();
        assert!(result.selected.is_empty());
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.unused_tokens, 10);
    }

    #[test]
    fn zero_budget_rejected() {
        assert_eq!(
            optimize(vec![item("a", 1, 0.5)], 0).unwrap_err(),
            ValidationError::InvalidBudget(0)
        );
    }

    #[test]
    fn oversized_budget_rejected() {
        assert!(matches!(
            optimize(vec![], MAX_OPTIMIZER_TOKENS + 1),
            Err(ValidationError::BudgetTooLarge { .. })
        ));
    }

    #[test]
    fn capacity_shrinks_to_combined_cost() {
        // 3 000 candidates at the full budget would need 3e9 cells; their
        // combined cost is only 3 000 tokens.
        let candidates: Vec<ScoredFragment> = (0..3_000)
            .map(|i| item(&format!("f{i}"), 1, 0.1))
            .collect();
        let result = optimize(candidates, MAX_OPTIMIZER_TOKENS).unwrap();
        assert_eq!(result.selected.len(), 3_000);
        assert_eq!(result.unused_tokens, MAX_OPTIMIZER_TOKENS - 3_000);
    }

    #[test]
    fn oversized_table_rejected_before_allocating() {
        let candidates: Vec<ScoredFragment> = (0..2_000)
            .map(|i| item(&format!("f{i}"), 1_000, 0.1))
            .collect();
        assert!(matches!(
            optimize(candidates, MAX_OPTIMIZER_TOKENS),
            Err(ValidationError::SelectionTooLarge {
                candidates: 2_000,
                capacity: MAX_OPTIMIZER_TOKENS,
                ..
            })
        ));
    }
}
