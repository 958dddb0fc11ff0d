//! Diagnostics for graceful degradation.
//!
//! Fragment graphs are user-authored, so cycles, dangling references, and
//! budget overflow are expected. None of them fail a request: the engine
//! degrades locally and records what it did here, alongside the result.

use serde::{Deserialize, Serialize};

/// A single degradation recorded during an engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A fragment was reached again along its own ancestry; rendered unexpanded.
    CycleTruncated { fragment_id: String, depth: usize },

    /// Expansion stopped at the depth limit; the fragment was rendered unexpanded.
    DepthLimitReached { fragment_id: String, depth: usize },

    /// A child block was skipped because it would overflow the token budget.
    BudgetOverflow {
        fragment_id: String,
        required: bool,
        tokens: usize,
        used: usize,
        budget: usize,
    },

    /// An edge pointed at a fragment that is unknown, deleted, or expired.
    MissingFragment {
        fragment_id: String,
        referenced_by: String,
    },

    /// Resolution hit its depth limit with ids still waiting to be expanded.
    ResolutionTruncated { depth: usize, pending: usize },

    /// Dependency ordering found a cycle and kept the input order.
    OrderFallback { ordered: usize, expected: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleTruncated { fragment_id, depth } => {
                write!(f, "cycle at {fragment_id} (depth {depth}), rendered unexpanded")
            }
            Self::DepthLimitReached { fragment_id, depth } => {
                write!(f, "depth limit {depth} reached at {fragment_id}")
            }
            Self::BudgetOverflow {
                fragment_id,
                required,
                tokens,
                used,
                budget,
            } => write!(
                f,
                "skipped {} {fragment_id} ({tokens} tokens, {used}/{budget} used)",
                if *required { "required" } else { "optional" }
            ),
            Self::MissingFragment {
                fragment_id,
                referenced_by,
            } => write!(f, "{referenced_by} references missing fragment {fragment_id}"),
            Self::ResolutionTruncated { depth, pending } => {
                write!(f, "resolution stopped at depth {depth} with {pending} ids unexpanded")
            }
            Self::OrderFallback { ordered, expected } => write!(
                f,
                "dependency cycle: ordered {ordered} of {expected}, kept input order"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let d = Diagnostic::OrderFallback {
            ordered: 1,
            expected: 3,
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains(r#""kind":"order_fallback""#));
    }

    #[test]
    fn budget_overflow_mentions_requiredness() {
        let d = Diagnostic::BudgetOverflow {
            fragment_id: "style-guide".into(),
            required: true,
            tokens: 900,
            used: 7500,
            budget: 8000,
        };
        let msg = d.to_string();
        assert!(msg.contains("required style-guide"));
        assert!(msg.contains("7500/8000"));
    }
}
