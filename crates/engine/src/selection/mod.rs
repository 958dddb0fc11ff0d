//! Relevance scoring and budgeted selection.

pub mod optimizer;
pub mod scorer;
pub mod similarity;

pub use optimizer::{
    MAX_OPTIMIZER_CELLS, MAX_OPTIMIZER_TOKENS, SelectionResult, optimize, validate_budget,
};
pub use scorer::{RelevanceScorer, ScoredFragment, ScoringWeights};
pub use similarity::cosine_similarity;
