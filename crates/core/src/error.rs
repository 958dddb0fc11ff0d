//! Error types for the contexture domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Only malformed input
//! and collaborator failures are errors; structural anomalies in fragment
//! graphs (cycles, budget overflow) are reported as diagnostics instead.

use thiserror::Error;

/// The top-level error type for all contexture operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Collaborator errors ---
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed input, rejected at the call boundary before any work is done.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Fragment not found or not visible: {0}")]
    MissingFragment(String),

    #[error("Seed set is empty")]
    EmptySeedSet,

    #[error("Token budget must be positive (got {0})")]
    InvalidBudget(usize),

    #[error("Token budget {budget} exceeds the optimizer limit of {limit}")]
    BudgetTooLarge { budget: usize, limit: usize },

    #[error(
        "Selection over {candidates} candidates at capacity {capacity} exceeds the optimizer limit of {limit} cells"
    )]
    SelectionTooLarge {
        candidates: usize,
        capacity: usize,
        limit: usize,
    },

    #[error("Duplicate fragment id: {0}")]
    DuplicateFragment(String),

    #[error("Duplicate composition edge: {parent} → {child}")]
    DuplicateCompositionEdge { parent: String, child: String },

    #[error("Priority for {id} must be between 1 and 10 (got {priority})")]
    InvalidPriority { id: String, priority: u8 },

    #[error("Average rating for {id} must be between 0 and 5 (got {rating})")]
    InvalidRating { id: String, rating: f64 },

    #[error("Success rate for {id} must be between 0 and 1 (got {rate})")]
    InvalidSuccessRate { id: String, rate: f64 },

    #[error("Strength of {source_id} → {target_id} must be between 0 and 1 (got {strength})")]
    InvalidStrength {
        source_id: String,
        target_id: String,
        strength: f64,
    },

    #[error("Unknown relationship type: {0}")]
    UnknownRelationshipType(String),
}

/// Failures reported by the external collaborators that feed the engine.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}
