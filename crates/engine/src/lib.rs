//! The context engine: the heart of contexture.
//!
//! Turns a graph of small, user-authored fragments into one coherent
//! context block:
//!
//! 1. **Assemble** a composition tree into text, depth-first ([`HierarchicalAssembler`])
//! 2. **Resolve** what a seed set transitively needs ([`DependencyResolver`])
//! 3. **Order** the result so prerequisites come first ([`dependency_order`])
//! 4. **Score** fragments for relevance to a prompt ([`RelevanceScorer`])
//! 5. **Select** the best subset for a token budget ([`optimize`], [`ContextComposer`])
//!
//! Every operation is pure and synchronous over inputs already in memory.
//! Structural problems in the graphs (cycles, dangling edges, overflow)
//! degrade the output and are reported as [`Diagnostic`]s; only malformed
//! input is an error.

pub mod context;
pub mod dependency;
pub mod diagnostics;
pub mod selection;

pub use context::{
    Assembly, AssemblyOptions, ComposeRequest, ComposedContext, ContextComposer,
    HierarchicalAssembler,
};
pub use contexture_config::SelectionStrategy;
pub use dependency::{
    Conflict, DependencyResolver, Ordering, ResolutionResult, ResolveOptions, dependency_order,
};
pub use diagnostics::Diagnostic;
pub use selection::{
    MAX_OPTIMIZER_CELLS, MAX_OPTIMIZER_TOKENS, RelevanceScorer, ScoredFragment, ScoringWeights,
    SelectionResult, cosine_similarity, optimize,
};
