//! Dependency resolution and ordering over relationship edges.

pub mod ordering;
pub mod resolver;

pub use ordering::{Ordering, dependency_order};
pub use resolver::{Conflict, DependencyResolver, ResolutionResult, ResolveOptions};
