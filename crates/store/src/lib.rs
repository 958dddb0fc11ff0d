//! Fragment storage and the context service for contexture.

pub mod in_memory;
pub mod service;
pub mod snapshot;

pub use in_memory::InMemoryStore;
pub use service::{ContextService, ResolvedContext};
pub use snapshot::Snapshot;
