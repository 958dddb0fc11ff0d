//! Context building: hierarchical assembly and budgeted composition.
//!
//! | Entry point | Input | Output |
//! |-------------|-------|--------|
//! | [`HierarchicalAssembler`] | root id + composition tree | one text block |
//! | [`ContextComposer`] | flat candidate set + budget | selected, rendered fragments |

pub mod assembler;
pub mod composer;
pub mod render;

pub use assembler::{Assembly, AssemblyOptions, HierarchicalAssembler};
pub use composer::{ComposeRequest, ComposedContext, ContextComposer};
