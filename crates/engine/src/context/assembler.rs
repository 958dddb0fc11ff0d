//! Hierarchical assembly: flattens a composition tree into one text block.
//!
//! Starting at a root fragment, children are expanded depth-first in
//! `order`, each rendered as an optional header plus its own assembled
//! subtree, and joined with a separator.
//!
//! # Degradation
//!
//! Assembly never fails on graph structure:
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | Fragment reached again along its own ancestry | rendered unexpanded |
//! | `depth >= max_depth` | rendered unexpanded |
//! | Child block plus its separator would exceed `max_tokens` | child skipped, even if required |
//! | Edge to deleted/expired/unknown fragment | child skipped |
//!
//! The visited set is copied per branch, so a fragment shared by two
//! sibling subtrees (diamond reuse) is expanded in both.

use std::collections::HashSet;

use contexture_config::AssemblyConfig;
use contexture_core::{
    CompositionGraph, Fragment, FragmentIndex, ValidationError, estimate_tokens, tokens_for_len,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::render;
use crate::diagnostics::Diagnostic;

// ── Types ─────────────────────────────────────────────────────────────────

/// Assembly options.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Levels below the root that may be expanded.
    pub max_depth: usize,
    /// Token budget for the assembled text of each subtree, separators
    /// included. Only a root whose own content is larger can exceed it.
    pub max_tokens: usize,
    /// Whether non-required children are expanded.
    pub include_optional: bool,
    /// Joins the root content and each child block.
    pub separator: String,
    /// Prefix each child block with a `[layer: name]` line.
    pub include_headers: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self::from(&AssemblyConfig::default())
    }
}

impl From<&AssemblyConfig> for AssemblyOptions {
    fn from(config: &AssemblyConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_tokens: config.max_tokens,
            include_optional: config.include_optional,
            separator: config.separator.clone(),
            include_headers: config.include_headers,
        }
    }
}

/// The assembled text plus what was degraded along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assembly {
    pub root_id: String,
    pub text: String,
    /// Estimated tokens of `text`.
    pub tokens: usize,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The hierarchical assembler. Stateless; create one and reuse it.
pub struct HierarchicalAssembler {
    options: AssemblyOptions,
}

impl HierarchicalAssembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Assemble the composition subtree rooted at `root_id`.
    ///
    /// Fails only on malformed input: a zero budget or a root that is not a
    /// visible fragment.
    pub fn assemble(
        &self,
        root_id: &str,
        fragments: &FragmentIndex,
        composition: &CompositionGraph,
    ) -> Result<Assembly, ValidationError> {
        if self.options.max_tokens == 0 {
            return Err(ValidationError::InvalidBudget(0));
        }
        let root = fragments.require(root_id)?;

        let mut walk = Walk {
            options: &self.options,
            fragments,
            composition,
            diagnostics: Vec::new(),
        };
        let text = walk.expand(root, 0, &HashSet::new());
        let tokens = estimate_tokens(&text);

        debug!(
            root = root_id,
            tokens,
            degraded = walk.diagnostics.len(),
            "Assembled composition tree"
        );

        Ok(Assembly {
            root_id: root_id.to_string(),
            text,
            tokens,
            diagnostics: walk.diagnostics,
        })
    }
}

/// Per-call traversal state.
struct Walk<'a> {
    options: &'a AssemblyOptions,
    fragments: &'a FragmentIndex,
    composition: &'a CompositionGraph,
    diagnostics: Vec<Diagnostic>,
}

impl Walk<'_> {
    fn expand(&mut self, node: &Fragment, depth: usize, visited: &HashSet<String>) -> String {
        let children = self.composition.children(&node.id);

        if visited.contains(&node.id) {
            debug!(fragment = %node.id, depth, "Composition cycle, rendering unexpanded");
            self.diagnostics.push(Diagnostic::CycleTruncated {
                fragment_id: node.id.clone(),
                depth,
            });
            return node.content.clone();
        }

        if depth >= self.options.max_depth {
            if !children.is_empty() {
                debug!(fragment = %node.id, depth, "Depth limit reached, rendering unexpanded");
                self.diagnostics.push(Diagnostic::DepthLimitReached {
                    fragment_id: node.id.clone(),
                    depth,
                });
            }
            return node.content.clone();
        }

        // Copy-on-recurse: siblings never see each other's descendants.
        let mut visited = visited.clone();
        visited.insert(node.id.clone());

        let separator = self.options.separator.as_str();
        let mut text = node.content.clone();

        for edge in children {
            if !self.options.include_optional && !edge.is_required {
                continue;
            }

            let Some(child) = self.fragments.get(&edge.child_id) else {
                debug!(parent = %node.id, child = %edge.child_id, "Skipping missing child");
                self.diagnostics.push(Diagnostic::MissingFragment {
                    fragment_id: edge.child_id.clone(),
                    referenced_by: node.id.clone(),
                });
                continue;
            };

            let body = self.expand(child, depth + 1, &visited);
            let block = render::render_block(child, &body, self.options.include_headers);

            // Price the block on the joined text, separator included.
            let used = tokens_for_len(text.len());
            let joined = tokens_for_len(text.len() + separator.len() + block.len());
            let tokens = joined - used;

            if joined > self.options.max_tokens {
                warn!(
                    parent = %node.id,
                    child = %child.id,
                    required = edge.is_required,
                    tokens,
                    used,
                    budget = self.options.max_tokens,
                    "Child exceeds token budget, skipping"
                );
                self.diagnostics.push(Diagnostic::BudgetOverflow {
                    fragment_id: child.id.clone(),
                    required: edge.is_required,
                    tokens,
                    used,
                    budget: self.options.max_tokens,
                });
                continue;
            }

            text.push_str(separator);
            text.push_str(&block);
        }

        text
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
