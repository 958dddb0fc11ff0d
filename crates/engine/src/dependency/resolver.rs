//! Dependency resolution: the transitive closure of what a seed set needs.
//!
//! Breadth-first over relationship edges, one level per round, for at most
//! `max_depth` rounds. `requires` and `extends` targets are always pulled
//! in; `recommends` targets only when enabled and strong enough.
//!
//! Conflicts are annotations, not removals: an id with a `conflicts` edge
//! to something already resolved is reported, stays resolved, and is not
//! expanded further in that round.

use std::collections::HashSet;

use contexture_config::ResolutionConfig;
use contexture_core::{
    FragmentIndex, RelationshipEdge, RelationshipGraph, RelationshipType, ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dependency::ordering::dependency_order;
use crate::diagnostics::Diagnostic;

/// Resolution options.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub max_depth: usize,
    pub include_recommendations: bool,
    pub min_recommendation_strength: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from(&ResolutionConfig::default())
    }
}

impl From<&ResolutionConfig> for ResolveOptions {
    fn from(config: &ResolutionConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            include_recommendations: config.include_recommendations,
            min_recommendation_strength: config.min_recommendation_strength,
        }
    }
}

/// A fragment that conflicts with fragments already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub fragment_id: String,
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Seeds first, then ids in the order they were reached.
    pub resolved: Vec<String>,
    pub conflicts: Vec<Conflict>,
    /// `resolved` in dependency order.
    pub order: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionResult {
    pub fn contains(&self, id: &str) -> bool {
        self.resolved.iter().any(|r| r == id)
    }
}

pub struct DependencyResolver {
    options: ResolveOptions,
}

impl DependencyResolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve `seeds` against the relationship graph, then order the result.
    ///
    /// Every seed must be a visible fragment.
    pub fn resolve(
        &self,
        seeds: &[String],
        fragments: &FragmentIndex,
        relationships: &RelationshipGraph,
    ) -> Result<ResolutionResult, ValidationError> {
        if seeds.is_empty() {
            return Err(ValidationError::EmptySeedSet);
        }
        for seed in seeds {
            fragments.require(seed)?;
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved: Vec<String> = Vec::new();
        for seed in seeds {
            if seen.insert(seed.clone()) {
                resolved.push(seed.clone());
            }
        }

        let mut conflicts = Vec::new();
        let mut diagnostics = Vec::new();
        let mut frontier = resolved.clone();
        let mut depth = 0;

        while !frontier.is_empty() && depth < self.options.max_depth {
            let mut next = Vec::new();

            for id in &frontier {
                let conflicting: Vec<String> = relationships
                    .outgoing_of(id, RelationshipType::Conflicts)
                    .filter(|e| seen.contains(&e.target_id))
                    .map(|e| e.target_id.clone())
                    .collect();
                if !conflicting.is_empty() {
                    info!(fragment = %id, with = ?conflicting, "Conflict detected, not expanding");
                    conflicts.push(Conflict {
                        fragment_id: id.clone(),
                        conflicts_with: conflicting,
                    });
                    continue;
                }

                for edge in relationships.outgoing(id).filter(|e| self.follows(e)) {
                    if seen.contains(&edge.target_id) {
                        continue;
                    }
                    if !fragments.contains(&edge.target_id) {
                        debug!(source = %id, target = %edge.target_id, "Skipping missing dependency");
                        diagnostics.push(Diagnostic::MissingFragment {
                            fragment_id: edge.target_id.clone(),
                            referenced_by: id.clone(),
                        });
                        continue;
                    }
                    seen.insert(edge.target_id.clone());
                    resolved.push(edge.target_id.clone());
                    next.push(edge.target_id.clone());
                }
            }

            frontier = next;
            depth += 1;
        }

        let pending = frontier
            .iter()
            .filter(|id| {
                relationships
                    .outgoing(id)
                    .any(|e| self.follows(e) && !seen.contains(&e.target_id))
            })
            .count();
        if pending > 0 {
            debug!(depth, pending, "Resolution stopped at depth limit");
            diagnostics.push(Diagnostic::ResolutionTruncated { depth, pending });
        }

        let ordering = dependency_order(&resolved, relationships);
        diagnostics.extend(ordering.diagnostics);

        debug!(
            seeds = seeds.len(),
            resolved = resolved.len(),
            conflicts = conflicts.len(),
            "Resolved dependencies"
        );

        Ok(ResolutionResult {
            resolved,
            conflicts,
            order: ordering.ids,
            diagnostics,
        })
    }

    /// Whether resolution pulls in the target of `edge`.
    fn follows(&self, edge: &RelationshipEdge) -> bool {
        match edge.relationship_type {
            RelationshipType::Requires | RelationshipType::Extends => true,
            RelationshipType::Recommends => {
                self.options.include_recommendations
                    && edge.strength >= self.options.min_recommendation_strength
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contexture_core::{Fragment, LayerType};

    fn index(ids: &[&str]) -> FragmentIndex {
        FragmentIndex::new(
            ids.iter().map(|id| Fragment::new(*id, LayerType::Snippet, *id)),
            Utc::now(),
        )
        .unwrap()
    }

    fn graph(edges: Vec<RelationshipEdge>) -> RelationshipGraph {
        RelationshipGraph::new(edges).unwrap()
    }

    fn seeds(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn resolve(
        options: ResolveOptions,
        seed_ids: &[&str],
        all: &[&str],
        edges: Vec<RelationshipEdge>,
    ) -> ResolutionResult {
        DependencyResolver::new(options)
            .resolve(&seeds(seed_ids), &index(all), &graph(edges))
            .unwrap()
    }

    #[test]
    fn follows_requires_transitively() {
        let result = resolve(
            ResolveOptions::default(),
            &["A"],
            &["A", "B", "C"],
            vec![
                RelationshipEdge::new("A", RelationshipType::Requires, "B"),
                RelationshipEdge::new("B", RelationshipType::Requires, "C"),
            ],
        );
        assert_eq!(result.resolved, seeds(&["A", "B", "C"]));
        assert_eq!(result.order, seeds(&["C", "B", "A"]));
        assert!(result.conflicts.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn conflict_annotated_not_removed() {
        // X requires Y, Y conflicts with Z; seeds X and Z.
        let result = resolve(
            ResolveOptions::default(),
            &["X", "Z"],
            &["X", "Y", "Z"],
            vec![
                RelationshipEdge::new("X", RelationshipType::Requires, "Y"),
                RelationshipEdge::new("Y", RelationshipType::Conflicts, "Z"),
            ],
        );
        assert_eq!(result.resolved, seeds(&["X", "Z", "Y"]));
        assert_eq!(
            result.conflicts,
            vec![Conflict {
                fragment_id: "Y".into(),
                conflicts_with: vec!["Z".into()],
            }]
        );
    }

    #[test]
    fn conflicting_id_not_expanded() {
        let result = resolve(
            ResolveOptions::default(),
            &["a", "b"],
            &["a", "b", "c"],
            vec![
                RelationshipEdge::new("a", RelationshipType::Conflicts, "b"),
                RelationshipEdge::new("a", RelationshipType::Requires, "c"),
            ],
        );
        assert!(result.contains("a"));
        assert!(!result.contains("c"));
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn recommendations_need_opt_in_and_strength() {
        let edges = || {
            vec![
                RelationshipEdge::new("a", RelationshipType::Recommends, "strong").with_strength(0.9),
                RelationshipEdge::new("a", RelationshipType::Recommends, "weak").with_strength(0.3),
            ]
        };
        let all = ["a", "strong", "weak"];

        let off = resolve(ResolveOptions::default(), &["a"], &all, edges());
        assert_eq!(off.resolved, seeds(&["a"]));

        let on = resolve(
            ResolveOptions {
                include_recommendations: true,
                ..ResolveOptions::default()
            },
            &["a"],
            &all,
            edges(),
        );
        assert_eq!(on.resolved, seeds(&["a", "strong"]));
    }

    #[test]
    fn uses_and_replaces_not_followed() {
        let result = resolve(
            ResolveOptions::default(),
            &["a"],
            &["a", "b", "c"],
            vec![
                RelationshipEdge::new("a", RelationshipType::Uses, "b"),
                RelationshipEdge::new("a", RelationshipType::Replaces, "c"),
            ],
        );
        assert_eq!(result.resolved, seeds(&["a"]));
    }

    #[test]
    fn depth_limit_truncates_with_diagnostic() {
        let result = resolve(
            ResolveOptions {
                max_depth: 1,
                ..ResolveOptions::default()
            },
            &["A"],
            &["A", "B", "C"],
            vec![
                RelationshipEdge::new("A", RelationshipType::Requires, "B"),
                RelationshipEdge::new("B", RelationshipType::Requires, "C"),
            ],
        );
        assert_eq!(result.resolved, seeds(&["A", "B"]));
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::ResolutionTruncated {
                depth: 1,
                pending: 1
            }]
        );
    }

    #[test]
    fn cycle_terminates_and_falls_back() {
        let result = resolve(
            ResolveOptions::default(),
            &["a"],
            &["a", "b"],
            vec![
                RelationshipEdge::new("a", RelationshipType::Requires, "b"),
                RelationshipEdge::new("b", RelationshipType::Requires, "a"),
            ],
        );
        assert_eq!(result.resolved, seeds(&["a", "b"]));
        assert_eq!(result.order, seeds(&["a", "b"]));
        assert!(matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::OrderFallback { .. }]
        ));
    }

    #[test]
    fn missing_target_skipped_with_diagnostic() {
        let result = resolve(
            ResolveOptions::default(),
            &["a"],
            &["a"],
            vec![RelationshipEdge::new("a", RelationshipType::Requires, "ghost")],
        );
        assert_eq!(result.resolved, seeds(&["a"]));
        assert!(matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::MissingFragment { fragment_id, .. }] if fragment_id == "ghost"
        ));
    }

    #[test]
    fn duplicate_seeds_collapsed() {
        let result = resolve(ResolveOptions::default(), &["a", "a"], &["a"], vec![]);
        assert_eq!(result.resolved, seeds(&["a"]));
    }

    #[test]
    fn empty_seeds_rejected() {
        let err = DependencyResolver::new(ResolveOptions::default())
            .resolve(&[], &index(&["a"]), &RelationshipGraph::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptySeedSet);
    }

    #[test]
    fn unknown_seed_rejected() {
        let err = DependencyResolver::new(ResolveOptions::default())
            .resolve(&seeds(&["nope"]), &index(&["a"]), &RelationshipGraph::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingFragment("nope".into()));
    }
}
