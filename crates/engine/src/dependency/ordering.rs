//! Dependency ordering: prerequisites before the fragments that need them.
//!
//! Kahn's algorithm over the `requires`/`extends` edges among the given ids.
//! For `source requires target`, `target` is placed first. Ready nodes are
//! released in input order, so the result is deterministic. A cycle keeps
//! the input order and records an [`Diagnostic::OrderFallback`].

use std::collections::{HashMap, HashSet, VecDeque};

use contexture_core::RelationshipGraph;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::Diagnostic;

/// An ordered id sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub ids: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Order `ids` so that every prerequisite precedes its dependents.
///
/// Duplicate ids are collapsed to their first occurrence.
pub fn dependency_order(ids: &[String], relationships: &RelationshipGraph) -> Ordering {
    let mut nodes: Vec<&str> = Vec::with_capacity(ids.len());
    let mut position: HashMap<&str, usize> = HashMap::new();
    for id in ids {
        if !position.contains_key(id.as_str()) {
            position.insert(id.as_str(), nodes.len());
            nodes.push(id.as_str());
        }
    }

    // dependents[target] = sources that must wait for target
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    let mut seen: HashSet<(usize, usize)> = HashSet::new();

    for (src, &id) in nodes.iter().enumerate() {
        for edge in relationships.outgoing(id) {
            if !edge.relationship_type.is_dependency() {
                continue;
            }
            let Some(&dst) = position.get(edge.target_id.as_str()) else {
                continue;
            };
            if seen.insert((src, dst)) {
                dependents[dst].push(src);
                in_degree[src] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut sorted = Vec::with_capacity(nodes.len());

    while let Some(node) = queue.pop_front() {
        sorted.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if sorted.len() < nodes.len() {
        warn!(
            ordered = sorted.len(),
            expected = nodes.len(),
            "Dependency cycle detected, keeping input order"
        );
        return Ordering {
            ids: nodes.iter().map(|s| s.to_string()).collect(),
            diagnostics: vec![Diagnostic::OrderFallback {
                ordered: sorted.len(),
                expected: nodes.len(),
            }],
        };
    }

    Ordering {
        ids: sorted.into_iter().map(|i| nodes[i].to_string()).collect(),
        diagnostics: Vec::new(),
    }
}
