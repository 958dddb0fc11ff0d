//! Composition and relationship graphs between fragments.
//!
//! Two independent edge sets connect fragments:
//!
//! | Graph | Edge | Used by |
//! |-------|------|---------|
//! | Composition | parent → child, ordered, required/optional | hierarchical assembly |
//! | Relationship | source → target, typed | dependency resolution, ordering |
//!
//! Both indexes validate their edges on construction and are read-only
//! afterwards.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Composition ───────────────────────────────────────────────────────────

/// A structural parent → child edge in a composition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionEdge {
    pub parent_id: String,
    pub child_id: String,
    /// Deterministic sibling ordering, ascending
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

fn default_true() -> bool {
    true
}

impl CompositionEdge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, order: i32) -> Self {
        Self {
            parent_id: parent.into(),
            child_id: child.into(),
            order,
            is_required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }
}

/// Children per parent, sorted by `order` (ties keep supply order).
#[derive(Debug, Clone, Default)]
pub struct CompositionGraph {
    children: HashMap<String, Vec<CompositionEdge>>,
}

impl CompositionGraph {
    pub fn new(edges: impl IntoIterator<Item = CompositionEdge>) -> Result<Self, ValidationError> {
        let mut children: HashMap<String, Vec<CompositionEdge>> = HashMap::new();
        let mut pairs: HashSet<(String, String)> = HashSet::new();

        for edge in edges {
            if !pairs.insert((edge.parent_id.clone(), edge.child_id.clone())) {
                return Err(ValidationError::DuplicateCompositionEdge {
                    parent: edge.parent_id,
                    child: edge.child_id,
                });
            }
            children.entry(edge.parent_id.clone()).or_default().push(edge);
        }

        for list in children.values_mut() {
            list.sort_by_key(|e| e.order);
        }

        Ok(Self { children })
    }

    /// Ordered child edges of `parent_id` (empty for leaves).
    pub fn children(&self, parent_id: &str) -> &[CompositionEdge] {
        self.children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }
}

// ── Relationships ─────────────────────────────────────────────────────────

/// The semantic kind of a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelationshipType {
    /// Source cannot be used without target
    Requires,
    /// Source builds on target
    Extends,
    /// Source and target should not be used together
    Conflicts,
    /// Target is a useful companion (weighted by `strength`)
    Recommends,
    Uses,
    Replaces,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::Extends => "extends",
            Self::Conflicts => "conflicts",
            Self::Recommends => "recommends",
            Self::Uses => "uses",
            Self::Replaces => "replaces",
        }
    }

    /// Whether the target must precede the source in dependency order.
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Requires | Self::Extends)
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requires" => Ok(Self::Requires),
            "extends" => Ok(Self::Extends),
            "conflicts" => Ok(Self::Conflicts),
            "recommends" => Ok(Self::Recommends),
            "uses" => Ok(Self::Uses),
            "replaces" => Ok(Self::Replaces),
            other => Err(ValidationError::UnknownRelationshipType(other.to_string())),
        }
    }
}

impl TryFrom<String> for RelationshipType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelationshipType> for String {
    fn from(value: RelationshipType) -> Self {
        value.as_str().to_string()
    }
}

/// A directed, typed edge. Traversal always follows source → target;
/// `bidirectional` is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    /// 0.0–1.0, meaningful for `recommends`
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default)]
    pub bidirectional: bool,
}

fn default_strength() -> f64 {
    0.5
}

impl RelationshipEdge {
    pub fn new(
        source: impl Into<String>,
        relationship_type: RelationshipType,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source.into(),
            target_id: target.into(),
            relationship_type,
            strength: default_strength(),
            bidirectional: false,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }
}

/// Outgoing relationship edges per source fragment.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: Vec<RelationshipEdge>,
    outgoing: HashMap<String, Vec<usize>>,
}

impl RelationshipGraph {
    pub fn new(edges: impl IntoIterator<Item = RelationshipEdge>) -> Result<Self, ValidationError> {
        let mut graph = Self::default();
        for edge in edges {
            if !(0.0..=1.0).contains(&edge.strength) {
                return Err(ValidationError::InvalidStrength {
                    source_id: edge.source_id,
                    target_id: edge.target_id,
                    strength: edge.strength,
                });
            }
            graph
                .outgoing
                .entry(edge.source_id.clone())
                .or_default()
                .push(graph.edges.len());
            graph.edges.push(edge);
        }
        Ok(graph)
    }

    /// Outgoing edges of `source_id`, in supply order.
    pub fn outgoing<'a>(
        &'a self,
        source_id: &str,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + use<'a> {
        self.outgoing
            .get(source_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// Outgoing edges of `source_id` with the given type.
    pub fn outgoing_of<'a>(
        &'a self,
        source_id: &str,
        relationship_type: RelationshipType,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + use<'a> {
        self.outgoing(source_id)
            .filter(move |e| e.relationship_type == relationship_type)
    }

    /// All edges, in supply order.
    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
