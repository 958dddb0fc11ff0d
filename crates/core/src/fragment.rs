//! Context fragments: small, user-authored units of reusable context.
//!
//! A fragment is read-only to the engine. Soft-deleted fragments and expired
//! session fragments are invisible: [`FragmentIndex`] drops them on
//! construction so no engine operation ever sees them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::token::estimate_tokens;

/// The kind of context a fragment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Profile,
    Project,
    Task,
    Snippet,
    Session,
    Adhoc,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Profile => "profile",
            LayerType::Project => "project",
            LayerType::Task => "task",
            LayerType::Snippet => "snippet",
            LayerType::Session => "session",
            LayerType::Adhoc => "adhoc",
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single context fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique, opaque identifier
    pub id: String,

    /// Human-readable label used in rendered headers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The text content
    pub content: String,

    /// Supplied token count; estimated from `content` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,

    pub layer_type: LayerType,

    /// 1–10, higher is more important
    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default)]
    pub auto_include: bool,

    /// Fixed-length embedding vector (e.g. 384 or 1536 dims)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default)]
    pub usage_count: u64,

    /// 0.0–5.0
    #[serde(default)]
    pub avg_rating: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,

    /// Only meaningful for session fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

fn default_priority() -> u8 {
    5
}

impl Fragment {
    /// Create a fragment with default attributes (priority 5, no embedding).
    pub fn new(id: impl Into<String>, layer_type: LayerType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            content: content.into(),
            token_count: None,
            layer_type,
            priority: default_priority(),
            auto_include: false,
            embedding: None,
            usage_count: 0,
            avg_rating: 0.0,
            last_used_at: None,
            expires_at: None,
            deleted_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_token_count(mut self, tokens: usize) -> Self {
        self.token_count = Some(tokens);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_auto_include(mut self, auto_include: bool) -> Self {
        self.auto_include = auto_include;
        self
    }

    /// Token cost: the supplied count, or ⌈len(content)/4⌉.
    pub fn tokens(&self) -> usize {
        self.token_count
            .unwrap_or_else(|| estimate_tokens(&self.content))
    }

    /// Label for headers: the name, or the id when unnamed.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Whether the engine may see this fragment at `as_of`.
    ///
    /// Soft-deleted fragments are never visible. Session fragments stop being
    /// visible once `expires_at` has passed; other layers ignore expiry.
    pub fn is_visible(&self, as_of: DateTime<Utc>) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        match (self.layer_type, self.expires_at) {
            (LayerType::Session, Some(expires_at)) => expires_at > as_of,
            _ => true,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=10).contains(&self.priority) {
            return Err(ValidationError::InvalidPriority {
                id: self.id.clone(),
                priority: self.priority,
            });
        }
        if !(0.0..=5.0).contains(&self.avg_rating) {
            return Err(ValidationError::InvalidRating {
                id: self.id.clone(),
                rating: self.avg_rating,
            });
        }
        Ok(())
    }
}

/// Historical effectiveness of a fragment, supplied by the fragment source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effectiveness {
    /// 0.0–5.0
    pub avg_rating: f64,
    /// 0.0–1.0 share of uses that led to a successful outcome
    pub success_rate: f64,
}

impl Effectiveness {
    /// Check both fields are in range. `id` names the fragment in errors.
    pub fn validate(&self, id: &str) -> Result<(), ValidationError> {
        if !(0.0..=5.0).contains(&self.avg_rating) {
            return Err(ValidationError::InvalidRating {
                id: id.to_string(),
                rating: self.avg_rating,
            });
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(ValidationError::InvalidSuccessRate {
                id: id.to_string(),
                rate: self.success_rate,
            });
        }
        Ok(())
    }
}

/// Visible fragments keyed by id, in the order they were supplied.
#[derive(Debug, Clone)]
pub struct FragmentIndex {
    fragments: HashMap<String, Fragment>,
    order: Vec<String>,
    as_of: DateTime<Utc>,
}

impl FragmentIndex {
    /// Build an index, validating every record and dropping invisible ones.
    pub fn new(
        fragments: impl IntoIterator<Item = Fragment>,
        as_of: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let mut index = HashMap::new();
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut hidden = 0usize;

        for fragment in fragments {
            fragment.validate()?;
            if !seen.insert(fragment.id.clone()) {
                return Err(ValidationError::DuplicateFragment(fragment.id));
            }
            if !fragment.is_visible(as_of) {
                hidden += 1;
                continue;
            }
            order.push(fragment.id.clone());
            index.insert(fragment.id.clone(), fragment);
        }

        if hidden > 0 {
            debug!(hidden, visible = order.len(), "Dropped deleted or expired fragments");
        }

        Ok(Self {
            fragments: index,
            order,
            as_of,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    /// Look up a fragment that the caller requires to exist.
    pub fn require(&self, id: &str) -> Result<&Fragment, ValidationError> {
        self.get(id)
            .ok_or_else(|| ValidationError::MissingFragment(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The instant visibility was evaluated at.
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Visible fragments in supply order.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.order.iter().filter_map(|id| self.fragments.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_count_falls_back_to_estimate() {
        let f = Fragment::new("a", LayerType::Snippet, "hello");
        assert_eq!(f.tokens(), 2);
        assert_eq!(f.with_token_count(40).tokens(), 40);
    }

    #[test]
    fn deleted_fragment_is_invisible() {
        let now = Utc::now();
        let mut f = Fragment::new("a", LayerType::Project, "x");
        assert!(f.is_visible(now));
        f.deleted_at = Some(now - Duration::days(1));
        assert!(!f.is_visible(now));
    }

    #[test]
    fn expiry_only_applies_to_sessions() {
        let now = Utc::now();
        let mut session = Fragment::new("s", LayerType::Session, "x");
        session.expires_at = Some(now - Duration::minutes(5));
        assert!(!session.is_visible(now));

        let mut task = Fragment::new("t", LayerType::Task, "x");
        task.expires_at = Some(now - Duration::minutes(5));
        assert!(task.is_visible(now));
    }

    #[test]
    fn index_drops_invisible_and_keeps_order() {
        let now = Utc::now();
        let mut gone = Fragment::new("b", LayerType::Task, "x");
        gone.deleted_at = Some(now);
        let index = FragmentIndex::new(
            vec![
                Fragment::new("c", LayerType::Task, "x"),
                gone,
                Fragment::new("a", LayerType::Task, "x"),
            ],
            now,
        )
        .unwrap();

        let ids: Vec<&str> = index.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(!index.contains("b"));
        assert!(matches!(
            index.require("b"),
            Err(ValidationError::MissingFragment(_))
        ));
    }

    #[test]
    fn index_rejects_duplicates() {
        let err = FragmentIndex::new(
            vec![
                Fragment::new("a", LayerType::Task, "x"),
                Fragment::new("a", LayerType::Task, "y"),
            ],
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateFragment("a".into()));
    }

    #[test]
    fn index_rejects_out_of_range_priority() {
        let err = FragmentIndex::new(
            vec![Fragment::new("a", LayerType::Task, "x").with_priority(0)],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPriority { priority: 0, .. }));
    }

    #[test]
    fn effectiveness_out_of_range_rejected() {
        let ok = Effectiveness {
            avg_rating: 4.5,
            success_rate: 0.9,
        };
        assert!(ok.validate("t1").is_ok());

        let inflated = Effectiveness {
            success_rate: 40.0,
            ..ok
        };
        assert!(matches!(
            inflated.validate("t1"),
            Err(ValidationError::InvalidSuccessRate { id, .. }) if id == "t1"
        ));

        let rating = Effectiveness {
            avg_rating: f64::NAN,
            ..ok
        };
        assert!(matches!(
            rating.validate("t1"),
            Err(ValidationError::InvalidRating { .. })
        ));
    }

    #[test]
    fn fragment_deserializes_with_defaults() {
        let json = r#"{"id":"p1","content":"I write Rust","layer_type":"profile"}"#;
        let f: Fragment = serde_json::from_str(json).unwrap();
        assert_eq!(f.priority, 5);
        assert_eq!(f.layer_type, LayerType::Profile);
        assert!(!f.auto_include);
        assert_eq!(f.label(), "p1");
    }
}
