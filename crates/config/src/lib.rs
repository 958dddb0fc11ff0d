//! Configuration loading, validation, and management for contexture.
//!
//! Loads configuration from `~/.contexture/config.toml` with environment
//! variable overrides. Validates all settings before they reach the engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.contexture/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hierarchical assembly of composition trees
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Dependency resolution over relationship edges
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Relevance scoring weights
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Budgeted fragment selection
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_true")]
    pub include_optional: bool,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default = "default_true")]
    pub include_headers: bool,
}

fn default_max_depth() -> usize {
    5
}
fn default_max_tokens() -> usize {
    8000
}
fn default_separator() -> String {
    "\n\n".into()
}
fn default_true() -> bool {
    true
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_tokens: default_max_tokens(),
            include_optional: true,
            separator: default_separator(),
            include_headers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub include_recommendations: bool,

    #[serde(default = "default_min_recommendation_strength")]
    pub min_recommendation_strength: f64,
}

fn default_min_recommendation_strength() -> f64 {
    0.7
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            include_recommendations: false,
            min_recommendation_strength: default_min_recommendation_strength(),
        }
    }
}

/// Weights of the relevance score. The defaults sum to 1.0 before the
/// auto-include bonus and the staleness penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,

    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,

    /// Weight of the priority proxy used when no embeddings are available
    #[serde(default = "default_fallback_weight")]
    pub fallback_weight: f64,

    #[serde(default = "default_effectiveness_weight")]
    pub effectiveness_weight: f64,

    /// Flat contribution when no effectiveness history exists
    #[serde(default = "default_default_effectiveness")]
    pub default_effectiveness: f64,

    #[serde(default = "default_usage_weight")]
    pub usage_weight: f64,

    /// Usage count at which the usage term saturates
    #[serde(default = "default_usage_saturation")]
    pub usage_saturation: u64,

    #[serde(default = "default_auto_include_bonus")]
    pub auto_include_bonus: f64,

    /// Idle days after which the staleness penalty applies, 1 to
    /// [`MAX_STALE_AFTER_DAYS`]
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,

    /// Multiplier applied to fragments unused for `stale_after_days`
    #[serde(default = "default_stale_penalty")]
    pub stale_penalty: f64,
}

fn default_priority_weight() -> f64 {
    0.2
}
fn default_similarity_weight() -> f64 {
    0.4
}
fn default_fallback_weight() -> f64 {
    0.2
}
fn default_effectiveness_weight() -> f64 {
    0.3
}
fn default_default_effectiveness() -> f64 {
    0.15
}
fn default_usage_weight() -> f64 {
    0.1
}
fn default_usage_saturation() -> u64 {
    100
}
fn default_auto_include_bonus() -> f64 {
    0.1
}
fn default_stale_after_days() -> i64 {
    90
}

/// Upper bound for `scoring.stale_after_days` (a century).
pub const MAX_STALE_AFTER_DAYS: i64 = 36_500;
fn default_stale_penalty() -> f64 {
    0.7
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            priority_weight: default_priority_weight(),
            similarity_weight: default_similarity_weight(),
            fallback_weight: default_fallback_weight(),
            effectiveness_weight: default_effectiveness_weight(),
            default_effectiveness: default_default_effectiveness(),
            usage_weight: default_usage_weight(),
            usage_saturation: default_usage_saturation(),
            auto_include_bonus: default_auto_include_bonus(),
            stale_after_days: default_stale_after_days(),
            stale_penalty: default_stale_penalty(),
        }
    }
}

/// How a token budget is spent across candidate fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Score every candidate, then solve the 0/1 knapsack
    #[default]
    Optimal,
    /// Highest priority first, skipping whatever does not fit
    Priority,
}

impl std::str::FromStr for SelectionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimal" | "knapsack" => Ok(Self::Optimal),
            "priority" | "greedy" => Ok(Self::Priority),
            other => Err(ConfigError::ValidationError(format!(
                "unknown selection strategy: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Priority => write!(f, "priority"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub strategy: SelectionStrategy,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            strategy: SelectionStrategy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.contexture/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CONTEXTURE_MAX_TOKENS`: assembly and selection budget
    /// - `CONTEXTURE_MAX_DEPTH`: assembly and resolution depth
    /// - `CONTEXTURE_STRATEGY`: `optimal` or `priority`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("CONTEXTURE_MAX_TOKENS") {
            match raw.trim().parse::<usize>() {
                Ok(tokens) => {
                    self.assembly.max_tokens = tokens;
                    self.selection.max_tokens = tokens;
                }
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid CONTEXTURE_MAX_TOKENS"),
            }
        }

        if let Some(raw) = lookup("CONTEXTURE_MAX_DEPTH") {
            match raw.trim().parse::<usize>() {
                Ok(depth) => {
                    self.assembly.max_depth = depth;
                    self.resolution.max_depth = depth;
                }
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid CONTEXTURE_MAX_DEPTH"),
            }
        }

        if let Some(raw) = lookup("CONTEXTURE_STRATEGY") {
            match raw.parse::<SelectionStrategy>() {
                Ok(strategy) => self.selection.strategy = strategy,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid CONTEXTURE_STRATEGY"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contexture")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assembly.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "assembly.max_tokens must be > 0".into(),
            ));
        }

        if self.selection.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "selection.max_tokens must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.resolution.min_recommendation_strength) {
            return Err(ConfigError::ValidationError(
                "resolution.min_recommendation_strength must be between 0.0 and 1.0".into(),
            ));
        }

        let s = &self.scoring;
        let weights = [
            s.priority_weight,
            s.similarity_weight,
            s.fallback_weight,
            s.effectiveness_weight,
            s.default_effectiveness,
            s.usage_weight,
            s.auto_include_bonus,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::ValidationError(
                "scoring weights must be finite and >= 0".into(),
            ));
        }

        if s.usage_saturation == 0 {
            return Err(ConfigError::ValidationError(
                "scoring.usage_saturation must be > 0".into(),
            ));
        }

        if !(1..=MAX_STALE_AFTER_DAYS).contains(&s.stale_after_days) {
            return Err(ConfigError::ValidationError(format!(
                "scoring.stale_after_days must be between 1 and {MAX_STALE_AFTER_DAYS}"
            )));
        }

        if !(0.0..=1.0).contains(&s.stale_penalty) {
            return Err(ConfigError::ValidationError(
                "scoring.stale_penalty must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
