//! Rubric: the weighted scoring categories applied uniformly to every candidate.
//!
//! Loaded once per process (TOML file or the built-in default) and shared
//! read-only. Weights and recommendation thresholds are inputs, not constants.

mod defaults;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::default_rubric;

#[derive(Debug, Error)]
pub enum RubricError {
    #[error("Failed to read rubric file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rubric: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid rubric: {0}")]
    Invalid(String),
}

/// A single scored dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable key the model must use when returning scores.
    pub id: String,
    /// Human-readable label; also the spreadsheet column header.
    pub name: String,
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_max_score() -> f64 {
    10.0
}

/// Fractions of the maximum attainable overall score at which each label starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    pub strongly_recommended: f64,
    pub recommended: f64,
    pub consider: f64,
}

impl Default for RecommendationThresholds {
    // Band edges of a 20-point scale: 16, 11 and 6.
    fn default() -> Self {
        Self {
            strongly_recommended: 0.80,
            recommended: 0.55,
            consider: 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strongly Recommended")]
    StronglyRecommended,
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Consider")]
    Consider,
    #[serde(rename = "Not Suitable")]
    NotSuitable,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::StronglyRecommended,
        Recommendation::Recommended,
        Recommendation::Consider,
        Recommendation::NotSuitable,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StronglyRecommended => "Strongly Recommended",
            Recommendation::Recommended => "Recommended",
            Recommendation::Consider => "Consider",
            Recommendation::NotSuitable => "Not Suitable",
        }
    }

    /// Case- and spacing-insensitive lookup ("strongly_recommended" also matches).
    pub fn from_label(raw: &str) -> Option<Self> {
        let wanted = squash(raw);
        Self::ALL.into_iter().find(|r| squash(r.label()) == wanted)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub thresholds: RecommendationThresholds,
}

impl Rubric {
    /// Builds a rubric and validates it.
    pub fn new(
        categories: Vec<Category>,
        thresholds: RecommendationThresholds,
    ) -> Result<Self, RubricError> {
        let rubric = Self {
            categories,
            thresholds,
        };
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RubricError> {
        let rubric: Rubric = toml::from_str(raw)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn load(path: &Path) -> Result<Self, RubricError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RubricError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads from `path` when given, otherwise returns the built-in rubric.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RubricError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(default_rubric()),
        }
    }

    pub fn validate(&self) -> Result<(), RubricError> {
        if self.categories.is_empty() {
            return Err(RubricError::Invalid(
                "rubric must define at least one category".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for c in &self.categories {
            if c.id.trim().is_empty() {
                return Err(RubricError::Invalid(format!(
                    "category '{}' has an empty id",
                    c.name
                )));
            }
            if !seen.insert(c.id.as_str()) {
                return Err(RubricError::Invalid(format!("duplicate category id '{}'", c.id)));
            }
            if !(c.weight.is_finite() && c.weight > 0.0) {
                return Err(RubricError::Invalid(format!(
                    "category '{}' must have a positive weight, got {}",
                    c.id, c.weight
                )));
            }
            if !(c.max_score.is_finite() && c.max_score > 0.0) {
                return Err(RubricError::Invalid(format!(
                    "category '{}' must have a positive max_score, got {}",
                    c.id, c.max_score
                )));
            }
        }

        let t = &self.thresholds;
        let in_range = [t.strongly_recommended, t.recommended, t.consider]
            .iter()
            .all(|v| (0.0..=1.0).contains(v));
        if !in_range || !(t.strongly_recommended > t.recommended && t.recommended > t.consider) {
            return Err(RubricError::Invalid(format!(
                "thresholds must lie in 0..=1 and strictly decrease, got {t:?}"
            )));
        }
        Ok(())
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Σ weight × max_score: the best attainable overall score.
    pub fn max_overall(&self) -> f64 {
        self.categories.iter().map(|c| c.weight * c.max_score).sum()
    }

    /// Σ weight × score, with `scores` given in category order.
    pub fn weighted_total(&self, scores: &[f64]) -> f64 {
        self.categories
            .iter()
            .zip(scores)
            .map(|(c, s)| c.weight * s)
            .sum()
    }

    /// Maps an overall score to a label via the thresholds.
    pub fn recommend(&self, overall: f64) -> Recommendation {
        let max = self.max_overall();
        let ratio = if max > 0.0 { overall / max } else { 0.0 };
        let t = &self.thresholds;
        // Small epsilon so 16/20 lands in the top band despite float error.
        let ratio = ratio + 1e-9;
        if ratio >= t.strongly_recommended {
            Recommendation::StronglyRecommended
        } else if ratio >= t.recommended {
            Recommendation::Recommended
        } else if ratio >= t.consider {
            Recommendation::Consider
        } else {
            Recommendation::NotSuitable
        }
    }
}
