use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::rubric::{Recommendation, Rubric};

/// Placeholder for contact details the model could not find.
pub const NOT_PROVIDED: &str = "Not Provided";

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// One uploaded resume. Dropped as soon as its outcome has been produced.
#[derive(Debug, Clone)]
pub struct Submission {
    pub filename: String,
    /// MIME type declared by the upload, used when the extension is missing.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Submission {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes: bytes.into(),
        }
    }
}

/// Key requirements condensed from a job description, extracted once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequirements {
    pub key_skills: Vec<String>,
    pub experience_requirements: String,
    pub role_responsibilities: String,
    pub qualifications: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub id: String,
    pub score: f64,
}

/// The scored, justified outcome for one candidate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub filename: String,
    pub candidate: CandidateInfo,
    /// One entry per rubric category, in rubric order.
    pub category_scores: Vec<CategoryScore>,
    pub overall_score: f64,
    pub max_overall_score: f64,
    pub justification: String,
    pub recommendation: Recommendation,
}

impl EvaluationResult {
    /// Builds a result from per-category scores given in rubric order.
    /// The overall score and recommendation are always derived from the rubric,
    /// so every result satisfies `overall == Σ weight × score`.
    pub fn from_scores(
        filename: impl Into<String>,
        candidate: CandidateInfo,
        scores: &[f64],
        justification: impl Into<String>,
        rubric: &Rubric,
    ) -> Self {
        let overall_score = rubric.weighted_total(scores);
        Self {
            filename: filename.into(),
            candidate,
            category_scores: rubric
                .categories
                .iter()
                .zip(scores)
                .map(|(c, s)| CategoryScore {
                    id: c.id.clone(),
                    score: *s,
                })
                .collect(),
            overall_score,
            max_overall_score: rubric.max_overall(),
            justification: justification.into(),
            recommendation: rubric.recommend(overall_score),
        }
    }

    pub fn score_for(&self, category_id: &str) -> Option<f64> {
        self.category_scores
            .iter()
            .find(|s| s.id == category_id)
            .map(|s| s.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Evaluation,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Extraction => f.write_str("extraction"),
            FailureStage::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// Explicit failure marker so a candidate is flagged, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCandidate {
    pub filename: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Evaluated(EvaluationResult),
    Failed(FailedCandidate),
}

impl CandidateOutcome {
    pub fn filename(&self) -> &str {
        match self {
            CandidateOutcome::Evaluated(r) => &r.filename,
            CandidateOutcome::Failed(f) => &f.filename,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, CandidateOutcome::Evaluated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub total: usize,
    pub evaluated: usize,
    pub failed: usize,
}

impl PipelineSummary {
    pub fn from_outcomes(outcomes: &[CandidateOutcome]) -> Self {
        let evaluated = outcomes.iter().filter(|o| o.is_evaluated()).count();
        Self {
            total: outcomes.len(),
            evaluated,
            failed: outcomes.len() - evaluated,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    /// Bad credential. Fatal for the whole run.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Still rate limited after the bounded retries.
    #[error("Rate limited by the model provider: {0}")]
    RateLimited(String),

    /// Network failure or provider 5xx after the bounded retries.
    #[error("Model provider unavailable: {0}")]
    Transient(String),

    /// Reply did not match the expected schema. Never retried.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model provider error (status {status}): {message}")]
    Provider { status: u16, message: String },
}

impl From<LlmError> for EvaluationError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Authentication { message, .. } => EvaluationError::Authentication(message),
            LlmError::RateLimited { .. } => EvaluationError::RateLimited(e.to_string()),
            LlmError::Http(_) | LlmError::Unavailable { .. } => {
                EvaluationError::Transient(e.to_string())
            }
            LlmError::Api { status, message } => EvaluationError::Provider { status, message },
            LlmError::Parse(_) | LlmError::EmptyContent => {
                EvaluationError::MalformedResponse(e.to_string())
            }
        }
    }
}
