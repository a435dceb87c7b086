//! Evaluator: scores one candidate's text against the rubric via the model.
//!
//! The reply is treated as untrusted input: it must match [`ModelEvaluation`]
//! exactly and pass validation against the rubric, otherwise the candidate gets
//! a `MalformedResponse` error. There is no best-effort scraping.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::evaluation::models::{
    CandidateInfo, EvaluationError, EvaluationResult, JobRequirements, NOT_PROVIDED,
};
use crate::evaluation::prompts::{
    build_evaluation_prompt, evaluation_system, requirements_system, REQUIREMENTS_PROMPT_TEMPLATE,
};
use crate::llm_client::{strip_json_fences, LlmClient};
use crate::rubric::{Recommendation, Rubric};

/// Resume text beyond this many characters is cut before prompting.
const MAX_RESUME_CHARS: usize = 60_000;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores a single candidate. Implement this to swap the backend without
/// touching the pipeline; tests use a deterministic stub.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        filename: &str,
        resume_text: &str,
        rubric: &Rubric,
    ) -> Result<EvaluationResult, EvaluationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEvaluator
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmEvaluator {
    llm: LlmClient,
    requirements: Option<JobRequirements>,
}

impl LlmEvaluator {
    pub fn new(llm: LlmClient, requirements: Option<JobRequirements>) -> Self {
        Self { llm, requirements }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        filename: &str,
        resume_text: &str,
        rubric: &Rubric,
    ) -> Result<EvaluationResult, EvaluationError> {
        let resume_text = truncate_chars(resume_text, MAX_RESUME_CHARS);
        debug!("Scoring {} ({} bytes of text) with {}", filename, resume_text.len(), self.llm.model());
        let prompt = build_evaluation_prompt(rubric, self.requirements.as_ref(), resume_text);
        let reply = self.llm.call_text(&prompt, &evaluation_system()).await?;
        parse_evaluation(filename, &reply, rubric)
    }
}

/// Condenses a job description into [`JobRequirements`] with one model call.
pub async fn extract_job_requirements(
    job_description: &str,
    llm: &LlmClient,
) -> Result<JobRequirements, EvaluationError> {
    let prompt = REQUIREMENTS_PROMPT_TEMPLATE.replace("{job_description}", job_description.trim());
    let requirements: JobRequirements = llm
        .call_json(&prompt, &requirements_system())
        .await
        .map_err(EvaluationError::from)?;

    info!(
        "Key skills identified: {}",
        requirements
            .key_skills
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(requirements)
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsing
// ────────────────────────────────────────────────────────────────────────────

/// The exact reply shape the evaluation prompt asks for.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelEvaluation {
    candidate_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    scores: BTreeMap<String, f64>,
    justification: String,
    recommendation: String,
}

/// Parses and validates a model reply into an [`EvaluationResult`].
pub fn parse_evaluation(
    filename: &str,
    reply: &str,
    rubric: &Rubric,
) -> Result<EvaluationResult, EvaluationError> {
    let parsed: ModelEvaluation = serde_json::from_str(strip_json_fences(reply))
        .map_err(|e| EvaluationError::MalformedResponse(format!("schema mismatch: {e}")))?;

    if let Some(unknown) = parsed.scores.keys().find(|id| rubric.category(id).is_none()) {
        return Err(EvaluationError::MalformedResponse(format!(
            "score for unknown category '{unknown}'"
        )));
    }

    let mut scores = Vec::with_capacity(rubric.categories.len());
    for category in &rubric.categories {
        let score = *parsed.scores.get(&category.id).ok_or_else(|| {
            EvaluationError::MalformedResponse(format!("missing score for '{}'", category.id))
        })?;
        if !score.is_finite() || score < 0.0 || score > category.max_score {
            return Err(EvaluationError::MalformedResponse(format!(
                "score {score} for '{}' is outside 0..={}",
                category.id, category.max_score
            )));
        }
        scores.push(score);
    }

    let justification = parsed.justification.trim();
    if justification.is_empty() {
        return Err(EvaluationError::MalformedResponse(
            "justification is empty".to_string(),
        ));
    }

    let model_recommendation = Recommendation::from_label(&parsed.recommendation).ok_or_else(|| {
        EvaluationError::MalformedResponse(format!(
            "unknown recommendation '{}'",
            parsed.recommendation
        ))
    })?;

    let candidate = CandidateInfo {
        name: provided(parsed.candidate_name).unwrap_or_else(|| display_name(filename)),
        email: provided(parsed.email).unwrap_or_else(|| NOT_PROVIDED.to_string()),
        phone: provided(parsed.phone).unwrap_or_else(|| NOT_PROVIDED.to_string()),
    };

    let result = EvaluationResult::from_scores(filename, candidate, &scores, justification, rubric);
    if result.recommendation != model_recommendation {
        debug!(
            "{}: model recommended '{}', rubric thresholds give '{}'",
            filename, model_recommendation, result.recommendation
        );
    }
    Ok(result)
}

/// Treats blanks and the model's own "not provided" spellings as missing.
fn provided(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| {
            let lower = v.to_lowercase();
            lower != "not provided" && lower != "n/a" && lower != "null"
        })
}

/// File stem used as the candidate name when the resume does not state one.
fn display_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            warn!("Resume text truncated to {max_chars} characters");
            &text[..byte_idx]
        }
        None => text,
    }
}
