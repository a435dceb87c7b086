//! Pipeline: submissions in, one outcome per submission out, upload order kept.
//!
//! Flow per file: resolve type → extract (blocking pool) → evaluate.
//! Input and provider failures become flagged outcomes; a rejected credential
//! aborts the whole run.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::evaluation::evaluator::{extract_job_requirements, Evaluator, LlmEvaluator};
use crate::evaluation::models::{
    CandidateOutcome, EvaluationError, FailedCandidate, FailureStage, PipelineSummary, Submission,
};
use crate::extraction::{extract_text_blocking, DocumentKind};
use crate::llm_client::LlmClient;
use crate::report::{write_report, ReportError, ReportFormat, ReportTemplate};
use crate::rubric::Rubric;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

/// Everything that can stop a batch before a report is produced.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No resumes were submitted")]
    NoSubmissions,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Job description analysis failed: {0}")]
    JobRequirements(EvaluationError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl From<PipelineError> for BatchError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Authentication(msg) => BatchError::Authentication(msg),
        }
    }
}

/// Serialized report plus counts, ready to hand to the caller.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub bytes: Vec<u8>,
    pub summary: PipelineSummary,
}

pub struct BatchRequest {
    pub submissions: Vec<Submission>,
    pub job_description: Option<String>,
    pub format: ReportFormat,
}

/// Runs the three stages for every submission.
///
/// At most `concurrency` candidates are in flight at once. Outcomes are returned
/// in the order the submissions were given, whatever order they finish in.
pub async fn run_pipeline(
    submissions: Vec<Submission>,
    evaluator: Arc<dyn Evaluator>,
    rubric: Arc<Rubric>,
    concurrency: usize,
) -> Result<Vec<CandidateOutcome>, PipelineError> {
    let total = submissions.len();
    info!("Found {} resume files to process", total);

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut filenames = Vec::with_capacity(total);

    for (index, submission) in submissions.into_iter().enumerate() {
        filenames.push(submission.filename.clone());
        let evaluator = evaluator.clone();
        let rubric = rubric.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            info!("Processing {}/{}: {}", index + 1, total, submission.filename);
            let outcome = process_submission(submission, evaluator.as_ref(), &rubric).await;
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<CandidateOutcome>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
            Ok((_, Err(e))) => {
                tasks.abort_all();
                warn!("Aborting run: {e}");
                return Err(e);
            }
            Err(e) => warn!("Evaluation task did not complete: {e}"),
        }
    }

    // A task that panicked left its slot empty; flag it rather than drop it.
    let outcomes: Vec<CandidateOutcome> = slots
        .into_iter()
        .zip(filenames)
        .map(|(slot, filename)| {
            slot.unwrap_or_else(|| {
                CandidateOutcome::Failed(FailedCandidate {
                    filename,
                    stage: FailureStage::Evaluation,
                    reason: "evaluation task aborted unexpectedly".to_string(),
                })
            })
        })
        .collect();

    let summary = PipelineSummary::from_outcomes(&outcomes);
    info!(
        "Run complete: {} evaluated, {} failed, {} total",
        summary.evaluated, summary.failed, summary.total
    );
    Ok(outcomes)
}

async fn process_submission(
    submission: Submission,
    evaluator: &dyn Evaluator,
    rubric: &Rubric,
) -> Result<CandidateOutcome, PipelineError> {
    let Submission {
        filename,
        content_type,
        bytes,
    } = submission;

    let text = match DocumentKind::resolve(&filename, content_type.as_deref()) {
        Ok(kind) => extract_text_blocking(bytes, kind).await,
        Err(e) => Err(e),
    };
    let text = match text {
        Ok(text) => text,
        Err(e) => {
            warn!("{}: {}", filename, e);
            return Ok(failed(filename, FailureStage::Extraction, e.to_string()));
        }
    };

    match evaluator.evaluate(&filename, &text, rubric).await {
        Ok(result) => {
            info!(
                "{}: {:.2}/{:.2} ({})",
                filename, result.overall_score, result.max_overall_score, result.recommendation
            );
            Ok(CandidateOutcome::Evaluated(result))
        }
        Err(EvaluationError::Authentication(msg)) => Err(PipelineError::Authentication(msg)),
        Err(e) => {
            warn!("Error processing {}: {}", filename, e);
            Ok(failed(filename, FailureStage::Evaluation, e.to_string()))
        }
    }
}

fn failed(filename: String, stage: FailureStage, reason: String) -> CandidateOutcome {
    CandidateOutcome::Failed(FailedCandidate {
        filename,
        stage,
        reason,
    })
}

/// Full batch used by both the HTTP handler and the CLI:
/// optional job-requirements pre-pass → pipeline → report serialization.
pub async fn evaluate_batch(
    request: BatchRequest,
    llm: LlmClient,
    rubric: Arc<Rubric>,
    template: &ReportTemplate,
    concurrency: usize,
) -> Result<BatchReport, BatchError> {
    if request.submissions.is_empty() {
        return Err(BatchError::NoSubmissions);
    }

    let requirements = match request
        .job_description
        .as_deref()
        .map(str::trim)
        .filter(|jd| !jd.is_empty())
    {
        Some(jd) => {
            info!("Extracting job requirements...");
            match extract_job_requirements(jd, &llm).await {
                Ok(r) => Some(r),
                Err(EvaluationError::Authentication(msg)) => {
                    return Err(BatchError::Authentication(msg))
                }
                Err(e) => return Err(BatchError::JobRequirements(e)),
            }
        }
        None => None,
    };

    let evaluator: Arc<dyn Evaluator> = Arc::new(LlmEvaluator::new(llm, requirements));
    let outcomes = run_pipeline(request.submissions, evaluator, rubric.clone(), concurrency).await?;
    let bytes = write_report(&outcomes, template, &rubric, request.format)?;

    Ok(BatchReport {
        bytes,
        summary: PipelineSummary::from_outcomes(&outcomes),
    })
}
