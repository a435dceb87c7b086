//! Axum route handlers for the Evaluation API.

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::models::Submission;
use crate::evaluation::pipeline::{evaluate_batch, BatchRequest};
use crate::extraction::{extract_text_blocking, DocumentKind};
use crate::llm_client::LlmClient;
use crate::report::ReportFormat;
use crate::state::AppState;

const REPORT_STEM: &str = "ATS_details";

// ────────────────────────────────────────────────────────────────────────────
// Request parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EvaluationForm {
    submissions: Vec<Submission>,
    api_key: Option<String>,
    job_description: Option<String>,
    format: Option<ReportFormat>,
}

async fn read_form(mut multipart: Multipart) -> Result<EvaluationForm, AppError> {
    let mut form = EvaluationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;

        match name.as_str() {
            "files" => {
                // Browsers send an empty, nameless part when no file was chosen.
                let filename = filename.unwrap_or_default();
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.submissions.push(Submission::new(filename, content_type, bytes));
            }
            "api_key" => form.api_key = non_empty_text(&bytes),
            "format" => {
                if let Some(text) = non_empty_text(&bytes) {
                    let format = text
                        .parse::<ReportFormat>()
                        .map_err(|e| AppError::Validation(e.to_string()))?;
                    form.format = Some(format);
                }
            }
            "job_description" => {
                if let Some(text) = non_empty_text(&bytes) {
                    form.job_description = Some(text);
                }
            }
            "job_description_file" => {
                let filename = filename.unwrap_or_default();
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                let text = read_job_description_file(&filename, content_type.as_deref(), bytes).await?;
                // Typed text wins over an uploaded file.
                form.job_description.get_or_insert(text);
            }
            other => info!("Ignoring unexpected form field '{other}'"),
        }
    }

    Ok(form)
}

fn non_empty_text(bytes: &Bytes) -> Option<String> {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    (!text.is_empty()).then_some(text)
}

async fn read_job_description_file(
    filename: &str,
    content_type: Option<&str>,
    bytes: Bytes,
) -> Result<String, AppError> {
    let kind = DocumentKind::resolve(filename, content_type)
        .map_err(|e| AppError::Validation(format!("Job description: {e}")))?;
    extract_text_blocking(bytes, kind)
        .await
        .map_err(|e| AppError::Validation(format!("Job description: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluations
///
/// Multipart upload of resumes (`files`, repeatable), an optional `api_key`
/// and an optional job description (`job_description` text or
/// `job_description_file` document) and an optional `format` (`csv` or
/// `xlsx`, defaulting to the configured one). Returns the report as an attachment.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;

    if form.submissions.is_empty() {
        return Err(AppError::Validation(
            "Upload at least one resume in the 'files' field".to_string(),
        ));
    }
    let api_key = form
        .api_key
        .or_else(|| state.config.llm_api_key.clone())
        .ok_or_else(|| AppError::Validation("An API key is required".to_string()))?;

    let format = form.format.unwrap_or(state.config.report_format);
    let run_id = Uuid::new_v4();
    info!(
        "Evaluation run {run_id}: {} files, job description: {}",
        form.submissions.len(),
        form.job_description.is_some()
    );

    let llm = LlmClient::new(api_key, state.llm_settings.clone())
        .map_err(|e| AppError::Internal(e.into()))?;

    let report = evaluate_batch(
        BatchRequest {
            submissions: form.submissions,
            job_description: form.job_description,
            format,
        },
        llm,
        state.rubric.clone(),
        &state.template,
        state.config.evaluation_concurrency,
    )
    .await?;

    info!(
        "Evaluation run {run_id} finished: {} evaluated, {} failed",
        report.summary.evaluated, report.summary.failed
    );

    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{REPORT_STEM}.{}\"", format.extension()),
        ),
        (
            HeaderName::from_static("x-ats-evaluated"),
            report.summary.evaluated.to_string(),
        ),
        (
            HeaderName::from_static("x-ats-failed"),
            report.summary.failed.to_string(),
        ),
        (HeaderName::from_static("x-ats-run-id"), run_id.to_string()),
    ];

    Ok((StatusCode::OK, headers, report.bytes).into_response())
}
