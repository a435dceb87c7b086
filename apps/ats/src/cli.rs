use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::evaluation::models::Submission;
use crate::evaluation::pipeline::{evaluate_batch, BatchRequest};
use crate::extraction::{extract_text_blocking, DocumentKind};
use crate::llm_client::LlmClient;
use crate::report::{ReportFormat, ReportTemplate};
use crate::rubric::Rubric;

pub const DEFAULT_OUTPUT: &str = "resume_evaluation_results.csv";

#[derive(Debug, Parser)]
#[command(name = "resume-ats")]
#[command(version, about = "Scores resumes against a weighted rubric and writes an ATS spreadsheet")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Evaluate every PDF / DOC / DOCX resume in a directory
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Directory holding the resumes
    pub dir: PathBuf,

    /// Job description as a text, PDF, DOC or DOCX file
    #[arg(long)]
    pub job_description: Option<PathBuf>,

    /// Where to write the report; a .xlsx name writes a workbook, anything else CSV
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Model API key; falls back to LLM_API_KEY
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Folder workflow: evaluates every supported file in `dir` (sorted by name)
/// and writes the report to `output`.
pub async fn run_evaluate(
    args: EvaluateArgs,
    config: &Config,
    rubric: Arc<Rubric>,
    template: &ReportTemplate,
) -> Result<()> {
    let api_key = args
        .api_key
        .or_else(|| config.llm_api_key.clone())
        .context("No API key: pass --api-key or set LLM_API_KEY")?;

    let submissions = collect_submissions(&args.dir)?;
    if submissions.is_empty() {
        bail!("No PDF, DOC or DOCX files found in {}", args.dir.display());
    }

    let job_description = match &args.job_description {
        Some(path) => Some(read_job_description(path).await?),
        None => None,
    };

    let format = ReportFormat::from_path(&args.output).unwrap_or_default();
    let llm = LlmClient::new(api_key, config.llm_settings())?;
    let report = evaluate_batch(
        BatchRequest {
            submissions,
            job_description,
            format,
        },
        llm,
        rubric,
        template,
        config.evaluation_concurrency,
    )
    .await?;

    std::fs::write(&args.output, &report.bytes)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;
    info!(
        "Results saved to {} ({} evaluated, {} failed)",
        args.output.display(),
        report.summary.evaluated,
        report.summary.failed
    );
    Ok(())
}

/// Reads every `.pdf` / `.doc` / `.docx` file directly under `dir`, sorted by file name.
pub fn collect_submissions(dir: &Path) -> Result<Vec<Submission>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentKind::from_extension)
            .is_some();
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .map(|path| {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Submission::new(filename, None, bytes))
        })
        .collect()
}

/// Document formats go through the extractor; anything else is read as UTF-8 text.
async fn read_job_description(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read job description {}", path.display()))?;
    let kind = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentKind::from_extension);

    match kind {
        Some(kind) => extract_text_blocking(bytes.into(), kind)
            .await
            .with_context(|| format!("Failed to extract job description {}", path.display())),
        None => String::from_utf8(bytes)
            .with_context(|| format!("Job description {} is not UTF-8 text", path.display())),
    }
}
