mod cli;
mod config;
mod errors;
mod evaluation;
mod extraction;
mod llm_client;
mod report;
mod routes;
mod rubric;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::report::ReportTemplate;
use crate::routes::build_router;
use crate::rubric::Rubric;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; malformed values fail startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Rubric and template are loaded once and shared read-only
    let rubric = Rubric::load_or_default(config.rubric_path.as_deref())
        .context("Failed to load rubric")?;
    info!(
        "Rubric loaded: {} categories, max overall score {}",
        rubric.categories.len(),
        rubric.max_overall()
    );
    let template = ReportTemplate::load_or_default(config.template_path.as_deref(), &rubric)
        .context("Failed to load report template")?;
    info!("Report template: {} columns", template.columns.len());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, rubric, template).await,
        Command::Evaluate(args) => {
            cli::run_evaluate(args, &config, Arc::new(rubric), &template).await
        }
    }
}

async fn serve(config: Config, rubric: Rubric, template: ReportTemplate) -> Result<()> {
    info!("Starting Resume ATS v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "LLM endpoint {} (model: {}), concurrency {}, default report {}",
        config.llm_api_url,
        config.llm_model,
        config.evaluation_concurrency,
        config.report_format.extension()
    );
    if config.llm_api_key.is_none() {
        info!("No LLM_API_KEY configured; every request must carry its own api_key");
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let state = AppState::new(config, rubric, template);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
