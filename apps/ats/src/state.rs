use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmSettings;
use crate::report::ReportTemplate;
use crate::rubric::Rubric;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup; each request builds its own `LlmClient`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub llm_settings: LlmSettings,
    pub rubric: Arc<Rubric>,
    pub template: Arc<ReportTemplate>,
}

impl AppState {
    pub fn new(config: Config, rubric: Rubric, template: ReportTemplate) -> Self {
        Self {
            llm_settings: config.llm_settings(),
            config,
            rubric: Arc::new(rubric),
            template: Arc::new(template),
        }
    }
}
