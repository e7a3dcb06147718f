//! Two-phase query orchestration: model selection, then solution generation.

pub mod batch;
pub mod progress;

pub use batch::{BatchOptions, BatchResult};
pub use progress::{Progress, ProgressEvent};

use crate::catalog::{CatalogSummary, ModelCatalog, ThinkingModel};
use crate::error::{Error, ErrorReport, Result};
use crate::llm::{Completion, GenerationOptions};
use crate::prompt::PromptBuilder;
use crate::response::{self, SelectionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    /// Skips model selection when set.
    #[serde(default)]
    pub forced_model_id: Option<String>,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, id: impl Into<String>) -> Self {
        self.forced_model_id = Some(id.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Started,
    SelectingModels,
    ModelsSelected,
    GeneratingSolution,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub selected_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub solution: String,
    /// Wall-clock seconds across both phases.
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl QueryResult {
    pub fn failed(query: impl Into<String>, error: &Error, elapsed: Duration) -> Self {
        Self {
            query: query.into(),
            selected_models: Vec::new(),
            reasoning: None,
            solution: String::new(),
            processing_time: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
            error: Some(ErrorReport::from(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct QueryOrchestrator {
    catalog: Arc<ModelCatalog>,
    llm: Arc<dyn Completion>,
    prompts: PromptBuilder,
    batch: crate::config::BatchConfig,
}

impl QueryOrchestrator {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        llm: Arc<dyn Completion>,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            catalog,
            llm,
            prompts,
            batch: crate::config::BatchConfig::default(),
        }
    }

    pub fn with_batch_config(mut self, batch: crate::config::BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn summary(&self) -> CatalogSummary {
        self.catalog.summary()
    }

    pub async fn process_query(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.process(request, &Progress::none()).await
    }

    /// Run both phases, reporting progress. Failures are emitted as an
    /// `error` event and returned.
    pub async fn process(
        &self,
        request: &QueryRequest,
        progress: &Progress,
    ) -> Result<QueryResult> {
        match self.run(request, progress).await {
            Ok(result) => {
                progress.emit(ProgressEvent::Result(result.clone()));
                Ok(result)
            }
            Err(e) => {
                warn!(stage = ?QueryStage::Failed, kind = %e.kind(), "query failed: {e}");
                progress.emit(ProgressEvent::Error(ErrorReport::from(&e)));
                Err(e)
            }
        }
    }

    async fn run(&self, request: &QueryRequest, progress: &Progress) -> Result<QueryResult> {
        let query = request.text.as_str();
        if query.trim().is_empty() {
            return Err(Error::invalid_input("query text must not be empty"));
        }
        request.options.validate()?;

        info!(stage = ?QueryStage::Started, "processing query: {query}");
        progress.emit(ProgressEvent::QueryStarted {
            query: query.to_string(),
        });

        let (selection, started) = match request.forced_model_id {
            Some(ref id) => {
                let model = self.catalog.get(id)?;
                info!(model = %model.id, "model forced, skipping selection");
                (SelectionResult::forced(model.id.clone()), Instant::now())
            }
            None => {
                let started = Instant::now();
                (self.select_models(query, &request.options).await?, started)
            }
        };

        info!(
            stage = ?QueryStage::ModelsSelected,
            count = selection.model_ids.len(),
            models = ?selection.model_ids,
            "models selected"
        );
        progress.emit(ProgressEvent::ModelSelected {
            models: selection.model_ids.clone(),
            reasoning: selection.reasoning.clone(),
        });

        progress.emit(ProgressEvent::ProcessingUpdate {
            stage: QueryStage::GeneratingSolution,
            message: if selection.is_empty() {
                "No thinking model applies, generating a general solution".into()
            } else {
                format!("Generating solution with {}", selection.model_ids.join(", "))
            },
        });
        let solution = self
            .generate_solution(query, &selection, &request.options)
            .await?;

        let elapsed = started.elapsed();
        info!(
            stage = ?QueryStage::Completed,
            elapsed_ms = elapsed.as_millis() as u64,
            "query completed"
        );
        Ok(QueryResult {
            query: query.to_string(),
            selected_models: selection.model_ids,
            reasoning: selection.reasoning,
            solution,
            processing_time: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
            error: None,
        })
    }

    /// Phase 1. LLM failures propagate; an unparseable reply is an empty selection.
    async fn select_models(
        &self,
        query: &str,
        options: &GenerationOptions,
    ) -> Result<SelectionResult> {
        info!(
            stage = ?QueryStage::SelectingModels,
            available = self.catalog.len(),
            "phase 1: model selection"
        );
        let messages = self.prompts.selection_messages(&self.catalog, query);
        let reply = self.llm.complete(&messages, options).await?;
        let selection = response::parse_selection(&reply, &self.catalog);
        if selection.is_empty() {
            warn!("no thinking model selected, falling back to a general solution");
        }
        Ok(selection)
    }

    /// Phase 2.
    async fn generate_solution(
        &self,
        query: &str,
        selection: &SelectionResult,
        options: &GenerationOptions,
    ) -> Result<String> {
        info!(
            stage = ?QueryStage::GeneratingSolution,
            models = selection.model_ids.len(),
            "phase 2: solution generation"
        );
        let models: Vec<&ThinkingModel> = selection
            .model_ids
            .iter()
            .map(|id| self.catalog.get(id))
            .collect::<Result<_>>()?;
        let messages = self.prompts.solution_messages(query, &models);
        let reply = self.llm.complete(&messages, options).await?;
        response::parse_solution(&reply)
    }
}
