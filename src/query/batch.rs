use super::{Progress, QueryOrchestrator, QueryRequest, QueryResult};
use crate::llm::GenerationOptions;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub forced_model_id: Option<String>,
    #[serde(default)]
    pub generation: GenerationOptions,
    /// Overrides `batch.parallel` from config.
    #[serde(default)]
    pub parallel: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// One entry per input, in input order. Failures carry `error`.
    pub results: Vec<QueryResult>,
    pub successful: usize,
    pub failed: usize,
    pub total_processing_time: f64,
}

impl QueryOrchestrator {
    /// Process every query; one failure never affects its siblings.
    pub async fn process_batch(&self, texts: &[String], options: &BatchOptions) -> BatchResult {
        let started = Instant::now();
        let parallel = options.parallel.unwrap_or(self.batch.parallel);
        info!(
            count = texts.len(),
            parallel,
            "processing batch of {} queries",
            texts.len()
        );

        let results: Vec<QueryResult> = if parallel {
            let pending: Vec<_> = texts
                .iter()
                .map(|text| self.process_item(text, options))
                .collect();
            stream::iter(pending)
                .buffered(self.batch.max_concurrency.max(1))
                .collect()
                .await
        } else {
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                results.push(self.process_item(text, options).await);
            }
            results
        };

        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - successful;
        info!(successful, failed, "batch complete");
        BatchResult {
            results,
            successful,
            failed,
            total_processing_time: started.elapsed().as_secs_f64(),
        }
    }

    async fn process_item(&self, text: &str, options: &BatchOptions) -> QueryResult {
        let request = QueryRequest {
            text: text.to_string(),
            forced_model_id: options.forced_model_id.clone(),
            options: options.generation,
        };
        let started = Instant::now();
        match self.process(&request, &Progress::none()).await {
            Ok(result) => result,
            Err(e) => QueryResult::failed(text, &e, started.elapsed()),
        }
    }
}
