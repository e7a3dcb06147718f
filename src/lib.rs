pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod interactive;
pub mod llm;
pub mod output;
pub mod prompt;
pub mod query;
pub mod response;
pub mod server;

use std::sync::Arc;

/// CLI override for LLM provider/model/generation settings.
#[derive(Debug, Default)]
pub struct LlmOverride {
    pub provider: Option<llm::Provider>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl LlmOverride {
    pub fn apply(&self, config: &mut config::LlmConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(n) = self.max_tokens {
            config.max_tokens = n;
        }
    }
}

/// Wire the catalog, LLM client and prompt budget into an orchestrator.
pub fn build_orchestrator(
    config: &config::Config,
    catalog: Arc<catalog::ModelCatalog>,
) -> error::Result<query::QueryOrchestrator> {
    let client = llm::LlmClient::from_config(&config.llm)?;
    Ok(query::QueryOrchestrator::new(
        catalog,
        Arc::new(client),
        prompt::PromptBuilder::new(config.prompt.catalog_word_budget),
    )
    .with_batch_config(config.batch.clone()))
}
