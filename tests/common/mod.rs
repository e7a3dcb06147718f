#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thinking_models::catalog::{ModelCatalog, loader};
use thinking_models::error::Result;
use thinking_models::http::Sleeper;
use thinking_models::llm::{ChatMessage, Completion, GenerationOptions};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/models")
}

pub fn fixture_catalog() -> Arc<ModelCatalog> {
    Arc::new(loader::load_dir(&fixtures_dir()).unwrap())
}

/// True for a phase-1 (model selection) request.
pub fn is_selection(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .is_some_and(|m| m.content.contains("selecting thinking models"))
}

pub fn user_turn(messages: &[ChatMessage]) -> &str {
    messages.last().map(|m| m.content.as_str()).unwrap_or_default()
}

type Responder = dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync;

/// Completion stub answering from a closure and recording every request.
pub struct StubLlm {
    respond: Box<Responder>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubLlm {
    pub fn new(
        respond: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Phase 1 answers `selection`, phase 2 answers `solution`.
    pub fn two_phase(selection: &'static str, solution: &'static str) -> Arc<Self> {
        Self::new(move |messages| {
            let reply = if is_selection(messages) { selection } else { solution };
            Ok(reply.to_string())
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call(&self, n: usize) -> Vec<ChatMessage> {
        self.calls.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Completion for StubLlm {
    async fn complete(&self, messages: &[ChatMessage], _: &GenerationOptions) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        tokio::time::sleep(Duration::from_millis(2)).await;
        (self.respond)(messages)
    }
}

/// Records backoff delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
