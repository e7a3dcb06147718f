use super::{QueryResult, QueryStage};
use crate::error::ErrorReport;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Live status for a single query, in emission order:
/// `query_started`, `model_selected`, `processing_update`, then `result` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    QueryStarted {
        query: String,
    },
    ModelSelected {
        models: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    ProcessingUpdate {
        stage: QueryStage,
        message: String,
    },
    Result(QueryResult),
    Error(ErrorReport),
}

/// Optional event channel. A dropped receiver only stops delivery; the
/// query itself keeps running (the LLM call is never aborted midway).
#[derive(Default)]
pub struct Progress {
    tx: Option<UnboundedSender<ProgressEvent>>,
    closed: AtomicBool,
}

impl Progress {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn channel(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            closed: AtomicBool::new(false),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(ref tx) = self.tx else {
            return;
        };
        if tx.send(event).is_err() && !self.closed.swap(true, Ordering::Relaxed) {
            debug!("progress receiver gone, continuing without live updates");
        }
    }
}
