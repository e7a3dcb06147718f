//! WebSocket query channel.
//!
//! Client -> Server (JSON):
//! ```json
//! {"query": "How can I improve my startup's marketing strategy?", "model": "optional-id"}
//! ```
//!
//! Server -> Client: one `ProgressEvent` per message, e.g.
//! ```json
//! {"type": "query_started", "query": "..."}
//! {"type": "model_selected", "models": ["swot"]}
//! {"type": "processing_update", "stage": "generating_solution", "message": "..."}
//! {"type": "result", "query": "...", "selected_models": ["swot"], "solution": "...", ...}
//! ```

use super::AppState;
use crate::error::{Error, ErrorReport};
use crate::llm::GenerationOptions;
use crate::query::{Progress, ProgressEvent, QueryRequest};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct WsIncoming {
    query: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

impl WsIncoming {
    fn into_request(self) -> QueryRequest {
        QueryRequest {
            text: self.query,
            forced_model_id: self.model,
            options: GenerationOptions {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Queries from one socket run in arrival order. When the client goes away
/// the forwarder stops, but a running query finishes; its events are discarded.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    warn!("failed to serialize progress event: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                debug!("WebSocket client disconnected");
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let incoming: WsIncoming = match serde_json::from_str(text_str) {
                    Ok(v) => v,
                    Err(e) => {
                        let err = Error::invalid_input(format!("invalid WebSocket message: {e}"));
                        let _ = tx.send(ProgressEvent::Error(ErrorReport::from(&err)));
                        continue;
                    }
                };

                let Some(orchestrator) = state.orchestrator.clone() else {
                    let err = Error::config("query processing unavailable: LLM not configured");
                    let _ = tx.send(ProgressEvent::Error(ErrorReport::from(&err)));
                    continue;
                };

                // One query at a time per socket, so each event stream ends
                // with its `result` or `error` before the next begins.
                let progress = Progress::channel(tx.clone());
                let _ = orchestrator
                    .process(&incoming.into_request(), &progress)
                    .await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(tx);
    let _ = forwarder.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_minimal() {
        let msg: WsIncoming = serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert_eq!(msg.query, "hello");
        assert!(msg.model.is_none());
    }

    #[test]
    fn incoming_with_forced_model() {
        let msg: WsIncoming =
            serde_json::from_str(r#"{"query": "hello", "model": "swot", "temperature": 0.2}"#)
                .unwrap();
        let request = msg.into_request();
        assert_eq!(request.forced_model_id.as_deref(), Some("swot"));
        assert_eq!(request.options.temperature, Some(0.2));
    }
}
