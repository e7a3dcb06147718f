mod common;

use common::{StubLlm, fixture_catalog};
use futures::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use thinking_models::prompt::PromptBuilder;
use thinking_models::query::QueryOrchestrator;
use thinking_models::server::{AppState, router};
use tokio_tungstenite::tungstenite::{self, Message};

async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

fn configured(llm: Arc<StubLlm>) -> AppState {
    let catalog = fixture_catalog();
    let orchestrator = QueryOrchestrator::new(catalog.clone(), llm, PromptBuilder::default());
    AppState::new(catalog, Some(Arc::new(orchestrator)))
}

async fn next_event<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn ws_streams_each_query_to_completion_in_order() {
    let url = spawn_server(configured(StubLlm::two_phase("pomodoro", "take breaks"))).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    ws.send(Message::text(r#"{"query": "first"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"query": "second", "model": "swot"}"#))
        .await
        .unwrap();

    for (query, model) in [("first", "pomodoro"), ("second", "swot")] {
        let started = next_event(&mut ws).await;
        assert_eq!(started["type"], "query_started");
        assert_eq!(started["query"], query);

        let selected = next_event(&mut ws).await;
        assert_eq!(selected["type"], "model_selected");
        assert_eq!(selected["models"][0], model);

        let update = next_event(&mut ws).await;
        assert_eq!(update["type"], "processing_update");
        assert_eq!(update["stage"], "generating_solution");

        let result = next_event(&mut ws).await;
        assert_eq!(result["type"], "result");
        assert_eq!(result["query"], query);
        assert_eq!(result["solution"], "take breaks");
    }
}

#[tokio::test]
async fn ws_reports_bad_messages_and_keeps_going() {
    let url = spawn_server(configured(StubLlm::two_phase("swot", "answer"))).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    ws.send(Message::text("not json")).await.unwrap();
    let error = next_event(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["kind"], "invalid_input");

    ws.send(Message::text(r#"{"query": "q", "model": "ghost"}"#))
        .await
        .unwrap();
    let started = next_event(&mut ws).await;
    assert_eq!(started["type"], "query_started");
    let error = next_event(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["kind"], "model_not_found");
}

#[tokio::test]
async fn ws_without_llm_reports_configuration_error() {
    let url = spawn_server(AppState::new(fixture_catalog(), None)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    ws.send(Message::text(r#"{"query": "q"}"#)).await.unwrap();
    let error = next_event(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["kind"], "configuration_error");
}
