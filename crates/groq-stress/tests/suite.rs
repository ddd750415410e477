//! Runs the full endpoint suite against a local server.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use groq_client::{GroqClient, GroqClientConfig, ModelId};
use groq_stress::{Settings, run_load_tests, suite};

async fn completions(Json(body): Json<serde_json::Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    let chunk = serde_json::json!({
        "id": "c",
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{"index": 0, "delta": {"content": "fn"}}]
    });
    if body["stream"].as_bool() == Some(true) {
        let events = [chunk.to_string(), "[DONE]".to_string()]
            .into_iter()
            .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
        return Sse::new(futures::stream::iter(events)).into_response();
    }
    Json(chunk).into_response()
}

async fn list_models() -> impl IntoResponse {
    Json(serde_json::json!({"object": "list", "data": [{"id": ModelId::LLAMA3_70B}]}))
}

/// Fails every other retrieve call.
async fn retrieve_model(State(calls): State<Arc<AtomicUsize>>, Path(id): Path<String>) -> Response {
    if calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    Json(serde_json::json!({"id": id})).into_response()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn suite_reports_every_dispatched_request() {
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/v1/models", get(list_models))
        .route("/v1/models/{id}", get(retrieve_model))
        .with_state(Arc::new(AtomicUsize::new(0)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let mut settings = Settings::default();
    settings.rate = 20;
    settings.duration = Duration::from_millis(500);
    let client = GroqClient::new(
        GroqClientConfig::new("key")
            .base_url(format!("http://{addr}"))
            .timeout(Duration::from_secs(3)),
    )
    .expect("client");

    let configs = suite(&client, &settings).expect("suite");
    let results = run_load_tests(&configs).await;
    assert_eq!(results.len(), 4);

    for result in &results {
        assert!(result.total_requests > 0, "{result}");
        assert_eq!(
            result.success_count + result.error_count,
            result.total_requests,
            "{result}"
        );
    }
    for result in &results[..3] {
        assert_eq!(result.error_count, 0, "{result}");
        assert_eq!(result.success_rate, 100.0);
    }
    let retrieve = &results[3];
    assert_eq!(retrieve.name, "Retrieve Model");
    assert!(retrieve.error_count > 0, "{retrieve}");
    assert!(retrieve.success_count > 0, "{retrieve}");
}
