//! End-to-end tests against a local axum server speaking the Groq wire format.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use groq_client::prelude::*;

const KEY: &str = "test-key";

fn chunk_json(id: &str) -> String {
    serde_json::json!({
        "id": id,
        "object": "chat.completion.chunk",
        "model": ModelId::LLAMA3_70B,
        "choices": [{"index": 0, "delta": {"content": id}}]
    })
    .to_string()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {KEY}"))
}

async fn completions(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
    }
    if body.get("stream").and_then(|v| v.as_bool()) != Some(true) {
        return Json(serde_json::json!({
            "id": "full",
            "object": "chat.completion",
            "model": body["model"].clone(),
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]
        }))
        .into_response();
    }
    let events = vec![
        chunk_json("c1"),
        "{broken".to_string(),
        chunk_json("c2"),
        "[DONE]".to_string(),
        chunk_json("after-done"),
    ];
    let events = stream::iter(
        events
            .into_iter()
            .map(|data| Ok::<_, Infallible>(Event::default().data(data))),
    );
    Sse::new(events).into_response()
}

async fn endless_completions() -> impl IntoResponse {
    let events = stream::unfold(0_u64, |n| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let event = Event::default().data(chunk_json(&format!("c{n}")));
        Some((Ok::<_, Infallible>(event), n + 1))
    });
    Sse::new(events)
}

async fn json_instead_of_events() -> impl IntoResponse {
    Json(serde_json::json!({"not": "a stream"}))
}

async fn list_models(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(serde_json::json!({
        "object": "list",
        "data": [
            {"id": ModelId::LLAMA3_70B, "object": "model", "created": 1, "owned_by": "Meta", "active": true, "context_window": 8192},
            {"id": ModelId::GEMMA_7B, "object": "model", "created": 2, "owned_by": "Google", "active": true, "context_window": 8192}
        ]
    }))
    .into_response()
}

async fn retrieve_model(Path(id): Path<String>) -> Response {
    if id != ModelId::LLAMA3_70B {
        return (StatusCode::NOT_FOUND, "model not found").into_response();
    }
    Json(serde_json::json!({"id": id, "object": "model", "owned_by": "Meta", "active": true, "context_window": 8192}))
        .into_response()
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn client_for(app: Router, key: &str) -> GroqClient {
    let base = serve(app).await;
    GroqClient::new(
        GroqClientConfig::new(key)
            .base_url(base)
            .timeout(Duration::from_secs(5)),
    )
    .expect("client")
}

fn app() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/v1/models", get(list_models))
        .route("/v1/models/{id}", get(retrieve_model))
}

fn stream_request() -> ChatCompletionRequest {
    ChatCompletionRequest::new(ModelId::llama3_70b())
        .message(Message::system("You are a developer."))
        .message(Message::user("How do I write a function?"))
        .max_tokens(1)
        .num_choices(1)
        .stream(true)
}

async fn drain(mut stream: FragmentStream) -> Vec<Fragment> {
    let mut out = Vec::new();
    while let Some(fragment) = stream.next_fragment().await {
        out.push(fragment);
    }
    out
}

#[tokio::test]
async fn stream_delivers_chunks_in_order_and_stops_at_done() {
    let client = client_for(app(), KEY).await;
    let stream = client
        .create_chat_completion_stream(&stream_request())
        .await
        .expect("open");
    let fragments = drain(stream).await;

    assert_eq!(fragments.len(), 3, "{fragments:?}");
    assert!(matches!(&fragments[0], Fragment::Chunk(c) if c.id == "c1"));
    assert!(matches!(
        &fragments[1],
        Fragment::Error(StreamError::Decode { .. })
    ));
    assert!(matches!(&fragments[2], Fragment::Chunk(c) if c.id == "c2"));
}

#[tokio::test]
async fn rejected_stream_yields_one_status_fragment() {
    let client = client_for(app(), "wrong-key").await;
    let stream = client
        .create_chat_completion_stream(&stream_request())
        .await
        .expect("open");
    let fragments = drain(stream).await;

    assert_eq!(fragments.len(), 1);
    assert!(matches!(
        &fragments[0],
        Fragment::Error(StreamError::Status { status: 401, body }) if body.contains("invalid api key")
    ));
}

#[tokio::test]
async fn non_event_stream_response_is_a_protocol_error() {
    let app = Router::new().route("/v1/chat/completions", post(json_instead_of_events));
    let client = client_for(app, KEY).await;
    let fragments = drain(
        client
            .create_chat_completion_stream(&stream_request())
            .await
            .expect("open"),
    )
    .await;

    assert_eq!(fragments.len(), 1);
    assert!(matches!(
        &fragments[0],
        Fragment::Error(StreamError::Protocol { .. })
    ));
}

#[tokio::test]
async fn unreachable_server_yields_one_transport_fragment() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = GroqClient::new(
        GroqClientConfig::new(KEY)
            .base_url(format!("http://{addr}"))
            .timeout(Duration::from_secs(2)),
    )
    .expect("client");
    let fragments = drain(
        client
            .create_chat_completion_stream(&stream_request())
            .await
            .expect("open"),
    )
    .await;

    assert_eq!(fragments.len(), 1);
    assert!(matches!(
        &fragments[0],
        Fragment::Error(StreamError::Transport { message }) if message.contains("failed to connect")
    ));
}

#[tokio::test]
async fn cancel_ends_an_endless_stream_promptly() {
    let app = Router::new().route("/v1/chat/completions", post(endless_completions));
    let client = client_for(app, KEY).await;
    let mut stream = client
        .create_chat_completion_stream(&stream_request())
        .await
        .expect("open");

    for _ in 0..3 {
        assert!(matches!(
            stream.next_fragment().await,
            Some(Fragment::Chunk(_))
        ));
    }
    let handle = stream.cancel_handle();
    assert!(handle.cancel());
    assert!(!handle.cancel());

    let end = tokio::time::timeout(Duration::from_secs(1), stream.next_fragment())
        .await
        .expect("stream closed promptly");
    assert!(end.is_none());
}

#[tokio::test]
async fn single_shot_calls_decode_responses() {
    let client = client_for(app(), KEY).await;

    let models = client.list_models().await.expect("list");
    assert_eq!(models.data.len(), 2);
    assert!(models.get(&ModelId::gemma_7b()).is_some());

    let model = client
        .retrieve_model(&ModelId::llama3_70b())
        .await
        .expect("retrieve");
    assert_eq!(model.id, ModelId::LLAMA3_70B);
    assert!(model.active);

    let completion = client
        .create_chat_completion(&stream_request().stream(false))
        .await
        .expect("completion");
    assert_eq!(completion.model, ModelId::LLAMA3_70B);
    assert_eq!(completion.choices.len(), 1);
    assert_eq!(completion.text(), "hi");
}

#[tokio::test]
async fn single_shot_status_errors_are_returned() {
    let client = client_for(app(), KEY).await;
    let err = client
        .retrieve_model(&ModelId::mixtral_8x7b())
        .await
        .expect_err("missing model");
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}
