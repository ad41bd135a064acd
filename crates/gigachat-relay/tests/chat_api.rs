//! Integration tests for the chat relay HTTP surface.
//!
//! Runs the real router and conversation manager against a scripted
//! completion provider.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use gigachat_relay::config::ConversationConfig;
use gigachat_relay::models::chat::{ChatMessage, Role};
use gigachat_relay::services::conversation::{
    CompletionProvider, ConversationManager, InMemorySessionStore, SessionStore,
};
use gigachat_relay::utils::error::CompletionError;
use gigachat_relay::{build_router, AppState};

const PROMPT: &str = "Отвечай кратко и полезно.";

/// Replies from a fixed script and records every submitted payload
#[derive(Clone, Default)]
struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedProvider {
    fn with_replies(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
    }
}

struct TestApp {
    router: axum::Router,
    store: Arc<InMemorySessionStore>,
    provider: ScriptedProvider,
}

fn create_test_app(replies: Vec<Result<String, CompletionError>>) -> TestApp {
    let provider = ScriptedProvider::with_replies(replies);
    let store = Arc::new(InMemorySessionStore::new());
    let config = ConversationConfig {
        system_prompt: PROMPT.to_string(),
        history_window: 10,
        serialize_user_turns: true,
        session_idle_ttl_secs: 0,
        sweep_interval_secs: 300,
    };
    let manager = ConversationManager::new(store.clone(), Box::new(provider.clone()), &config);

    TestApp {
        router: build_router(AppState::new(Arc::new(manager)), 64 * 1024),
        store,
        provider,
    }
}

async fn request_json(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(b) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, json)
}

async fn chat(app: &axum::Router, user_id: i64, message: &str) -> (StatusCode, Value) {
    request_json(
        app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": message, "user_id": user_id })),
    )
    .await
}

#[tokio::test]
async fn test_chat_success_round_trip() {
    let app = create_test_app(vec![Ok("hello".to_string())]);

    let (status, json) = chat(&app.router, 1, "hi").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "response": "hello" }));

    let stored = app.store.get(1).unwrap();
    let messages = stored.messages();
    assert_eq!(messages[messages.len() - 2], ChatMessage::user("hi"));
    assert_eq!(messages[messages.len() - 1], ChatMessage::assistant("hello"));

    let sent = app.provider.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], vec![ChatMessage::system(PROMPT), ChatMessage::user("hi")]);
}

#[tokio::test]
async fn test_chat_failure_reports_error_with_200() {
    let app = create_test_app(vec![
        Ok("first answer".to_string()),
        Err(CompletionError::Timeout),
    ]);

    chat(&app.router, 1, "first").await;
    let before = app.store.get(1).unwrap();

    let (status, json) = chat(&app.router, 1, "second").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "response": "Ошибка: timeout" }));
    assert_eq!(app.store.get(1).unwrap(), before);
}

#[tokio::test]
async fn test_history_carries_over_between_turns() {
    let app = create_test_app(vec![Ok("a1".to_string()), Ok("a2".to_string())]);

    chat(&app.router, 42, "q1").await;
    chat(&app.router, 42, "q2").await;

    let sent = app.provider.requests();
    assert_eq!(
        sent[1],
        vec![
            ChatMessage::system(PROMPT),
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ]
    );
}

#[tokio::test]
async fn test_users_do_not_share_history() {
    let app = create_test_app(vec![Ok("to alice".to_string()), Ok("to bob".to_string())]);

    chat(&app.router, 1, "alice secret").await;
    let (_, json) = chat(&app.router, 2, "bob question").await;
    assert_eq!(json["response"], "to bob");

    let sent = app.provider.requests();
    assert!(!sent[1].iter().any(|m| m.content.contains("alice")));

    let bob = app.store.get(2).unwrap();
    assert!(!bob.messages().iter().any(|m| m.content.contains("alice")));
    assert_eq!(bob.messages().iter().filter(|m| m.role == Role::System).count(), 1);
}

#[tokio::test]
async fn test_invalid_user_id_is_rejected() {
    let app = create_test_app(vec![]);

    let (status, _) = request_json(
        &app.router,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "hi", "user_id": "not-a-number" })),
    )
    .await;

    assert!(status.is_client_error());
    assert!(app.provider.requests().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_health_reports_sessions() {
    let app = create_test_app(vec![Ok("hey".to_string())]);

    chat(&app.router, 7, "hello").await;
    let (status, json) = request_json(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_sessions"], 1);

    let (status, _) = request_json(&app.router, Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}
