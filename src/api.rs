//! REST gateway for the tipster bot
//!
//! Exposes the dispatcher entry points over HTTP so a chat platform adapter
//! (or a curl session) can drive the bot.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dispatcher::{Dispatcher, InboundMessage};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRequest {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReplyPayload {
    pub user_id: String,
    pub reply: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Command Endpoints
/// =============================

async fn start(State(state): State<ApiState>, Json(req): Json<MessageRequest>) -> (StatusCode, Json<ApiResponse>) {
    reply_with(state, req, Some("start")).await
}

async fn tips(State(state): State<ApiState>, Json(req): Json<MessageRequest>) -> (StatusCode, Json<ApiResponse>) {
    reply_with(state, req, Some("tips")).await
}

async fn leaderboard(
    State(state): State<ApiState>,
    Json(req): Json<MessageRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    reply_with(state, req, Some("leaderboard")).await
}

async fn message(State(state): State<ApiState>, Json(req): Json<MessageRequest>) -> (StatusCode, Json<ApiResponse>) {
    reply_with(state, req, None).await
}

async fn reply_with(
    state: ApiState,
    req: MessageRequest,
    command: Option<&str>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("user_id is required".into())),
        );
    }

    let inbound = InboundMessage {
        user_id: user_id.to_string(),
        text: req.text,
        command: command.map(str::to_string),
    };

    let reply = state.dispatcher.handle(&inbound).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(ReplyPayload {
            user_id: inbound.user_id,
            reply,
        })),
    )
}

/// =============================
/// Refresh Endpoint
/// =============================

async fn refresh(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    info!("Manual refresh requested");
    let report = state.dispatcher.refresh().await;
    (StatusCode::OK, Json(ApiResponse::success(report)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(dispatcher: Arc<Dispatcher>) -> Router {
    let state = ApiState { dispatcher };

    Router::new()
        .route("/health", get(health))
        .route("/api/start", post(start))
        .route("/api/tips", post(tips))
        .route("/api/leaderboard", post(leaderboard))
        .route("/api/message", post(message))
        .route("/api/refresh", post(refresh))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    dispatcher: Arc<Dispatcher>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(dispatcher);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{ScriptedGenerator, StaticDataProvider};
    use axum::body::{to_bytes, Body};
    use crate::models::{Sentiment, Topic};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_with_dispatcher() -> (Router, Arc<Dispatcher>) {
        let dispatcher = Arc::new(
            Dispatcher::builder()
                .data_provider(Arc::new(StaticDataProvider::default()))
                .generation_provider(Arc::new(ScriptedGenerator::new("PSG 1-0")))
                .build()
                .unwrap(),
        );
        (create_router(dispatcher.clone()), dispatcher)
    }

    fn app() -> Router {
        app_with_dispatcher().0
    }

    async fn reply_of(router: &Router, uri: &str, user_id: &str, text: &str) -> String {
        let response = router
            .clone()
            .oneshot(post_json(uri, serde_json::json!({"user_id": user_id, "text": text})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload: ReplyPayload = serde_json::from_value(read(response).await.data.unwrap()).unwrap();
        assert_eq!(payload.user_id, user_id);
        payload.reply
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read(response: axum::response::Response) -> ApiResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tips_endpoint_replies() {
        let response = app()
            .oneshot(post_json(
                "/api/tips",
                serde_json::json!({"user_id": "42", "text": "who will win the match"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read(response).await;
        assert!(body.success);
        let payload: ReplyPayload = serde_json::from_value(body.data.unwrap()).unwrap();
        assert_eq!(payload.user_id, "42");
        assert_eq!(payload.reply, "Tough call, but I’d say PSG 1-0.");
    }

    #[tokio::test]
    async fn test_missing_user_is_bad_request() {
        let response = app()
            .oneshot(post_json("/api/message", serde_json::json!({"user_id": " ", "text": "hola"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = read(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("user_id is required"));
    }

    #[tokio::test]
    async fn test_refresh_endpoint_returns_report() {
        let response = app()
            .oneshot(Request::builder().method("POST").uri("/api/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = read(response).await;
        let data = body.data.unwrap();
        assert_eq!(data["data_available"], true);
        assert_eq!(data["event_count"], 0);
    }

    #[tokio::test]
    async fn test_start_endpoint_welcomes_and_resets() {
        let (router, dispatcher) = app_with_dispatcher();
        dispatcher.conversations().append("7", "old message", Sentiment::Neutral).await;

        let reply = reply_of(&router, "/api/start", "7", "hello, great to be here").await;
        assert_eq!(
            reply,
            "Welcome to TipsterX! Use /tips for predictions or /leaderboard for rankings."
        );
        assert_eq!(dispatcher.conversations().get("7").await.message_count(), 0);
    }

    #[tokio::test]
    async fn test_leaderboard_endpoint_ranks_users() {
        let (router, dispatcher) = app_with_dispatcher();
        reply_of(&router, "/api/start", "ana", "hola").await;
        reply_of(&router, "/api/start", "ana", "hola").await;
        reply_of(&router, "/api/start", "ben", "hola").await;

        let reply = reply_of(&router, "/api/leaderboard", "ben", "/leaderboard").await;
        assert_eq!(reply, "Top 3 usuarios: 1. ana: 2\n2. ben: 1");
        assert_eq!(dispatcher.conversations().get("ben").await.last_topic, Topic::Leaderboard);
    }

    #[tokio::test]
    async fn test_message_endpoint_routes_free_text() {
        let (router, dispatcher) = app_with_dispatcher();

        let reply = reply_of(&router, "/api/message", "9", "Hello THERE").await;
        assert_eq!(reply, "PSG 1-0");

        let context = dispatcher.conversations().get("9").await;
        assert_eq!(context.last_topic, Topic::General);
        assert_eq!(context.last_messages(1), vec!["hello there".to_string()]);
    }
}
